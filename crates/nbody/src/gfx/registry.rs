use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{Error, Result};

/// Objects loaded once under an identifier and looked up by it afterwards.
pub struct Registry<K, V> {
    kind: &'static str,
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash + Copy + Debug, V> Registry<K, V> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, id: K, value: V) -> Result<&mut V> {
        use std::collections::hash_map::Entry;

        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(Error::AlreadyLoaded(format!("{} {id:?}", self.kind))),
            Entry::Vacant(e) => Ok(e.insert(value)),
        }
    }

    pub fn get(&self, id: K) -> Result<&V> {
        self.entries
            .get(&id)
            .ok_or_else(|| Error::NotLoaded(format!("{} {id:?}", self.kind)))
    }

    pub fn get_mut(&mut self, id: K) -> Result<&mut V> {
        self.entries
            .get_mut(&id)
            .ok_or_else(|| Error::NotLoaded(format!("{} {id:?}", self.kind)))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Id {
        A,
        B,
    }

    #[test]
    fn second_insert_is_rejected() {
        let mut registry = Registry::new("shader");
        registry.insert(Id::A, 1).unwrap();

        let err = registry.insert(Id::A, 2).unwrap_err();
        assert_eq!(err.to_string(), "shader A is already loaded");
        assert_eq!(*registry.get(Id::A).unwrap(), 1);
    }

    #[test]
    fn missing_entry_is_an_error() {
        let mut registry: Registry<Id, u32> = Registry::new("texture");
        assert!(matches!(registry.get(Id::B), Err(Error::NotLoaded(_))));

        registry.insert(Id::B, 7).unwrap();
        *registry.get_mut(Id::B).unwrap() += 1;
        assert_eq!(*registry.get(Id::B).unwrap(), 8);
    }
}
