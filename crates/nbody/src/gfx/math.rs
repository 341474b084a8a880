pub use glam::*;

/// Rounds `value` up to the next multiple of `alignment`, which must be a power of two.
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

pub fn divide_and_round_up(x: u32, y: u32) -> u32 {
    x.div_ceil(y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_to_power_of_two() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
        assert_eq!(align_up(80, 16), 80);
    }

    #[test]
    fn divide_rounds_up() {
        assert_eq!(divide_and_round_up(4096, 256), 16);
        assert_eq!(divide_and_round_up(4097, 256), 17);
        assert_eq!(divide_and_round_up(1, 256), 1);
    }
}
