pub mod config;
pub mod error;
#[cfg(windows)]
pub mod framework;
pub mod gfx;
pub mod log;

pub use config::{parse_args, Config};
pub use error::{Error, Result};
