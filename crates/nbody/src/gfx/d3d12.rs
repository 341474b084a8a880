pub mod buffer;
pub mod command;
pub mod shader;
pub mod texture;
pub mod view;

#[cfg(windows)]
pub mod barrier;
#[cfg(windows)]
pub mod device;
#[cfg(windows)]
pub mod resource;
#[cfg(windows)]
pub mod root_signature;
#[cfg(windows)]
pub mod swap_chain;
#[cfg(windows)]
pub mod util;

pub const FRAME_BUFFER_COUNT: usize = 2;
