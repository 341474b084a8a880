pub mod camera;
pub mod d3d12;
pub mod math;
pub mod model;
pub mod nbody;
pub mod registry;
#[cfg(windows)]
pub mod renderer;
pub mod timer;

#[cfg(windows)]
pub use d3d12::device::report_live_objects;
