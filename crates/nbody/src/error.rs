use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[cfg(windows)]
    #[error("Direct3D call failed: {0}")]
    Graphics(#[from] windows::core::Error),

    #[error("no adapter supports Direct3D 12")]
    NoAdapter,

    #[error("failed to compile {path} ({entry_point}): {message}")]
    ShaderCompilation {
        path: PathBuf,
        entry_point: String,
        message: String,
    },

    #[error("failed to serialize root signature: {0}")]
    RootSignature(String),

    #[error("{0} is already loaded")]
    AlreadyLoaded(String),

    #[error("{0} has not been loaded")]
    NotLoaded(String),

    #[error("descriptor index {index} is out of range (capacity {capacity})")]
    DescriptorOutOfRange { index: u32, capacity: u32 },

    #[error("{size} bytes do not fit into a {capacity} byte constant buffer slot")]
    ConstantBufferOverflow { size: usize, capacity: u64 },

    #[error("frame index {index} is out of range ({count} constant buffer slots)")]
    FrameIndexOutOfRange { index: usize, count: u32 },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("this program requires Windows and Direct3D 12")]
    Unsupported,
}
