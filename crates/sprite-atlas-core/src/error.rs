use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Glob error: {0}")]
    Glob(#[from] globset::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Input has no `dirs` to process")]
    NoDirectories,
    #[error("Invalid bin dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Nothing to pack")]
    Empty,
    #[error("Sprite {key} ({width}x{height}) does not fit in a {max_width}x{max_height} bin")]
    SpriteTooLarge {
        key: String,
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
    #[error("Packer returned a placement for unknown item id {id}")]
    UnknownPlacement { id: usize },
    #[error("Packer placed sprite {key} more than once")]
    DuplicatePlacement { key: String },
    #[error("Packer left sprite {key} unplaced")]
    UnplacedSprite { key: String },
    #[error("Placement of {key} at {x},{y} ({width}x{height}) exceeds bin {bin_width}x{bin_height}")]
    PlacementOutOfBounds {
        key: String,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        bin_width: u32,
        bin_height: u32,
    },
    #[error("Unsupported metadata format: {0}")]
    UnsupportedMetadataFormat(String),
    #[error("Encoding error: {0}")]
    Encode(String),
    #[error("Decoding error: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, AtlasError>;
