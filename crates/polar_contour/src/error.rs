use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContourError {
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Image size mismatch: intensity is {intensity:?}, probability is {probability:?}")]
    DimensionMismatch {
        intensity: (u32, u32),
        probability: (u32, u32),
    },

    #[error("Empty image: {0}")]
    EmptyImage(&'static str),

    #[error("Threshold vector has {got} entries for {rows} rows")]
    ThresholdLength { got: usize, rows: usize },

    #[error("Range vector has {got} entries for {rows} rows")]
    RangeCount { got: usize, rows: usize },

    #[error("Contour has {got} entries for {rows} rows")]
    ContourLength { got: usize, rows: usize },

    #[error("No predecessor recorded for row {row} during backtrack")]
    BrokenPath { row: usize },

    #[error("No valid candidate column in row {row}")]
    DegenerateRange { row: usize },

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Invalid config override `{0}`, expected key=value")]
    InvalidOverride(String),

    #[error("Unknown config key `{0}`")]
    UnknownConfigKey(String),

    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,

    #[error("Slice `{id}` failed: {source}")]
    Slice {
        id: String,
        #[source]
        source: Box<ContourError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContourError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Attach the id of the slice being processed.
    pub fn in_slice(self, id: impl Into<String>) -> Self {
        Self::Slice {
            id: id.into(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContourError>;
