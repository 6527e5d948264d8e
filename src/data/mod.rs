use std::path::PathBuf;

use thiserror::Error;

pub mod batcher;
pub mod dataset;
pub mod loader;
pub mod preprocess;

pub use batcher::{DigitBatch, DigitBatcher};
pub use dataset::{DigitDataset, DigitItem};
pub use loader::{load_mnist, DataSource, RawSplit};
pub use preprocess::{normalize_images, one_hot, prepare, PreparedSplit};

/// Errors raised while reading or preparing the digit dataset
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset file not found: {0}")]
    MissingFile(PathBuf),

    #[error("bad IDX magic number: expected {expected}, found {found}")]
    BadMagic { expected: u32, found: u32 },

    #[error("unsupported image size {rows}x{cols}")]
    BadDimensions { rows: usize, cols: usize },

    #[error("truncated IDX payload: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("{images} images but {labels} labels")]
    CountMismatch { images: usize, labels: usize },

    #[error("buffer of {len} pixels is not a whole number of {pixels}-pixel images")]
    PartialImage { len: usize, pixels: usize },

    #[error("{len} pixels do not fill a {width}x{height} image")]
    ImageSize { len: usize, width: usize, height: usize },

    #[error("model returned no class probabilities")]
    EmptyPrediction,

    #[error("label {label} outside of {num_classes} classes")]
    LabelOutOfRange { label: usize, num_classes: usize },
}
