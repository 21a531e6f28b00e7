use thiserror::Error;

#[derive(Error, Debug)]
pub enum WaveError {
    #[error("Array shape does not match the grid (expected spatial shape {expected:?}, got {found:?})")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("{0} is not a recognized aberration parameter")]
    UnknownAberration(String),

    #[error("Batch index {index} is out of bounds for batch axis of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Waves have no batch axis to index")]
    NoBatchAxis,

    #[error("Failed to access disk: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Failed to write npy: {0}")]
    NpyWriteError(#[from] ndarray_npy::WriteNpyError),

    #[error("Failed to read npy: {0}")]
    NpyReadError(#[from] ndarray_npy::ReadNpyError),

    #[error("Invalid wave metadata: {0}")]
    MetadataError(String),
}

impl WaveError {
    pub(crate) fn invalid(name: &'static str, value: impl std::fmt::Debug) -> Self {
        WaveError::InvalidParameter {
            name,
            value: format!("{value:?}"),
        }
    }
}
