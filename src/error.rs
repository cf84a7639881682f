use crate::configuration::Backend;
use crate::nwbfile::IoMode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    General(String),
    #[error(
        "a backend (either 'hdf5' or 'zarr') must be specified if the NWB file was not read from an existing file"
    )]
    MissingBackend,
    #[error(
        "a backend (either 'hdf5' or 'zarr') must be specified unless the NWB file is being appended (read mode '{mode}')"
    )]
    BackendRequired { mode: IoMode },
    #[error(
        "detected backend '{detected}' for appending file, but specified backend '{specified}' does not match"
    )]
    BackendMismatch {
        detected: Backend,
        specified: Backend,
    },
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    ArrayCreate(#[from] zarrs::array::ArrayCreateError),
    #[error(transparent)]
    Array(#[from] zarrs::array::ArrayError),
    #[error(transparent)]
    Storage(#[from] zarrs::storage::StorageError),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn invalid_shape(message: impl Into<String>) -> Self {
        Self::InvalidShape(message.into())
    }

    pub fn wrap(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }
}
