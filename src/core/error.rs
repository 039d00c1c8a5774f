//! Error types for the Voxdag engine

use thiserror::Error;

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum Error {
    #[error("device error: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("import error: {0}")]
    Import(#[from] crate::import::vox::VoxError),
}
