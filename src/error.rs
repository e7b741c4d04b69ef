//! Error types for Cargar

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{file} file not found in: {}", .dir.display())]
    NotFound { file: String, dir: PathBuf },

    #[error("Malformed model: {0}")]
    MalformedModel(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
