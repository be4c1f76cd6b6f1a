//! Node error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Genesis file error: {0}")]
    Genesis(String),

    #[error(transparent)]
    Module(#[from] tss_module::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;
