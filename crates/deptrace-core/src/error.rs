//! Error types for knowledge-base loading.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("invalid knowledge file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KnowledgeError>;
