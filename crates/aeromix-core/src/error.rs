use thiserror::Error;

#[derive(Error, Debug)]
pub enum AeromixError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML Parsing Error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Matrix Format Error in {path}: {reason}")]
    Format { path: String, reason: String },

    #[error("Shape Mismatch: {0}")]
    Shape(String),
}

pub type AmResult<T> = Result<T, AeromixError>;
