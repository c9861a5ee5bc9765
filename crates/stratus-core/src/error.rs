use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("failed to read specification: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON specification: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML specification: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported specification format: {0}\nexpected .json, .yaml or .yml")]
    UnsupportedFormat(PathBuf),

    #[error("invalid specification: {0}")]
    InvalidSpec(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
