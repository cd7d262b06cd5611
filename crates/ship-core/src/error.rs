//! Core error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Bundle not found (searched: {searched})")]
    BundleNotFound { searched: String },

    #[error("Failed to read bundle {path}: {source}")]
    BundleRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse bundle: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Invalid bundle: {message}")]
    InvalidBundle { message: String },

    #[error("Duplicate release name '{release}' (release names must be unique within a bundle)")]
    DuplicateRelease { release: String },

    #[error("Invalid override '{value}' for release '{release}': expected key=value")]
    InvalidOverride { release: String, value: String },

    #[error("Unsupported resource kind '{kind}' for {operation} (supported: {supported})")]
    UnsupportedKind {
        kind: String,
        operation: &'static str,
        supported: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
