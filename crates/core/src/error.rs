use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RefError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("template not found: {0:?}")]
    MissingTemplate(PathBuf),
    #[error("unparseable template {path:?}: {reason}")]
    TemplateParse { path: PathBuf, reason: String },
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RefError>;

impl From<anyhow::Error> for RefError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(format!("{value:#}"))
    }
}

impl RefError {
    /// Errors that must abort the build before anything is written.
    pub fn is_fatal_template(&self) -> bool {
        matches!(
            self,
            RefError::MissingTemplate(_) | RefError::TemplateParse { .. }
        )
    }
}
