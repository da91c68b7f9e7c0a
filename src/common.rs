use std::{io, path::PathBuf, result};

use thiserror::Error;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to open file \"{0}\"")]
    FileNotFound(PathBuf),
    #[error("No suitable reader found for the file format of file \"{0}\"")]
    NoSuitableReader(PathBuf),
    #[error("Failed to decode \"{path}\": {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Importer failed unexpectedly: {message}")]
    UnexpectedFailure { message: String },
    #[error("Invalid scene structure: {0}")]
    Validation(String),
    #[error("Post-processing stage '{stage}' failed: {message}")]
    StageFailed { stage: &'static str, message: String },
    #[error("Importer not found in the registry")]
    ImporterNotFound,
    #[error("IoError: {0}")]
    IoError(#[from] io::Error),
}

/// Returns the lowercase extension of `path` without the dot. Empty when the
/// path has none.
pub(crate) fn extension_of(path: &std::path::Path) -> String {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) fn setup_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
