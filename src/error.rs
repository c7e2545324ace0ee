use std::path::PathBuf;

use thiserror::Error;

/// Structured error taxonomy for the parts of the system whose callers need
/// to distinguish failure classes (range parsing, resolution, orchestration).
/// Everything else propagates as `color_eyre::Report` via ad hoc `eyre!`/`wrap_err`,
/// matching the teacher crate's style for incidental I/O and transport failures.
#[derive(Error, Debug)]
pub enum ZepoError {
    #[error("config file is missing or has an invalid shape: {0}")]
    Config(String),

    #[error("project manifest is missing or has an invalid shape: {0}")]
    Manifest(String),

    #[error("lex error at position {position}: {message}")]
    Lex { position: usize, message: String },

    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("malformed version literal: {0}")]
    VersionParse(String),

    #[error("registry request to {url} failed: {cause}")]
    Registry { url: String, cause: String },

    #[error("no version of \"{name}\" satisfies \"{expression}\"")]
    NoMatchingVersion { name: String, expression: String },

    #[error("unsupported dependency source: {0}")]
    UnsupportedSource(String),

    #[error("failed to download {url}: {cause}")]
    Download { url: String, cause: String },

    #[error("failed to extract entry \"{entry}\": {cause}")]
    Extract { entry: String, cause: String },

    #[error("package \"{name}\" matching \"{range}\" is not installed")]
    NotInstalled { name: String, range: String },

    #[error("script \"{path}\" failed: {cause}")]
    Sandbox { path: PathBuf, cause: String },

    #[error("serialization error at {field_path}: {cause}")]
    Serialization { field_path: String, cause: String },
}

pub type Result<T, E = color_eyre::Report> = std::result::Result<T, E>;
