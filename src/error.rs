use std::path::PathBuf;

use serde::Serialize;

/// Non-fatal notes attached to engine results. Nothing in the engine returns
/// these as `Err`; they ride along with the (possibly empty) result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[error("{context}: no usable text")]
    EmptyInput { context: String },

    #[error("{what}: found {found}, kept {kept}")]
    CapExceeded {
        what: String,
        found: usize,
        kept: usize,
    },

    #[error("{context}: no match")]
    NoMatch { context: String },
}

impl Diagnostic {
    pub fn empty_input(context: impl Into<String>) -> Self {
        Diagnostic::EmptyInput {
            context: context.into(),
        }
    }

    pub fn no_match(context: impl Into<String>) -> Self {
        Diagnostic::NoMatch {
            context: context.into(),
        }
    }

    /// Builds a cap diagnostic and logs the truncation.
    pub fn cap_exceeded(what: impl Into<String>, found: usize, kept: usize) -> Self {
        let what = what.into();
        tracing::warn!(what = %what, found, kept, "truncating to schema cap");
        Diagnostic::CapExceeded { what, found, kept }
    }
}

/// Scope registry loading failures. These are fatal to the loader only.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("reading registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing registry: {0}")]
    Json(#[from] serde_json::Error),

    #[error("scope id {0:?} is not a 6-digit code")]
    InvalidId(String),

    #[error("duplicate scope id {0}")]
    DuplicateId(String),

    #[error("scope {0} has no keywords")]
    EmptyKeywords(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
