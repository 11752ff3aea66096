//! Harness error types.

use thiserror::Error;

/// A fixture set that cannot be run as written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    #[error("case '{case}': unknown probe '{probe}'")]
    UnknownProbe { case: String, probe: String },
    #[error("case '{case}': probe '{probe}' takes {arity} argument(s), got {got}")]
    TooManyArguments {
        case: String,
        probe: String,
        arity: usize,
        got: usize,
    },
    #[error("case '{case}': unknown binding '{name}'")]
    UnknownBinding { case: String, name: String },
    #[error("case '{case}': binding '{name}' defined twice")]
    DuplicateBinding { case: String, name: String },
}

/// Top-level harness failure.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: {source}")]
    Fixture {
        path: String,
        #[source]
        source: FixtureError,
    },
    #[error("unknown profile '{0}', expected node|bun|both")]
    UnknownProfile(String),
    #[error("no fixture JSON files found in {0}")]
    NoFixtures(String),
}

impl HarnessError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
