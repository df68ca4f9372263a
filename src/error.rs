use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by training, inference and model I/O.
///
/// Every variant is fatal for the run that produced it; nothing in this crate
/// retries.
#[derive(Debug, Error)]
pub enum PlsaError {
    /// File create, truncate, map, read or write failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A table could not be allocated.
    #[error("cannot allocate {what}: {requested} elements")]
    Allocation { what: &'static str, requested: usize },

    /// The model header disagrees with the topic count the caller asked for.
    #[error("incompatible number of topics: requested {requested}, model has {found}")]
    TopicMismatch { requested: usize, found: usize },

    /// A probability distribution left the tolerance band around 1.0.
    #[error("model integrity violated: {what} mass is {mass}")]
    ModelIntegrity { what: String, mass: f64 },

    /// The model file does not follow the expected layout.
    #[error("malformed model file: {0}")]
    MalformedModel(String),

    #[error("vocabulary codec error: {0}")]
    VocabularyCodec(#[from] serde_cbor::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PlsaError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn integrity(what: impl Into<String>, mass: f64) -> Self {
        Self::ModelIntegrity {
            what: what.into(),
            mass,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PlsaError>;

/// Attaches a path to a bare `io::Result`.
pub(crate) trait IoContext<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    #[inline]
    fn with_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| PlsaError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let err = PlsaError::TopicMismatch { requested: 4, found: 8 };
        assert_eq!(
            err.to_string(),
            "incompatible number of topics: requested 4, model has 8"
        );

        let err = PlsaError::integrity("document 3", 1.5);
        assert!(err.to_string().contains("document 3"));

        let err: Result<()> =
            Err(io::Error::new(io::ErrorKind::NotFound, "gone")).with_path("model.bin");
        match err {
            Err(PlsaError::Io { path, .. }) => assert_eq!(path, PathBuf::from("model.bin")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
