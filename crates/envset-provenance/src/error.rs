//! Error types for rendering parameter files

use thiserror::Error;

/// Errors raised while rendering parameter files
#[derive(Debug, Error)]
pub enum ProvenanceError {
    /// The parameter tree could not be serialized
    #[error("failed to serialize {file}: {source}")]
    Serialize {
        /// Target file name
        file: String,
        /// Serializer failure
        #[source]
        source: serde_yaml::Error,
    },
}

impl ProvenanceError {
    /// Create serialization error
    pub fn serialize(file: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::Serialize {
            file: file.into(),
            source,
        }
    }
}

/// Result type for rendering
pub type Result<T> = std::result::Result<T, ProvenanceError>;
