//! Typed errors for gateway operations.

use thiserror::Error;

/// Errors surfaced by the gateway core.
///
/// The core never logs-and-swallows: every failure propagates as one of
/// these variants and the transport layer decides presentation. Only two
/// conditions are recovered internally: the embedder's GPU-to-CPU provider
/// fallback and the "collection already exists" race during creation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A caller-supplied value failed validation. Names the offending field.
    #[error("invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the input field that failed validation.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The target collection does not exist and the operation will not
    /// create it (read paths, or store with auto-create disabled).
    #[error("collection '{0}' does not exist")]
    NoSuchCollection(String),

    /// An existing collection's vector geometry disagrees with the model
    /// resolved for its name. Terminal for that collection until an
    /// operator intervenes.
    #[error("collection '{collection}' was created for vector '{existing}', but its name resolves to '{resolved}'")]
    ModelMismatch {
        /// Collection whose geometry conflicts.
        collection: String,
        /// Vector name persisted in the backend.
        existing: String,
        /// Vector name of the model the resolver selected.
        resolved: String,
    },

    /// The embedding runtime refused to construct, even on CPU. Fatal for
    /// this model id for the remainder of the process.
    #[error("embedder for model '{model_id}' is unavailable: {reason}")]
    EmbedderUnavailable {
        /// Model the pool failed to instantiate.
        model_id: String,
        /// Construction failure recorded at first attempt.
        reason: String,
    },

    /// The vector database could not be reached or returned a server
    /// error. Transient; callers may retry.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A point id was not found in the collection.
    #[error("point '{point_id}' not found in collection '{collection}'")]
    PointNotFound {
        /// Collection that was searched.
        collection: String,
        /// The missing point id.
        point_id: String,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// An internal invariant was violated. Report and refuse.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Shorthand for an [`GatewayError::InvalidInput`] with a formatted reason.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the gateway.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_display() {
        let err = GatewayError::invalid("query", "must not be empty");
        assert_eq!(
            err.to_string(),
            "invalid input for 'query': must not be empty"
        );
    }

    #[test]
    fn test_model_mismatch_display() {
        let err = GatewayError::ModelMismatch {
            collection: "legal_notes".to_string(),
            existing: "all-minilm-l6-v2".to_string(),
            resolved: "bge-large-en-v1-5".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("legal_notes"));
        assert!(msg.contains("all-minilm-l6-v2"));
        assert!(msg.contains("bge-large-en-v1-5"));
    }

    #[test]
    fn test_point_not_found_display() {
        let err = GatewayError::PointNotFound {
            collection: "lessons".to_string(),
            point_id: "abc".to_string(),
        };
        assert!(err.to_string().contains("'abc' not found"));
    }
}
