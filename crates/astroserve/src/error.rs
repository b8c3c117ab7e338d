//! Error taxonomy for the gateway.
//!
//! Errors come in two scopes:
//!
//! - [`ServeError`]: request-global validation failures. A `predict` call that
//!   fails with one of these has not invoked any model.
//! - [`ModelError`]: failures scoped to a single model identifier. Other models
//!   requested in the same call are unaffected.
//!
//! [`LoadError`] and [`InferenceError`] carry the backend-level detail wrapped by
//! [`ModelError::ArtifactLoad`] and [`ModelError::InferenceFailure`].

use std::path::PathBuf;

/// Request-global validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServeError {
    /// One or more requested identifiers are not registered.
    #[error("unknown models: [{}]", .0.join(", "))]
    UnknownModel(Vec<String>),
    /// The feature batch violates the schema.
    #[error("malformed batch: {0}")]
    MalformedBatch(#[from] BatchError),
}

/// Shape or type violation in an incoming feature batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchError {
    #[error("data must be a list of rows")]
    NotATable,
    #[error("data must contain at least one row")]
    Empty,
    #[error("row {row} is not a list of values")]
    RowNotArray { row: usize },
    #[error("row {row} has {actual} features, each sample must have {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("value at row {row}, column {column} is not numeric: {found}")]
    NonNumeric {
        row: usize,
        column: usize,
        found: String,
    },
    #[error("value at row {row}, column {column} is not finite")]
    NonFinite { row: usize, column: usize },
}

/// Failure scoped to one model identifier.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model '{0}' is not registered")]
    UnknownModel(String),
    #[error("artifact for model '{model}' not found at {}", .path.display())]
    ArtifactMissing { model: String, path: PathBuf },
    #[error("failed to load model '{model}' from {}: {source}", .path.display())]
    ArtifactLoad {
        model: String,
        path: PathBuf,
        #[source]
        source: LoadError,
    },
    #[error("model '{model}' failed to score the batch: {source}")]
    InferenceFailure {
        model: String,
        #[source]
        source: InferenceError,
    },
}

impl ModelError {
    /// Identifier of the model that failed.
    pub fn model(&self) -> &str {
        match self {
            ModelError::UnknownModel(model) => model,
            ModelError::ArtifactMissing { model, .. }
            | ModelError::ArtifactLoad { model, .. }
            | ModelError::InferenceFailure { model, .. } => model,
        }
    }

    /// Stable short code, used in logs and serialized error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::UnknownModel(_) => "unknown_model",
            ModelError::ArtifactMissing { .. } => "artifact_missing",
            ModelError::ArtifactLoad { .. } => "artifact_load",
            ModelError::InferenceFailure { .. } => "inference_failure",
        }
    }
}

/// Artifact deserialization failure.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary payload error: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("invalid header: {0}")]
    Header(String),
    #[error("invalid model structure: {0}")]
    Invalid(String),
    #[error("unsupported model: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Conversion(#[from] crate::compat::xgboost::ConversionError),
}

/// A loaded model rejected a schema-conformant batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("model expects {expected} features, batch has {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },
    #[error("feature {index} mismatch: model expects '{expected}', batch provides '{found}'")]
    FeatureNameMismatch {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("model is not a binary classifier ({n_classes} classes)")]
    NotBinary { n_classes: usize },
    #[error("model produced a non-finite probability for row {row}")]
    NonFiniteProbability { row: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_lists_all_identifiers() {
        let err = ServeError::UnknownModel(vec!["bogus".into(), "nope".into()]);
        assert_eq!(err.to_string(), "unknown models: [bogus, nope]");
    }

    #[test]
    fn batch_errors_name_their_position() {
        let err = ServeError::from(BatchError::NonNumeric {
            row: 2,
            column: 5,
            found: "\"abc\"".into(),
        });
        assert_eq!(
            err.to_string(),
            "malformed batch: value at row 2, column 5 is not numeric: \"abc\""
        );
    }

    #[test]
    fn model_errors_expose_identifier_and_kind() {
        let err = ModelError::ArtifactMissing {
            model: "xgb".into(),
            path: PathBuf::from("/models/xgb_model.json"),
        };
        assert_eq!(err.model(), "xgb");
        assert_eq!(err.kind(), "artifact_missing");
        assert!(err.to_string().contains("/models/xgb_model.json"));
    }
}
