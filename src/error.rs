//! Error types for model selection

use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Result type alias for trainer operations
pub type Result<T> = std::result::Result<T, KolosalError>;

/// Source position captured when an error is wrapped by [`ResultExt::context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl ErrorLocation {
    #[track_caller]
    pub fn caller() -> Self {
        let loc = Location::caller();
        Self {
            file: loc.file(),
            line: loc.line(),
            column: loc.column(),
        }
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Main error type for the trainer
#[derive(Error, Debug)]
pub enum KolosalError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Model registry mismatch: models without grid {missing_grids:?}, grids without model {orphan_grids:?}")]
    RegistryMismatch {
        missing_grids: Vec<String>,
        orphan_grids: Vec<String>,
    },

    #[error("No best model found (best: {best_model} with score {score:.4}, required >= {threshold})")]
    NoBestModel {
        best_model: String,
        score: f64,
        threshold: f64,
    },

    /// Uniform wrapper raised by the model selection pipeline.
    #[error("Model trainer failed during {stage} at {location}: {source}")]
    Pipeline {
        stage: String,
        location: ErrorLocation,
        #[source]
        source: Box<KolosalError>,
    },
}

impl KolosalError {
    /// Wrap `self` as a pipeline error for `stage`, recording the caller position.
    #[track_caller]
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        KolosalError::Pipeline {
            stage: stage.into(),
            location: ErrorLocation::caller(),
            source: Box::new(self),
        }
    }

    /// Innermost error beneath any number of `Pipeline` wrappers.
    pub fn root_cause(&self) -> &KolosalError {
        let mut current = self;
        while let KolosalError::Pipeline { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_no_best_model(&self) -> bool {
        matches!(self.root_cause(), KolosalError::NoBestModel { .. })
    }
}

/// Attach pipeline context to fallible results.
pub trait ResultExt<T> {
    fn context(self, stage: &str) -> Result<T>;
}

impl<T, E: Into<KolosalError>> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn context(self, stage: &str) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().in_stage(stage)),
        }
    }
}

impl From<polars::error::PolarsError> for KolosalError {
    fn from(err: polars::error::PolarsError) -> Self {
        KolosalError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for KolosalError {
    fn from(err: serde_json::Error) -> Self {
        KolosalError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for KolosalError {
    fn from(err: bincode::Error) -> Self {
        KolosalError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for KolosalError {
    fn from(err: ndarray::ShapeError) -> Self {
        KolosalError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
