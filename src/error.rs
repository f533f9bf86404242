//! Error types for record validation, model loading and prediction.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Field;

/// A raw form value that could not become part of a [`ClinicalRecord`](crate::ClinicalRecord).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {kind}")]
pub struct ValidationError {
    pub field: Field,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(field: Field, kind: ValidationErrorKind) -> Self {
        Self { field, kind }
    }

    pub fn missing(field: Field) -> Self {
        Self::new(field, ValidationErrorKind::Missing)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationErrorKind {
    #[error("value is missing")]
    Missing,
    #[error("'{value}' is not a finite number")]
    NotANumber { value: String },
    #[error("{value} is outside {}", bounds_label(.min, .max))]
    OutOfRange { value: f64, min: f64, max: f64 },
    #[error("'{value}' is not one of {}", .allowed.join("/"))]
    InvalidChoice {
        value: String,
        allowed: [&'static str; 2],
    },
}

fn bounds_label(min: &f64, max: &f64) -> String {
    if max.is_finite() {
        format!("[{min}, {max}]")
    } else {
        format!("[{min}, ∞)")
    }
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read model artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model artifact is not a valid tree export: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported model format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("corrupt model artifact: {0}")]
    Corrupt(String),
    #[error("a model is already loaded")]
    AlreadyLoaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictError {
    #[error("no model loaded")]
    NotLoaded,
    #[error("feature vector has {actual} values, model expects {expected}")]
    InvalidInput { expected: usize, actual: usize },
    #[error("feature {index} is not a finite number")]
    NonFiniteInput { index: usize },
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to open batch CSV {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read batch CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Predict(#[from] PredictError),
}
