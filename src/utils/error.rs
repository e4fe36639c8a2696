//! Error Handling Module
//!
//! Defines the error taxonomy for the PlantDoc pipeline.
//! Uses thiserror for ergonomic error definitions. Every variant is terminal
//! for the training run or inference call that raised it.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for PlantDoc operations
#[derive(Error, Debug)]
pub enum PlantDocError {
    /// Label space or training data unavailable
    #[error("Dataset not found: {0}")]
    MissingDataset(String),

    /// Model artifact absent
    #[error("Model artifact not found at '{0}'. Train a model first")]
    ModelNotFound(PathBuf),

    /// Artifact, topology or class count disagreement
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Persisted label space differs from the dataset it was checked against
    #[error("Label space mismatch: {0}")]
    LabelMismatch(String),

    /// Input image does not exist
    #[error("Image not found: '{0}'")]
    ImageNotFound(PathBuf),

    /// Input image exists but cannot be decoded
    #[error("Failed to decode image at '{0}': {1}")]
    Decode(PathBuf, String),

    /// Dataset layout is inconsistent
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Invalid hyperparameters or preprocessing settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error while reading network output
    #[error("Inference error: {0}")]
    Inference(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PlantDocError {
    fn from(err: serde_json::Error) -> Self {
        PlantDocError::Serialization(err.to_string())
    }
}

impl PlantDocError {
    /// Process exit code reported by the CLI for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            PlantDocError::MissingDataset(_) => 3,
            PlantDocError::ModelNotFound(_) => 4,
            PlantDocError::ShapeMismatch(_) => 5,
            PlantDocError::LabelMismatch(_) => 6,
            PlantDocError::ImageNotFound(_) => 7,
            PlantDocError::Decode(..) => 8,
            _ => 1,
        }
    }
}

/// Convenience Result type for PlantDoc operations
pub type Result<T> = std::result::Result<T, PlantDocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlantDocError::MissingDataset("data/train".to_string());
        assert_eq!(format!("{}", err), "Dataset not found: data/train");
    }

    #[test]
    fn test_image_not_found_mentions_path() {
        let err = PlantDocError::ImageNotFound(PathBuf::from("/path/to/leaf.jpg"));
        assert!(format!("{}", err).contains("leaf.jpg"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PlantDocError = io_err.into();
        assert!(matches!(err, PlantDocError::Io(_)));
    }

    #[test]
    fn test_exit_codes_are_distinct_and_nonzero() {
        let errors = [
            PlantDocError::MissingDataset(String::new()),
            PlantDocError::ModelNotFound(PathBuf::new()),
            PlantDocError::ShapeMismatch(String::new()),
            PlantDocError::LabelMismatch(String::new()),
            PlantDocError::ImageNotFound(PathBuf::new()),
            PlantDocError::Decode(PathBuf::new(), String::new()),
        ];
        let mut codes: Vec<u8> = errors.iter().map(|e| e.exit_code()).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert_eq!(PlantDocError::Serialization("x".into()).exit_code(), 1);
    }
}
