//! Inference module
//!
//! - Single image prediction with a reloaded classifier
//! - Disease advisory table and result enrichment

pub mod metadata;
pub mod predictor;

pub use metadata::{DiseaseRecord, DiseaseTable, HealthStatus};
pub use predictor::{enrich, run_inference, InferenceOptions, Prediction, PredictionResult, Predictor};
