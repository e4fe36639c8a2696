//! Model module for the leaf disease CNN using the Burn framework
//!
//! - Fixed-topology classifier sized by the label space
//! - Artifact persistence (parameters, label manifest)

pub mod checkpoint;
pub mod cnn;

pub use checkpoint::{load_classifier, save_model, LoadedModel, ModelArtifact, ModelManifest};
pub use cnn::{DiseaseClassifier, DiseaseClassifierConfig, Mode};
