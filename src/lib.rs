//! # PlantDoc
//!
//! Plant leaf disease classification with the Burn framework.
//!
//! A fixed convolutional classifier is trained on a directory tree of labeled
//! leaf photographs, saved together with its ordered label space, and
//! reloaded to classify single images. Each prediction is enriched with
//! static advisory text (health status, causes, prevention).
//!
//! ## Modules
//!
//! - `dataset`: Label space, split loading, preprocessing and augmentation
//! - `model`: CNN architecture and artifact persistence
//! - `training`: Supervised training loop
//! - `inference`: Prediction and diagnosis enrichment
//! - `utils`: Errors, logging and helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use plantdoc::backend::{default_device, DefaultBackend, TrainingBackend};
//! use plantdoc::model::ModelArtifact;
//! use plantdoc::training::{run_training, TrainingConfig};
//!
//! let artifact = ModelArtifact::new("Models/plant_disease_model_final");
//! let device = default_device();
//! run_training::<TrainingBackend>("Datasets/PlantDocBot_Dataset".as_ref(), &artifact, &TrainingConfig::new(), &device)?;
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

pub use dataset::{LabelSpace, PreprocessConfig};
pub use inference::{DiseaseTable, HealthStatus, PredictionResult, Predictor};
pub use model::{DiseaseClassifier, DiseaseClassifierConfig, Mode, ModelArtifact};
pub use training::{TrainingConfig, TrainingReport};
pub use utils::error::{PlantDocError, Result};

/// Default square input side in pixels
pub const IMAGE_SIZE: usize = 128;

/// Default dataset root (contains `train/` and `valid/`)
pub const DEFAULT_DATASET_DIR: &str = "Datasets/PlantDocBot_Dataset";

/// Default model artifact stem
pub const DEFAULT_MODEL_STEM: &str = "Models/plant_disease_model_final";

/// Default disease metadata table
pub const DEFAULT_METADATA_PATH: &str = "Models/disease_info.json";

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_package_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert!(!VERSION.is_empty());
    }
}
