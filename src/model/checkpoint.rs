//! Model artifact persistence
//!
//! A trained model is stored under a single path stem:
//! - `<stem>.mpk`: learned parameters (Burn named MessagePack record)
//! - `<stem>.classes.json`: label manifest (ordered class names plus topology info)
//! - `<stem>.config.json`: training hyperparameters
//!
//! Each save overwrites the previous artifact at the same stem.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::backend::Backend,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::LabelSpace;
use crate::model::cnn::{DiseaseClassifier, DiseaseClassifierConfig, ARCHITECTURE, MIN_INPUT_SIZE};
use crate::utils::error::{PlantDocError, Result};
use crate::IMAGE_SIZE;

/// Recorder used for parameters; full precision so a reload scores identically
pub type ModelRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Paths of one model artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    stem: PathBuf,
}

impl ModelArtifact {
    pub fn new<P: AsRef<Path>>(stem: P) -> Self {
        Self {
            stem: stem.as_ref().to_path_buf(),
        }
    }

    pub fn stem(&self) -> &Path {
        &self.stem
    }

    pub fn record_path(&self) -> PathBuf {
        self.with_suffix(".mpk")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.with_suffix(".classes.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.with_suffix(".config.json")
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.stem.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }
}

/// Label manifest written next to the parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub architecture: String,
    pub image_size: usize,
    pub num_classes: usize,
    pub classes: LabelSpace,
    pub trained_at: String,
    pub epochs: usize,
    /// Final-epoch training accuracy (percent)
    pub train_accuracy: f64,
    /// Final-epoch validation accuracy (percent)
    pub val_accuracy: f64,
}

impl ModelManifest {
    pub fn new(classes: LabelSpace, image_size: usize) -> Self {
        Self {
            architecture: ARCHITECTURE.to_string(),
            image_size,
            num_classes: classes.len(),
            classes,
            trained_at: Utc::now().to_rfc3339(),
            epochs: 0,
            train_accuracy: 0.0,
            val_accuracy: 0.0,
        }
    }

    pub fn with_training_summary(mut self, epochs: usize, train_accuracy: f64, val_accuracy: f64) -> Self {
        self.epochs = epochs;
        self.train_accuracy = train_accuracy;
        self.val_accuracy = val_accuracy;
        self
    }

    /// Check the manifest describes a network this build can construct
    pub fn validate(&self) -> Result<()> {
        if self.architecture != ARCHITECTURE {
            return Err(PlantDocError::ShapeMismatch(format!(
                "artifact was trained with architecture '{}', this build provides '{}'",
                self.architecture, ARCHITECTURE
            )));
        }
        if self.num_classes != self.classes.len() {
            return Err(PlantDocError::ShapeMismatch(format!(
                "manifest declares {} classes but lists {}",
                self.num_classes,
                self.classes.len()
            )));
        }
        if self.image_size < MIN_INPUT_SIZE {
            return Err(PlantDocError::ShapeMismatch(format!(
                "manifest image size {} is below the minimum of {}",
                self.image_size, MIN_INPUT_SIZE
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!("Label manifest saved to {:?}", path);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Save parameters and label manifest, replacing any previous artifact
pub fn save_model<B: Backend>(
    model: &DiseaseClassifier<B>,
    artifact: &ModelArtifact,
    manifest: &ModelManifest,
) -> Result<()> {
    if model.num_classes() != manifest.num_classes {
        return Err(PlantDocError::ShapeMismatch(format!(
            "model has {} outputs but the manifest lists {} classes",
            model.num_classes(),
            manifest.num_classes
        )));
    }

    if let Some(parent) = artifact.stem().parent() {
        fs::create_dir_all(parent)?;
    }

    model
        .clone()
        .save_file(artifact.record_path(), &ModelRecorder::new())
        .map_err(|e| PlantDocError::Serialization(format!("Failed to save model: {:?}", e)))?;
    manifest.save(&artifact.manifest_path())?;

    info!("Model saved to {:?}", artifact.record_path());
    Ok(())
}

/// A classifier restored from disk together with its label space
#[derive(Debug)]
pub struct LoadedModel<B: Backend> {
    pub model: DiseaseClassifier<B>,
    pub labels: LabelSpace,
    pub image_size: usize,
    pub manifest: Option<ModelManifest>,
}

/// Restore a classifier and its label space
///
/// The label space comes from the manifest. When `dataset_dir` is given its
/// class directories are resolved too and must agree with the manifest
/// exactly. An artifact without a manifest falls back to `dataset_dir`.
pub fn load_classifier<B: Backend>(
    artifact: &ModelArtifact,
    dataset_dir: Option<&Path>,
    device: &B::Device,
) -> Result<LoadedModel<B>> {
    let dir_labels = dataset_dir.map(LabelSpace::from_dir).transpose()?;

    let record_path = artifact.record_path();
    if !record_path.is_file() {
        return Err(PlantDocError::ModelNotFound(record_path));
    }

    let manifest_path = artifact.manifest_path();
    let manifest = if manifest_path.is_file() {
        let manifest = ModelManifest::load(&manifest_path)?;
        manifest.validate()?;
        Some(manifest)
    } else {
        None
    };

    let labels = match (&manifest, dir_labels) {
        (Some(manifest), Some(dir_labels)) => {
            check_labels_agree(&manifest.classes, &dir_labels)?;
            dir_labels
        }
        (Some(manifest), None) => manifest.classes.clone(),
        (None, Some(dir_labels)) => {
            warn!(
                "No label manifest at {:?}; using class directories as the label space",
                manifest_path
            );
            dir_labels
        }
        (None, None) => {
            return Err(PlantDocError::MissingDataset(format!(
                "no label manifest at {} and no dataset directory given",
                manifest_path.display()
            )))
        }
    };

    let image_size = manifest.as_ref().map_or(IMAGE_SIZE, |m| m.image_size);

    let record = ModelRecorder::new()
        .load(record_path.clone(), device)
        .map_err(|e| {
            PlantDocError::Serialization(format!(
                "Failed to read parameters from {}: {:?}",
                record_path.display(),
                e
            ))
        })?;
    let model = DiseaseClassifierConfig::new(labels.len())
        .init::<B>(device)
        .load_record(record);
    model.check_parameter_shapes(labels.len())?;

    info!(
        "Loaded model from {:?} ({} classes, {}x{} input)",
        record_path,
        labels.len(),
        image_size,
        image_size
    );

    Ok(LoadedModel {
        model,
        labels,
        image_size,
        manifest,
    })
}

/// Persisted and directory-derived label spaces must be identical
pub fn check_labels_agree(persisted: &LabelSpace, resolved: &LabelSpace) -> Result<()> {
    if persisted.len() != resolved.len() {
        return Err(PlantDocError::ShapeMismatch(format!(
            "model was trained on {} classes but the dataset directory has {}",
            persisted.len(),
            resolved.len()
        )));
    }

    if let Some((i, (a, b))) = persisted
        .iter()
        .zip(resolved.iter())
        .enumerate()
        .find(|(_, (a, b))| a != b)
    {
        return Err(PlantDocError::LabelMismatch(format!(
            "class {} is '{}' in the manifest but '{}' in the dataset directory",
            i, a, b
        )));
    }

    Ok(())
}
