//! Supervised Training Implementation
//!
//! A custom training loop over Burn's autodiff API:
//! `Initializing → (Training → Validating) per epoch → Saved`.
//! The parameters after the final epoch are saved unconditionally; validation
//! accuracy is reported for monitoring only.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::{
    config::Config,
    data::dataloader::batcher::Batcher,
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{DatasetLayout, LeafBatcher, LeafDataset, PreprocessConfig, Preprocessor};
use crate::model::{
    save_model, DiseaseClassifier, DiseaseClassifierConfig, Mode, ModelArtifact, ModelManifest,
};
use crate::training::config::TrainingConfig;
use crate::utils::error::{PlantDocError, Result};
use crate::utils::logging::TrainingLogger;

/// Phase of a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    Initializing,
    Training { epoch: usize },
    Validating { epoch: usize },
    Saved,
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingPhase::Initializing => write!(f, "initializing"),
            TrainingPhase::Training { epoch } => write!(f, "training (epoch {})", epoch + 1),
            TrainingPhase::Validating { epoch } => write!(f, "validating (epoch {})", epoch + 1),
            TrainingPhase::Saved => write!(f, "saved"),
        }
    }
}

/// Metrics of one epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochReport {
    /// Epoch index (0-based)
    pub epoch: usize,
    /// Mean mini-batch loss
    pub train_loss: f64,
    /// Running training accuracy (percent)
    pub train_accuracy: f64,
    /// Validation accuracy (percent)
    pub val_accuracy: f64,
}

/// Outcome of a completed training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs: Vec<EpochReport>,
    pub num_classes: usize,
    pub train_samples: usize,
    pub valid_samples: usize,
    /// Path of the saved parameter record
    pub model_path: PathBuf,
    pub elapsed_secs: f64,
}

impl TrainingReport {
    pub fn final_epoch(&self) -> Option<&EpochReport> {
        self.epochs.last()
    }
}

/// Train a classifier on `dataset_root/{train,valid}` and save it to `artifact`
///
/// # Type Parameters
/// * `B` - The autodiff backend to use (e.g., `Autodiff<NdArray>`)
pub fn run_training<B>(
    dataset_root: &Path,
    artifact: &ModelArtifact,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<TrainingReport>
where
    B: AutodiffBackend,
{
    let start = Instant::now();
    let mut phase = TrainingPhase::Initializing;
    debug!("Training phase: {}", phase);

    config.validate()?;

    let (labels, train_samples, valid_samples) = DatasetLayout::new(dataset_root).load()?;
    if train_samples.is_empty() {
        return Err(PlantDocError::Dataset(format!(
            "no training images found under {}",
            dataset_root.join("train").display()
        )));
    }

    let image_size = config.image_size as u32;
    let train_dataset = LeafDataset::new(
        train_samples,
        Preprocessor::new(PreprocessConfig::train(image_size))?,
    );
    let valid_dataset = LeafDataset::new(
        valid_samples,
        Preprocessor::new(PreprocessConfig::eval(image_size))?,
    );

    info!(
        "Training on {} images ({} classes), validating on {} images",
        train_dataset.samples().len(),
        labels.len(),
        valid_dataset.samples().len()
    );
    for (label, count) in train_dataset.class_distribution(labels.len()).iter().enumerate() {
        debug!("  {:<45} {} images", labels.name(label).unwrap_or_default(), count);
    }

    let batcher = LeafBatcher::<B>::new(config.image_size);
    let mut model: DiseaseClassifier<B> = DiseaseClassifierConfig::new(labels.len()).init(device);
    let mut optimizer = AdamConfig::new().init();
    let loss_fn = CrossEntropyLossConfig::new().init(device);

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut logger = TrainingLogger::new(config.num_epochs);
    let mut epochs = Vec::with_capacity(config.num_epochs);

    for epoch in 0..config.num_epochs {
        phase = TrainingPhase::Training { epoch };
        debug!("Training phase: {}", phase);
        logger.start_epoch(epoch);

        let mut epoch_loss = 0.0f64;
        let mut correct = 0usize;
        let mut seen = 0usize;

        let indices = create_shuffled_indices(train_dataset.samples().len(), &mut rng);
        let num_batches = indices.len().div_ceil(config.batch_size);
        let progress = batch_progress_bar(num_batches);

        for batch_indices in indices.chunks(config.batch_size) {
            let items = train_dataset.load_items(batch_indices, &mut rng)?;
            let batch = batcher.batch(items, device);

            let output = model.forward(batch.images, Mode::Training);
            let loss = loss_fn.forward(output.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            epoch_loss += loss_value;
            correct += count_correct(output, batch.targets.clone());
            seen += batch.targets.dims()[0];

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);

            progress.set_message(format!(
                "loss {:.4} acc {:.2}%",
                loss_value,
                percent(correct, seen)
            ));
            progress.inc(1);
        }
        progress.finish_and_clear();

        let train_loss = epoch_loss / num_batches.max(1) as f64;
        let train_accuracy = percent(correct, seen);

        phase = TrainingPhase::Validating { epoch };
        debug!("Training phase: {}", phase);
        let val_accuracy = evaluate(&model.valid(), &valid_dataset, config.batch_size)?;

        logger.end_epoch(train_loss, train_accuracy, val_accuracy);
        epochs.push(EpochReport {
            epoch,
            train_loss,
            train_accuracy,
            val_accuracy,
        });
    }

    let (train_accuracy, val_accuracy) = epochs
        .last()
        .map_or((0.0, 0.0), |e| (e.train_accuracy, e.val_accuracy));
    let manifest = ModelManifest::new(labels.clone(), config.image_size).with_training_summary(
        config.num_epochs,
        train_accuracy,
        val_accuracy,
    );

    // Written before the parameters; a failed write leaves no new model behind
    if let Some(parent) = artifact.stem().parent() {
        std::fs::create_dir_all(parent)?;
    }
    config
        .save(artifact.config_path())
        .map_err(|e| PlantDocError::Serialization(format!("Failed to save training config: {}", e)))?;
    save_model(&model, artifact, &manifest)?;

    phase = TrainingPhase::Saved;
    debug!("Training phase: {}", phase);
    logger.log_complete(val_accuracy);

    Ok(TrainingReport {
        epochs,
        num_classes: labels.len(),
        train_samples: train_dataset.samples().len(),
        valid_samples: valid_dataset.samples().len(),
        model_path: artifact.record_path(),
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}

/// Create shuffled sample indices for an epoch
fn create_shuffled_indices(len: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);
    indices
}

/// Accuracy (percent) of an evaluation-mode model over a dataset
///
/// Samples are visited in order without augmentation. An empty dataset
/// scores 0.
pub fn evaluate<B: Backend>(
    model: &DiseaseClassifier<B>,
    dataset: &LeafDataset,
    batch_size: usize,
) -> Result<f64> {
    let device = model.devices().into_iter().next().unwrap_or_default();
    let batcher = LeafBatcher::<B>::new(dataset.preprocessor().config().image_size as usize);

    let mut correct = 0usize;
    let mut total = 0usize;

    let indices: Vec<usize> = (0..dataset.samples().len()).collect();
    for chunk in indices.chunks(batch_size.max(1)) {
        let mut items = Vec::with_capacity(chunk.len());
        for &index in chunk {
            if let Some(item) = dataset.load_item(index, None)? {
                items.push(item);
            }
        }
        if items.is_empty() {
            continue;
        }

        let batch = batcher.batch(items, &device);
        let output = model.forward(batch.images, Mode::Evaluating);
        total += batch.targets.dims()[0];
        correct += count_correct(output, batch.targets);
    }

    Ok(percent(correct, total))
}

fn count_correct<B: Backend>(output: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predictions = output.argmax(1).flatten::<1>(0, 1);
    let correct: i64 = predictions.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}

fn percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * correct as f64 / total as f64
    }
}

fn batch_progress_bar(num_batches: usize) -> ProgressBar {
    let progress = ProgressBar::new(num_batches as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(style.progress_chars("#>-"));
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::load_classifier;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use image::{ImageBuffer, Rgb};
    use std::fs;
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray>;

    fn write_images(dir: &Path, color: [u8; 3], count: usize) {
        fs::create_dir_all(dir).unwrap();
        for i in 0..count {
            let img = ImageBuffer::from_fn(80, 80, |x, y| {
                if (x + y + i as u32) % 9 == 0 {
                    Rgb([255, 255, 255])
                } else {
                    Rgb(color)
                }
            });
            img.save(dir.join(format!("leaf_{}.png", i))).unwrap();
        }
    }

    fn make_dataset(root: &Path) {
        write_images(&root.join("train/Apple___healthy"), [30, 160, 40], 3);
        write_images(&root.join("train/Tomato___Late_blight"), [120, 70, 20], 3);
        write_images(&root.join("valid/Apple___healthy"), [30, 160, 40], 1);
        write_images(&root.join("valid/Tomato___Late_blight"), [120, 70, 20], 1);
    }

    fn tiny_config() -> TrainingConfig {
        TrainingConfig::new()
            .with_num_epochs(2)
            .with_batch_size(4)
            .with_image_size(72)
            .with_seed(1)
    }

    #[test]
    fn test_training_saves_loadable_artifact() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        make_dataset(&data);
        let artifact = ModelArtifact::new(tmp.path().join("models/leaf"));

        let device = Default::default();
        let report = run_training::<TestBackend>(&data, &artifact, &tiny_config(), &device).unwrap();

        assert_eq!(report.epochs.len(), 2);
        assert_eq!(report.num_classes, 2);
        assert_eq!(report.train_samples, 6);
        assert_eq!(report.valid_samples, 2);
        for epoch in &report.epochs {
            assert!(epoch.train_loss.is_finite());
            assert!((0.0..=100.0).contains(&epoch.train_accuracy));
            assert!((0.0..=100.0).contains(&epoch.val_accuracy));
        }

        assert!(artifact.record_path().is_file());
        assert!(artifact.config_path().is_file());

        let loaded = load_classifier::<NdArray>(&artifact, Some(&data.join("train")), &device).unwrap();
        assert_eq!(
            loaded.labels.as_slice(),
            &["Apple___healthy", "Tomato___Late_blight"]
        );
        assert_eq!(loaded.image_size, 72);
        let manifest = loaded.manifest.unwrap();
        assert_eq!(manifest.epochs, 2);
        assert_eq!(manifest.val_accuracy, report.final_epoch().unwrap().val_accuracy);
    }

    #[test]
    fn test_empty_validation_split_scores_zero() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        write_images(&data.join("train/Apple___healthy"), [30, 160, 40], 2);
        write_images(&data.join("train/Grape___healthy"), [20, 90, 60], 2);
        fs::create_dir_all(data.join("valid")).unwrap();
        let artifact = ModelArtifact::new(tmp.path().join("leaf"));

        let device = Default::default();
        let config = tiny_config().with_num_epochs(1);
        let report = run_training::<TestBackend>(&data, &artifact, &config, &device).unwrap();
        assert_eq!(report.epochs[0].val_accuracy, 0.0);
    }

    #[test]
    fn test_failed_config_write_leaves_no_model() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        make_dataset(&data);
        let artifact = ModelArtifact::new(tmp.path().join("leaf"));
        fs::create_dir_all(artifact.config_path()).unwrap();

        let device = Default::default();
        let config = tiny_config().with_num_epochs(1);
        let err = run_training::<TestBackend>(&data, &artifact, &config, &device).unwrap_err();
        assert!(matches!(err, PlantDocError::Serialization(_)));
        assert!(!artifact.record_path().exists());
        assert!(!artifact.manifest_path().exists());
    }

    #[test]
    fn test_missing_dataset_root() {
        let tmp = TempDir::new().unwrap();
        let artifact = ModelArtifact::new(tmp.path().join("leaf"));

        let device = Default::default();
        let err = run_training::<TestBackend>(&tmp.path().join("absent"), &artifact, &tiny_config(), &device)
            .unwrap_err();
        assert!(matches!(err, PlantDocError::MissingDataset(_)));
        assert!(!artifact.record_path().exists());
    }

    #[test]
    fn test_shuffled_indices_are_a_seeded_permutation() {
        let a = create_shuffled_indices(20, &mut ChaCha8Rng::seed_from_u64(5));
        let b = create_shuffled_indices(20, &mut ChaCha8Rng::seed_from_u64(5));
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }
}
