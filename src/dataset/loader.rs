//! Leaf Image Dataset Loader
//!
//! Enumerates the `train` and `valid` splits of a dataset root and maps every
//! image to its class index in the training label space.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::dataset::crop_of;
use crate::dataset::label_space::LabelSpace;
use crate::utils::error::{PlantDocError, Result};

/// File extensions treated as images
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A single image sample with its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class index in the training label space
    pub label: usize,
    /// Class name (e.g., "Tomato___Late_blight")
    pub class_name: String,
}

/// Dataset root laid out as `root/{train,valid}/<class>/<image>`
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn train_dir(&self) -> PathBuf {
        self.root.join("train")
    }

    pub fn valid_dir(&self) -> PathBuf {
        self.root.join("valid")
    }

    /// Resolve the label space from the training split
    pub fn label_space(&self) -> Result<LabelSpace> {
        LabelSpace::from_dir(self.train_dir())
    }

    /// Load both splits, indexed by the training label space
    pub fn load(&self) -> Result<(LabelSpace, Vec<LeafSample>, Vec<LeafSample>)> {
        info!("Loading dataset from: {:?}", self.root);

        let labels = self.label_space()?;
        let train = load_split(&self.train_dir(), &labels)?;
        let valid = load_split(&self.valid_dir(), &labels)?;

        info!(
            "Found {} classes, {} training and {} validation images",
            labels.len(),
            train.len(),
            valid.len()
        );

        Ok((labels, train, valid))
    }
}

/// Enumerate one split directory
///
/// Every class directory of the split must exist in `labels`. Files without an
/// image extension are skipped. Samples come out ordered by class index and
/// then by file name.
pub fn load_split(split_dir: &Path, labels: &LabelSpace) -> Result<Vec<LeafSample>> {
    if !split_dir.is_dir() {
        return Err(PlantDocError::MissingDataset(format!(
            "split directory does not exist: {}",
            split_dir.display()
        )));
    }

    let mut class_dirs: Vec<(usize, String)> = Vec::new();
    for entry in std::fs::read_dir(split_dir)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let label = labels.index_of(&name).ok_or_else(|| {
            PlantDocError::Dataset(format!(
                "class '{}' in {} is not part of the training label space",
                name,
                split_dir.display()
            ))
        })?;
        class_dirs.push((label, name));
    }
    class_dirs.sort();

    let mut samples = Vec::new();
    for (label, class_name) in class_dirs {
        let before = samples.len();

        for entry in WalkDir::new(split_dir.join(&class_name))
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() && is_image_file(entry.path()) {
                samples.push(LeafSample {
                    path: entry.path().to_path_buf(),
                    label,
                    class_name: class_name.clone(),
                });
            }
        }

        debug!(
            "Class '{}' (label {}): {} images",
            class_name,
            label,
            samples.len() - before
        );
    }

    Ok(samples)
}

/// Whether a path has one of the recognized image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Per-class image counts of both splits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub class_names: Vec<String>,
    pub train_counts: Vec<usize>,
    pub valid_counts: Vec<usize>,
}

impl DatasetStats {
    /// Count images per class in a dataset root
    pub fn collect(layout: &DatasetLayout) -> Result<Self> {
        let (labels, train, valid) = layout.load()?;
        Ok(Self::from_samples(&labels, &train, &valid))
    }

    pub fn from_samples(labels: &LabelSpace, train: &[LeafSample], valid: &[LeafSample]) -> Self {
        let count = |samples: &[LeafSample]| {
            let mut counts = vec![0usize; labels.len()];
            for sample in samples {
                counts[sample.label] += 1;
            }
            counts
        };

        Self {
            class_names: labels.as_slice().to_vec(),
            train_counts: count(train),
            valid_counts: count(valid),
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn total_train(&self) -> usize {
        self.train_counts.iter().sum()
    }

    pub fn total_valid(&self) -> usize {
        self.valid_counts.iter().sum()
    }

    /// Number of distinct crop species among the classes
    pub fn num_crops(&self) -> usize {
        self.class_names
            .iter()
            .map(|name| crop_of(name))
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Print statistics to console
    pub fn print(&self) {
        println!("\n📊 Dataset Statistics:");
        println!("  Classes: {}", self.num_classes());
        println!("  Crops: {}", self.num_crops());
        println!("  Training images: {}", self.total_train());
        println!("  Validation images: {}", self.total_valid());
        println!("\n  {:>3}  {:45} {:>7} {:>7}", "#", "class", "train", "valid");

        let total = self.total_train().max(1);
        for (idx, name) in self.class_names.iter().enumerate() {
            let bar_len = (self.train_counts[idx] as f32 / total as f32 * 40.0) as usize;
            println!(
                "  {:3}. {:45} {:7} {:7} {}",
                idx,
                name,
                self.train_counts[idx],
                self.valid_counts[idx],
                "█".repeat(bar_len)
            );
        }
    }
}
