//! Burn Dataset Integration for Leaf Images
//!
//! Implements Burn's `Dataset` trait and `Batcher` for lazy, per-batch image
//! decoding during training and validation.

use std::marker::PhantomData;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::loader::LeafSample;
use crate::dataset::preprocess::Preprocessor;
use crate::utils::error::Result;

/// A single preprocessed item ready for Burn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeafItem {
    /// Image data as flattened CHW float array [3 * H * W]
    pub image: Vec<f32>,
    /// Class index in the training label space
    pub label: usize,
    /// Image path (for debugging/logging)
    pub path: String,
}

/// Leaf image dataset that decodes images on demand
#[derive(Debug, Clone)]
pub struct LeafDataset {
    samples: Vec<LeafSample>,
    preprocessor: Preprocessor,
}

impl LeafDataset {
    pub fn new(samples: Vec<LeafSample>, preprocessor: Preprocessor) -> Self {
        Self {
            samples,
            preprocessor,
        }
    }

    pub fn samples(&self) -> &[LeafSample] {
        &self.samples
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Decode and preprocess one sample
    pub fn load_item(&self, index: usize, rng: Option<&mut ChaCha8Rng>) -> Result<Option<LeafItem>> {
        let Some(sample) = self.samples.get(index) else {
            return Ok(None);
        };

        let image = self.preprocessor.load(&sample.path, rng)?;
        Ok(Some(LeafItem {
            image,
            label: sample.label,
            path: sample.path.to_string_lossy().to_string(),
        }))
    }

    /// Decode a batch of samples in parallel
    ///
    /// One seed per item is drawn from `rng` in index order before decoding,
    /// so augmentation stays reproducible regardless of thread scheduling.
    /// The first decode failure aborts the batch.
    pub fn load_items(&self, indices: &[usize], rng: &mut ChaCha8Rng) -> Result<Vec<LeafItem>> {
        let seeded: Vec<(usize, u64)> = indices.iter().map(|&i| (i, rng.gen())).collect();

        let items: Vec<Option<LeafItem>> = seeded
            .par_iter()
            .map(|&(index, seed)| {
                let mut item_rng = ChaCha8Rng::seed_from_u64(seed);
                self.load_item(index, Some(&mut item_rng))
            })
            .collect::<Result<_>>()?;

        Ok(items.into_iter().flatten().collect())
    }

    /// Get samples per class count
    pub fn class_distribution(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for sample in &self.samples {
            if sample.label < num_classes {
                counts[sample.label] += 1;
            }
        }
        counts
    }
}

/// Unaugmented access for Burn's data tooling
///
/// `get` returns `None` for an unreadable image as well as for an
/// out-of-range index. The training loop uses `load_items`, which reports
/// `ImageNotFound` and `Decode` instead.
impl Dataset<LeafItem> for LeafDataset {
    fn get(&self, index: usize) -> Option<LeafItem> {
        self.load_item(index, None).ok().flatten()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of leaf images
#[derive(Clone, Debug)]
pub struct LeafBatch<B: Backend> {
    /// Batch of images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Batch of labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher stacking preprocessed items into tensors
#[derive(Clone, Debug)]
pub struct LeafBatcher<B: Backend> {
    image_size: usize,
    _backend: PhantomData<B>,
}

impl<B: Backend> LeafBatcher<B> {
    pub fn new(image_size: usize) -> Self {
        Self {
            image_size,
            _backend: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, LeafItem, LeafBatch<B>> for LeafBatcher<B> {
    fn batch(&self, items: Vec<LeafItem>, device: &B::Device) -> LeafBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let mut images_data = Vec::with_capacity(batch_size * 3 * size * size);
        let mut targets_data = Vec::with_capacity(batch_size);
        for item in items {
            images_data.extend(item.image);
            targets_data.push(item.label as i64);
        }

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, size, size]),
            device,
        );
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        LeafBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::preprocess::PreprocessConfig;
    use crate::utils::error::PlantDocError;
    use burn_ndarray::NdArray;
    use image::{ImageBuffer, Rgb};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn write_image(path: &Path, color: [u8; 3]) {
        ImageBuffer::from_fn(40, 30, |x, _| {
            if x < 20 {
                Rgb(color)
            } else {
                Rgb([0, 0, 0])
            }
        })
        .save(path)
        .unwrap();
    }

    fn make_dataset(tmp: &TempDir, augment: bool) -> LeafDataset {
        let mut samples = Vec::new();
        for (i, color) in [[255, 0, 0], [0, 255, 0], [0, 0, 255]].iter().enumerate() {
            let path: PathBuf = tmp.path().join(format!("img{}.png", i));
            write_image(&path, *color);
            samples.push(LeafSample {
                path,
                label: i % 2,
                class_name: format!("class{}", i % 2),
            });
        }

        let config = PreprocessConfig {
            image_size: 24,
            augment,
        };
        LeafDataset::new(samples, Preprocessor::new(config).unwrap())
    }

    #[test]
    fn test_dataset_get() {
        let tmp = TempDir::new().unwrap();
        let dataset = make_dataset(&tmp, false);

        assert_eq!(dataset.len(), 3);
        let item = dataset.get(1).unwrap();
        assert_eq!(item.label, 1);
        assert_eq!(item.image.len(), 3 * 24 * 24);
        assert!(dataset.get(3).is_none());
        assert_eq!(dataset.class_distribution(2), vec![2, 1]);
    }

    #[test]
    fn test_load_items_is_reproducible() {
        let tmp = TempDir::new().unwrap();
        let dataset = make_dataset(&tmp, true);

        let a = dataset
            .load_items(&[2, 0, 1], &mut ChaCha8Rng::seed_from_u64(11))
            .unwrap();
        let b = dataset
            .load_items(&[2, 0, 1], &mut ChaCha8Rng::seed_from_u64(11))
            .unwrap();

        assert_eq!(a.len(), 3);
        assert_eq!(a[0].label, 0);
        assert_eq!(a[0].path, b[0].path);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.image, y.image);
        }
    }

    #[test]
    fn test_load_items_propagates_decode_errors() {
        let tmp = TempDir::new().unwrap();
        let bad = tmp.path().join("bad.png");
        std::fs::write(&bad, b"garbage").unwrap();

        let samples = vec![LeafSample {
            path: bad,
            label: 0,
            class_name: "class0".to_string(),
        }];
        let dataset = LeafDataset::new(samples, Preprocessor::new(PreprocessConfig::eval(24)).unwrap());

        assert!(dataset
            .load_items(&[0], &mut ChaCha8Rng::seed_from_u64(0))
            .is_err());
        assert!(matches!(
            dataset.load_item(0, None),
            Err(PlantDocError::Decode(..))
        ));
        assert!(dataset.get(0).is_none());
    }

    #[test]
    fn test_batcher_shapes() {
        let tmp = TempDir::new().unwrap();
        let dataset = make_dataset(&tmp, false);
        let items: Vec<_> = (0..3).filter_map(|i| dataset.get(i)).collect();

        let device = Default::default();
        let batcher = LeafBatcher::<TestBackend>::new(24);
        let batch = batcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [3, 3, 24, 24]);
        assert_eq!(batch.targets.dims(), [3]);

        let targets = batch.targets.into_data().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![0, 1, 0]);
    }
}
