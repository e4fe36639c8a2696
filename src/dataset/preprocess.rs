//! Preprocessing Transform
//!
//! One pipeline shared by training, validation and inference:
//! decode → RGB → exact resize (triangle filter) → optional augmentation →
//! CHW `f32` tensor data scaled to `[0, 1]`. Only the `augment` flag differs
//! between the training split and everything else.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::dataset::augmentation::{AugmentationConfig, Augmenter};
use crate::model::cnn::MIN_INPUT_SIZE;
use crate::utils::error::{PlantDocError, Result};
use crate::IMAGE_SIZE;

/// Preprocessing settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Output height and width in pixels
    pub image_size: u32,
    /// Apply random augmentation (training split only)
    pub augment: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            image_size: IMAGE_SIZE as u32,
            augment: false,
        }
    }
}

impl PreprocessConfig {
    /// Evaluation preprocessing: no augmentation
    pub fn eval(image_size: u32) -> Self {
        Self {
            image_size,
            augment: false,
        }
    }

    /// Training preprocessing: with augmentation
    pub fn train(image_size: u32) -> Self {
        Self {
            image_size,
            augment: true,
        }
    }
}

/// Image preprocessor
#[derive(Clone, Debug)]
pub struct Preprocessor {
    config: PreprocessConfig,
    augmenter: Augmenter,
}

impl Preprocessor {
    /// Create a preprocessor, rejecting sizes the classifier cannot consume
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        if (config.image_size as usize) < MIN_INPUT_SIZE {
            return Err(PlantDocError::Config(format!(
                "image size {} is below the classifier minimum of {}",
                config.image_size, MIN_INPUT_SIZE
            )));
        }

        Ok(Self {
            config,
            augmenter: Augmenter::new(AugmentationConfig::default()),
        })
    }

    /// Active settings
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Number of `f32` values produced per image (`3 * size * size`)
    pub fn tensor_len(&self) -> usize {
        let size = self.config.image_size as usize;
        3 * size * size
    }

    /// Transform a decoded image into CHW tensor data
    ///
    /// Augmentation runs only when the config enables it and an RNG is given.
    pub fn apply(&self, img: DynamicImage, rng: Option<&mut ChaCha8Rng>) -> Vec<f32> {
        let size = self.config.image_size;
        let mut result = img.resize_exact(size, size, FilterType::Triangle);

        if self.config.augment {
            if let Some(rng) = rng {
                result = self.augmenter.augment(result, rng);
            }
        }

        to_tensor_data(&result)
    }

    /// Decode an image file and transform it
    pub fn load(&self, path: &Path, rng: Option<&mut ChaCha8Rng>) -> Result<Vec<f32>> {
        let img = open_image(path)?;
        Ok(self.apply(img, rng))
    }
}

/// Decode an image file
///
/// Fails with `ImageNotFound` when the path does not exist and with `Decode`
/// when the content is not a supported image.
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    if !path.is_file() {
        return Err(PlantDocError::ImageNotFound(path.to_path_buf()));
    }

    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| PlantDocError::Decode(path.to_path_buf(), e.to_string()))
}

/// Convert image to CHW float tensor data normalized to [0, 1]
pub fn to_tensor_data(img: &DynamicImage) -> Vec<f32> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let plane = width as usize * height as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (i, pixel) in rgb.pixels().enumerate() {
        data[i] = pixel[0] as f32 / 255.0;
        data[plane + i] = pixel[1] as f32 / 255.0;
        data[2 * plane + i] = pixel[2] as f32 / 255.0;
    }

    data
}
