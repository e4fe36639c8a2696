//! Dataset module for leaf image loading and preprocessing
//!
//! - Label space resolution from the training split
//! - Train/valid split enumeration
//! - Preprocessing and training-only augmentation
//! - Burn Dataset and Batcher implementations

pub mod augmentation;
pub mod burn_dataset;
pub mod label_space;
pub mod loader;
pub mod preprocess;

pub use augmentation::{AugmentationConfig, Augmenter};
pub use burn_dataset::{LeafBatch, LeafBatcher, LeafDataset, LeafItem};
pub use label_space::LabelSpace;
pub use loader::{DatasetLayout, DatasetStats, LeafSample};
pub use preprocess::{open_image, PreprocessConfig, Preprocessor};

/// Crop species prefix of a class name ("Tomato___Late_blight" → "Tomato")
pub fn crop_of(class_name: &str) -> &str {
    class_name.split("___").next().unwrap_or(class_name)
}

/// Human-readable form of a class name ("Tomato___Late_blight" → "Tomato - Late blight")
pub fn display_name(class_name: &str) -> String {
    match class_name.split_once("___") {
        Some((crop, condition)) => format!(
            "{} - {}",
            crop.replace('_', " "),
            condition.replace('_', " ").trim()
        ),
        None => class_name.replace('_', " "),
    }
}
