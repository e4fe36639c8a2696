//! Training hyperparameters

use burn::config::Config;

use crate::model::cnn::MIN_INPUT_SIZE;
use crate::utils::error::PlantDocError;

/// Hyperparameters of a supervised training run
///
/// Saved next to the model as `<stem>.config.json`.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Number of passes over the training split
    #[config(default = "5")]
    pub num_epochs: usize,

    /// Mini-batch size
    #[config(default = "32")]
    pub batch_size: usize,

    /// Fixed Adam learning rate
    #[config(default = "1.0e-3")]
    pub learning_rate: f64,

    /// Seed for shuffling and augmentation
    #[config(default = "42")]
    pub seed: u64,

    /// Square input side in pixels
    #[config(default = "128")]
    pub image_size: usize,
}

impl TrainingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> crate::utils::error::Result<()> {
        if self.num_epochs == 0 {
            return Err(PlantDocError::Config("num_epochs must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(PlantDocError::Config("batch_size must be at least 1".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(PlantDocError::Config(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if self.image_size < MIN_INPUT_SIZE {
            return Err(PlantDocError::Config(format!(
                "image_size must be at least {}, got {}",
                MIN_INPUT_SIZE, self.image_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::new();
        assert_eq!(config.num_epochs, 5);
        assert_eq!(config.batch_size, 32);
        assert!((config.learning_rate - 1e-3).abs() < 1e-12);
        assert_eq!(config.seed, 42);
        assert_eq!(config.image_size, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(TrainingConfig::new().with_num_epochs(0).validate().is_err());
        assert!(TrainingConfig::new().with_batch_size(0).validate().is_err());
        assert!(TrainingConfig::new().with_learning_rate(-1.0).validate().is_err());
        assert!(TrainingConfig::new().with_image_size(16).validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("model.config.json");

        let config = TrainingConfig::new().with_num_epochs(2).with_seed(7);
        config.save(&path).unwrap();

        let loaded = TrainingConfig::load(&path).unwrap();
        assert_eq!(loaded.num_epochs, 2);
        assert_eq!(loaded.seed, 7);
    }
}
