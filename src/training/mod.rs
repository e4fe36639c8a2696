//! Training module
//!
//! - Hyperparameters as a Burn `Config`
//! - Supervised training loop (cross-entropy, Adam, fixed learning rate)
//! - Per-epoch validation accuracy for monitoring

pub mod config;
pub mod supervised;

pub use config::TrainingConfig;
pub use supervised::{run_training, EpochReport, TrainingPhase, TrainingReport};
