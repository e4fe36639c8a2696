//! PlantDoc CLI
//!
//! Train the leaf disease classifier, diagnose single images, and manage the
//! disease metadata table. `infer` prints exactly one JSON document on
//! stdout; all diagnostics go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use plantdoc::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use plantdoc::dataset::{display_name, DatasetLayout, DatasetStats};
use plantdoc::inference::{run_inference, DiseaseTable, InferenceOptions};
use plantdoc::model::ModelArtifact;
use plantdoc::training::{run_training, TrainingConfig};
use plantdoc::utils::format_duration;
use plantdoc::utils::logging::{init_logging, LogConfig};
use plantdoc::{
    PlantDocError, DEFAULT_DATASET_DIR, DEFAULT_METADATA_PATH, DEFAULT_MODEL_STEM, VERSION,
};

/// Plant leaf disease classification
#[derive(Parser, Debug)]
#[command(name = "plantdoc")]
#[command(version)]
#[command(about = "Plant leaf disease classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the classifier on <data-dir>/{train,valid}
    Train {
        /// Dataset root containing train/ and valid/
        #[arg(short, long, default_value = DEFAULT_DATASET_DIR)]
        data_dir: PathBuf,

        /// Model artifact stem (writes <stem>.mpk, <stem>.classes.json, <stem>.config.json)
        #[arg(short, long, default_value = DEFAULT_MODEL_STEM)]
        model: PathBuf,

        /// Number of training epochs
        #[arg(short, long, default_value = "5")]
        epochs: usize,

        /// Batch size for training
        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// Random seed for shuffling and augmentation
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Input image size (square)
        #[arg(long, default_value = "128")]
        image_size: usize,
    },

    /// Diagnose a single leaf image and print the result as JSON
    Infer {
        /// Path to the image
        image: PathBuf,

        /// Model artifact stem
        #[arg(short, long, default_value = DEFAULT_MODEL_STEM)]
        model: PathBuf,

        /// Disease metadata table
        #[arg(long, default_value = DEFAULT_METADATA_PATH)]
        metadata: PathBuf,

        /// Training split whose class directories must match the model's label space
        #[arg(long)]
        classes_dir: Option<PathBuf>,
    },

    /// Write the built-in disease metadata table
    Metadata {
        /// Output path
        #[arg(short, long, default_value = DEFAULT_METADATA_PATH)]
        output: PathBuf,
    },

    /// Show per-class image counts of a dataset
    Stats {
        /// Dataset root containing train/ and valid/
        #[arg(short, long, default_value = DEFAULT_DATASET_DIR)]
        data_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            let code = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<PlantDocError>())
                .map_or(1, PlantDocError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Train {
            data_dir,
            model,
            epochs,
            batch_size,
            learning_rate,
            seed,
            image_size,
        } => {
            let config = TrainingConfig::new()
                .with_num_epochs(epochs)
                .with_batch_size(batch_size)
                .with_learning_rate(learning_rate)
                .with_seed(seed)
                .with_image_size(image_size);
            cmd_train(&data_dir, &model, &config)
        }

        Commands::Infer {
            image,
            model,
            metadata,
            classes_dir,
        } => cmd_infer(&image, &model, &metadata, classes_dir),

        Commands::Metadata { output } => cmd_metadata(&output),

        Commands::Stats { data_dir } => cmd_stats(&data_dir),
    }
}

fn cmd_train(data_dir: &Path, model: &Path, config: &TrainingConfig) -> Result<()> {
    println!("{} v{}", "🌿 PlantDoc".green().bold(), VERSION);
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  📁 Dataset:       {}", data_dir.display());
    println!("  💾 Model:         {}", model.display());
    println!("  🔄 Epochs:        {}", config.num_epochs);
    println!("  📦 Batch size:    {}", config.batch_size);
    println!("  📈 Learning rate: {}", config.learning_rate);
    println!("  🖼️  Image size:    {}x{}", config.image_size, config.image_size);
    println!("  🧠 Backend:       {}", backend_name());
    println!();

    let artifact = ModelArtifact::new(model);
    let device = default_device();
    let report = run_training::<TrainingBackend>(data_dir, &artifact, config, &device)
        .context("Training failed")?;

    println!();
    println!("{}", "Training Complete!".green().bold());
    for epoch in &report.epochs {
        println!(
            "  Epoch {:>2}: loss {:.4} | train {:.2}% | val {:.2}%",
            epoch.epoch + 1,
            epoch.train_loss,
            epoch.train_accuracy,
            epoch.val_accuracy
        );
    }
    println!("  🏷️  Classes:  {}", report.num_classes);
    println!("  ⏱️  Duration: {}", format_duration(report.elapsed_secs));
    println!("  💾 Saved to: {}", report.model_path.display());
    println!();
    println!("{}", "Next steps:".cyan().bold());
    println!(
        "  • Diagnose an image: plantdoc infer <image> --model {}",
        model.display()
    );

    Ok(())
}

fn cmd_infer(image: &Path, model: &Path, metadata: &Path, classes_dir: Option<PathBuf>) -> Result<()> {
    info!("Running inference on {:?} with {}", image, backend_name());

    let options = InferenceOptions {
        artifact: ModelArtifact::new(model),
        dataset_dir: classes_dir,
        metadata_path: metadata.to_path_buf(),
    };
    let device = default_device();
    let result = run_inference::<DefaultBackend>(image, &options, &device)?;

    info!(
        "{} ({}, {:.2}%)",
        display_name(&result.detected),
        result.status,
        result.confidence * 100.0
    );
    println!("{}", serde_json::to_string(&result)?);

    Ok(())
}

fn cmd_metadata(output: &Path) -> Result<()> {
    let table = DiseaseTable::builtin()?;
    table
        .write_to(output)
        .with_context(|| format!("Failed to write metadata table to {}", output.display()))?;

    println!(
        "{} {} entries written to {}",
        "✅".green(),
        table.len(),
        output.display()
    );
    Ok(())
}

fn cmd_stats(data_dir: &Path) -> Result<()> {
    let stats = DatasetStats::collect(&DatasetLayout::new(data_dir))?;
    stats.print();
    Ok(())
}
