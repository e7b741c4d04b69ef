//! Cargar CLI
//!
//! Training-script driver: parses the fixed option schema, loads the model
//! directory when one is given, and reports the constructed trainer.
//!
//! # Usage
//!
//! ```bash
//! # Inspect a model directory with training defaults
//! cargar --model-dir ./models/resnet
//!
//! # Derive the batch size from the device count
//! cargar --model-dir ./models/resnet --max-gpus 2
//!
//! # Keep pre-trained weights frozen at load time
//! cargar --model-dir ./models/resnet --pre-trained
//! ```

use cargar::train::TrainerConfig;
use cargar::{parse_args, LoadOptions, Model, TrainingConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Some(config) = parse_args(std::env::args()) else {
        // Usage was already printed; no configuration produced.
        return ExitCode::FAILURE;
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &TrainingConfig) -> cargar::Result<()> {
    let devices: Vec<String> = config.devices().iter().map(ToString::to_string).collect();
    println!("Engine: {}", config.engine);
    println!("Devices: {}", devices.join(", "));
    println!("Epochs: {}, batch size: {}", config.epoch, config.batch_size);
    if config.limit != u64::MAX {
        println!("Sample limit per epoch: {}", config.limit);
    }
    println!("Output dir: {}", config.output_dir.display());
    if let Some(criteria) = &config.criteria {
        for (key, value) in criteria {
            println!("Criteria: {key}={value}");
        }
    }

    let Some(model_dir) = &config.model_dir else {
        println!("No --model-dir given; nothing to load.");
        return Ok(());
    };

    let mut model = Model::new("model");
    let options = LoadOptions::new().with_train_param(!config.pre_trained);
    model.load(model_dir, None, &options)?;
    println!("Loaded model {} from {}", model.name(), model_dir.display());

    let trainer = model.new_trainer(&TrainerConfig::new())?;
    println!(
        "Trainer ready: {} parameters ({} trainable)",
        trainer.parameters().len(),
        trainer.trainable_parameters().len()
    );

    let artifacts = model.artifact_names();
    if !artifacts.is_empty() {
        println!("Artifacts:");
        for name in artifacts {
            println!("  {name}");
        }
    }
    Ok(())
}
