//! Training-script argument parsing
//!
//! Fixed option schema parsed single-pass into an immutable
//! [`TrainingConfig`] record.
//!
//! # Usage
//!
//! ```bash
//! cargar --epoch 10 --max-gpus 2 --model-dir ./resnet
//! cargar -e 10 -g 2 -d ./resnet -r '{"layers": "18"}'
//! ```

use crate::engine::Device;
use clap::Parser;
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

/// Engine used when no `--engine` flag is given.
pub const DEFAULT_ENGINE: &str = "PyTorch";

/// Raw command-line schema for training scripts.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "cargar")]
#[command(version)]
#[command(about = "Model loading and trainer construction for parameter-graph runtimes")]
pub struct TrainingArgs {
    /// Number of epochs to train
    #[arg(short = 'e', long, default_value_t = 2)]
    pub epoch: usize,

    /// Batch size of the training data (defaults to 32 per device)
    #[arg(short = 'b', long)]
    pub batch_size: Option<usize>,

    /// Max number of GPUs to use for training
    #[arg(short = 'g', long, default_value_t = 0)]
    pub max_gpus: usize,

    /// Use pre-trained weights
    #[arg(short = 'p', long)]
    pub pre_trained: bool,

    /// Directory to save model parameters to
    #[arg(short = 'o', long, default_value = "build/model")]
    pub output_dir: PathBuf,

    /// Limit each epoch to a fixed number of batches
    #[arg(short = 'm', long)]
    pub max_batches: Option<u64>,

    /// Pre-trained model file directory
    #[arg(short = 'd', long)]
    pub model_dir: Option<PathBuf>,

    /// Criteria for selecting the model, as a JSON object
    #[arg(short = 'r', long, value_parser = parse_criteria)]
    pub criteria: Option<HashMap<String, String>>,

    /// Engine to run the model on
    #[arg(long, default_value = DEFAULT_ENGINE)]
    pub engine: String,
}

fn parse_criteria(raw: &str) -> Result<HashMap<String, String>, String> {
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| format!("criteria must be a JSON object: {e}"))?;
    Ok(object
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

/// Resolved training configuration, read-only after parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingConfig {
    pub epoch: usize,
    pub batch_size: usize,
    pub max_gpus: usize,
    pub pre_trained: bool,
    pub output_dir: PathBuf,
    /// Total iteration budget per epoch, in samples.
    pub limit: u64,
    pub model_dir: Option<PathBuf>,
    pub criteria: Option<HashMap<String, String>>,
    pub engine: String,
}

impl TrainingConfig {
    /// Resolve defaults that depend on other options: batch size falls back
    /// to 32 per requested GPU (32 flat without GPUs), and `max_batches`
    /// scales to a sample budget.
    pub fn from_args(args: &TrainingArgs) -> Self {
        let batch_size = args.batch_size.unwrap_or(if args.max_gpus > 0 {
            32 * args.max_gpus
        } else {
            32
        });
        let limit = args
            .max_batches
            .map(|batches| batches * batch_size as u64)
            .unwrap_or(u64::MAX);
        Self {
            epoch: args.epoch,
            batch_size,
            max_gpus: args.max_gpus,
            pre_trained: args.pre_trained,
            output_dir: args.output_dir.clone(),
            limit,
            model_dir: args.model_dir.clone(),
            criteria: args.criteria.clone(),
            engine: args.engine.clone(),
        }
    }

    /// Devices to train on: the requested GPUs, or the CPU without any.
    pub fn devices(&self) -> Vec<Device> {
        if self.max_gpus > 0 {
            (0..self.max_gpus).map(Device::Cuda).collect()
        } else {
            vec![Device::Cpu]
        }
    }
}

/// Parse CLI arguments into a resolved configuration.
///
/// On parse failure or an explicit help request, usage is printed and `None`
/// is returned; callers must check for the no-configuration sentinel.
pub fn parse_args<I, T>(args: I) -> Option<TrainingConfig>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match TrainingArgs::try_parse_from(args) {
        Ok(parsed) => Some(TrainingConfig::from_args(&parsed)),
        Err(err) => {
            let _ = err.print();
            None
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_epoch_round_trips(epoch in 1usize..10_000) {
            let epoch_str = epoch.to_string();
            let config = parse_args(["cargar", "--epoch", &epoch_str]).unwrap();
            prop_assert_eq!(config.epoch, epoch);
        }

        #[test]
        fn prop_batch_size_is_32_per_gpu(gpus in 1usize..64) {
            let gpus_str = gpus.to_string();
            let config = parse_args(["cargar", "--max-gpus", &gpus_str]).unwrap();
            prop_assert_eq!(config.batch_size, 32 * gpus);
            prop_assert_eq!(config.devices().len(), gpus);
        }

        #[test]
        fn prop_limit_scales_with_batch_size(
            batches in 1u64..1_000,
            batch_size in 1usize..1_024
        ) {
            let batches_str = batches.to_string();
            let batch_str = batch_size.to_string();
            let config = parse_args([
                "cargar",
                "--max-batches", &batches_str,
                "--batch-size", &batch_str,
            ])
            .unwrap();
            prop_assert_eq!(config.limit, batches * batch_size as u64);
        }

        #[test]
        fn prop_string_criteria_round_trip(
            key in "[a-z][a-z0-9_]{0,12}",
            value in "[a-zA-Z0-9._-]{1,16}"
        ) {
            let json = format!("{{\"{key}\": \"{value}\"}}");
            let config = parse_args(["cargar", "--criteria", &json]).unwrap();
            prop_assert_eq!(config.criteria.unwrap().get(&key).unwrap(), &value);
        }
    }
}
