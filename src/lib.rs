//! # Cargar: Model Loading & Trainer Construction
//!
//! Cargar is the orchestration layer around an opaque parameter-graph
//! runtime: it resolves serialized model archives on disk, drives
//! deserialization with a load-time freeze policy, constructs trainers with
//! the unfreeze policy applied, and parses the fixed CLI schema of training
//! scripts into a typed configuration.
//!
//! ## Architecture
//!
//! - **engine**: devices, parameters, the opaque `Graph`/`Engine` seam, and
//!   the safetensors-backed reference engine
//! - **model**: model handle, prioritized model-file resolution, load
//!   orchestration, artifact enumeration
//! - **train**: trainer construction policy and initializers
//! - **args**: typed CLI configuration for training scripts

pub mod args;
pub mod engine;
pub mod model;
pub mod train;

pub mod error;

// Re-export commonly used types
pub use args::{parse_args, TrainingArgs, TrainingConfig, DEFAULT_ENGINE};
pub use engine::{Device, Engine, Graph, Parameter, ParameterKind};
pub use error::{Error, Result};
pub use model::{LoadOptions, Model};
pub use train::{Trainer, TrainerConfig};
