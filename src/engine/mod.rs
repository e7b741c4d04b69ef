//! Opaque runtime boundary: devices, parameters, graphs, and engines
//!
//! A [`Graph`] is the deserialized computation graph owned by a runtime.
//! Everything a runtime must provide to participate in model loading is the
//! [`Engine`] trait; the crate ships [`StateEngine`], a safetensors-backed
//! reference implementation, and real runtimes plug in behind the same seam.

mod archive;
mod state;

pub use archive::{ArchiveWriter, StateEngine};
pub use state::StateGraph;

use crate::error::{Error, Result};
use crate::model::LoadOptions;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// File extension of serialized model archives.
pub const MODEL_EXT: &str = "pt";

/// Placement of a graph and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    Cpu,
    Cuda(usize),
}

impl Default for Device {
    fn default() -> Self {
        Device::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            other => match other.strip_prefix("cuda:") {
                Some(ordinal) => ordinal
                    .parse()
                    .map(Device::Cuda)
                    .map_err(|_| format!("Invalid device ordinal: {s}")),
                None => Err(format!("Unknown device: {s}. Valid devices: cpu, cuda:N")),
            },
        }
    }
}

/// Semantic role of a parameter.
///
/// Running statistics are updated by forward-pass bookkeeping rather than
/// gradient descent and are excluded from unfreeze requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterKind {
    Weight,
    Bias,
    Gamma,
    Beta,
    RunningMean,
    RunningVar,
    Other,
}

impl ParameterKind {
    /// Derive the kind from the trailing component of a dotted parameter name
    /// (`encoder.norm.running_mean` -> `RunningMean`).
    pub fn from_name(name: &str) -> Self {
        let leaf = name.rsplit('.').next().unwrap_or(name);
        match leaf {
            "weight" => ParameterKind::Weight,
            "bias" => ParameterKind::Bias,
            "gamma" => ParameterKind::Gamma,
            "beta" => ParameterKind::Beta,
            "running_mean" => ParameterKind::RunningMean,
            "running_var" => ParameterKind::RunningVar,
            _ => ParameterKind::Other,
        }
    }

    /// Whether this parameter receives gradient-based updates when trainable.
    pub fn is_running_statistic(&self) -> bool {
        matches!(self, ParameterKind::RunningMean | ParameterKind::RunningVar)
    }
}

/// A named parameter array with its freeze state.
///
/// A parameter is frozen when `requires_grad` is false.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    kind: ParameterKind,
    data: Array1<f32>,
    requires_grad: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, data: Array1<f32>, requires_grad: bool) -> Self {
        let name = name.into();
        let kind = ParameterKind::from_name(&name);
        Self {
            name,
            kind,
            data,
            requires_grad,
        }
    }

    pub fn from_vec(name: impl Into<String>, data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(name, Array1::from_vec(data), requires_grad)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array1<f32> {
        &mut self.data
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    pub fn set_requires_grad(&mut self, requires_grad: bool) {
        self.requires_grad = requires_grad;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The opaque computation graph attached to a model handle.
pub trait Graph {
    /// Device the graph parameters live on.
    fn device(&self) -> Device;

    fn parameters(&self) -> &[Parameter];

    fn parameters_mut(&mut self) -> &mut [Parameter];

    /// Refresh parameter values in place from a serialized archive, keeping
    /// graph structure and freeze state untouched.
    fn read_parameters(&mut self, reader: &mut dyn Read) -> Result<()>;

    /// Freeze or unfreeze every parameter.
    fn freeze_parameters(&mut self, freeze: bool) {
        for param in self.parameters_mut() {
            param.set_requires_grad(!freeze);
        }
    }

    /// Freeze or unfreeze the parameters selected by `predicate`.
    fn freeze_parameters_where(&mut self, freeze: bool, predicate: &dyn Fn(&Parameter) -> bool) {
        for param in self.parameters_mut() {
            if predicate(param) {
                param.set_requires_grad(!freeze);
            }
        }
    }
}

/// A graph fresh out of deserialization, with any extra in-archive files the
/// load options asked for.
pub struct LoadedGraph {
    pub graph: Box<dyn Graph>,
    pub extra_files: HashMap<String, String>,
}

/// Deserialization entry points a runtime must provide.
pub trait Engine {
    fn name(&self) -> &'static str;

    /// Deserialize a model archive from a file.
    fn deserialize_file(
        &self,
        file: &Path,
        device: Device,
        options: &LoadOptions,
    ) -> Result<LoadedGraph>;

    /// Deserialize a model archive from a stream. `map_location` forces the
    /// graph onto `device` instead of the placement recorded in the archive.
    fn deserialize_stream(
        &self,
        reader: &mut dyn Read,
        device: Device,
        map_location: bool,
    ) -> Result<Box<dyn Graph>>;
}

pub(crate) fn malformed(msg: impl fmt::Display) -> Error {
    Error::MalformedModel(msg.to_string())
}
