//! Safetensors-backed model archives and the reference engine
//!
//! Archives carry f32 parameter tensors plus a string metadata table with the
//! model name, the recorded device, and extra files stored under `extra.*`
//! keys.

use super::state::StateGraph;
use super::{malformed, Device, Engine, Graph, LoadedGraph, Parameter};
use crate::error::{Error, Result};
use crate::model::LoadOptions;
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

const META_NAME: &str = "name";
const META_DEVICE: &str = "device";
const META_EXTRA_PREFIX: &str = "extra.";

/// Decoded archive contents, before any device placement policy is applied.
pub(crate) struct RawArchive {
    pub device: Option<Device>,
    pub extras: HashMap<String, String>,
    pub tensors: Vec<(String, Vec<f32>)>,
}

impl RawArchive {
    pub fn tensor(&self, name: &str) -> Option<&[f32]> {
        self.tensors
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }
}

pub(crate) fn decode(data: &[u8]) -> Result<RawArchive> {
    let tensors = SafeTensors::deserialize(data)
        .map_err(|e| malformed(format!("archive parsing failed: {e}")))?;

    let (_, header) = SafeTensors::read_metadata(data)
        .map_err(|e| malformed(format!("archive header parsing failed: {e}")))?;
    let metadata = header.metadata();

    let device = metadata
        .as_ref()
        .and_then(|m| m.get(META_DEVICE))
        .map(|s| s.parse::<Device>().map_err(malformed))
        .transpose()?;

    let extras = metadata
        .as_ref()
        .map(|m| {
            m.iter()
                .filter_map(|(key, value)| {
                    key.strip_prefix(META_EXTRA_PREFIX)
                        .map(|k| (k.to_string(), value.clone()))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut names = tensors.names();
    names.sort_unstable();
    let mut decoded = Vec::with_capacity(names.len());
    for name in names {
        let view = tensors
            .tensor(name)
            .map_err(|e| malformed(format!("tensor {name}: {e}")))?;
        if view.dtype() != Dtype::F32 {
            return Err(malformed(format!(
                "tensor {name} has dtype {:?}, only F32 archives are supported",
                view.dtype()
            )));
        }
        let values: Vec<f32> = view
            .data()
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        decoded.push((name.to_string(), values));
    }

    Ok(RawArchive {
        device,
        extras,
        tensors: decoded,
    })
}

fn graph_from(raw: &RawArchive, device: Device, map_location: bool) -> StateGraph {
    // mapLocation forces the requested device; otherwise the archive's
    // recorded placement wins.
    let placed = if map_location {
        device
    } else {
        raw.device.unwrap_or_default()
    };
    let parameters = raw
        .tensors
        .iter()
        .map(|(name, values)| Parameter::from_vec(name.clone(), values.clone(), true))
        .collect();
    StateGraph::new(placed, parameters)
}

/// Reference [`Engine`] reading safetensors model archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateEngine;

impl StateEngine {
    pub fn new() -> Self {
        StateEngine
    }
}

impl Engine for StateEngine {
    fn name(&self) -> &'static str {
        "state"
    }

    fn deserialize_file(
        &self,
        file: &Path,
        device: Device,
        options: &LoadOptions,
    ) -> Result<LoadedGraph> {
        let data = fs::read(file)?;
        let raw = decode(&data)?;

        let mut extra_files = HashMap::new();
        for key in options.extra_files() {
            if let Some(value) = raw.extras.get(key) {
                extra_files.insert(key.clone(), value.clone());
            }
        }

        let graph = graph_from(&raw, device, options.map_location());
        Ok(LoadedGraph {
            graph: Box::new(graph),
            extra_files,
        })
    }

    fn deserialize_stream(
        &self,
        reader: &mut dyn Read,
        device: Device,
        map_location: bool,
    ) -> Result<Box<dyn Graph>> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let raw = decode(&data)?;
        Ok(Box::new(graph_from(&raw, device, map_location)))
    }
}

/// Builder for model archives, used by tooling and tests.
///
/// # Example
///
/// ```no_run
/// use cargar::engine::ArchiveWriter;
///
/// ArchiveWriter::new("linear")
///     .with_parameter("fc.weight", vec![1.0, 2.0])
///     .with_parameter("fc.bias", vec![0.1])
///     .write_to("model.pt")
///     .unwrap();
/// ```
pub struct ArchiveWriter {
    name: String,
    device: Device,
    parameters: Vec<(String, Vec<f32>)>,
    extra_files: Vec<(String, String)>,
}

impl ArchiveWriter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: Device::Cpu,
            parameters: Vec::new(),
            extra_files: Vec::new(),
        }
    }

    /// Record the device placement in the archive.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, data: Vec<f32>) -> Self {
        self.parameters.push((name.into(), data));
        self
    }

    /// Embed an auxiliary text file in the archive.
    pub fn with_extra_file(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_files.push((key.into(), value.into()));
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let tensor_data: Vec<(String, Vec<u8>, Vec<usize>)> = self
            .parameters
            .iter()
            .map(|(name, values)| {
                let bytes: Vec<u8> = bytemuck::cast_slice(values.as_slice()).to_vec();
                (name.clone(), bytes, vec![values.len()])
            })
            .collect();

        let mut views: Vec<(&str, TensorView<'_>)> = Vec::with_capacity(tensor_data.len());
        for (name, bytes, shape) in &tensor_data {
            let view = TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map_err(|e| Error::Serialization(format!("tensor {name}: {e}")))?;
            views.push((name.as_str(), view));
        }

        let mut metadata = HashMap::new();
        metadata.insert(META_NAME.to_string(), self.name.clone());
        metadata.insert(META_DEVICE.to_string(), self.device.to_string());
        for (key, value) in &self.extra_files {
            metadata.insert(format!("{META_EXTRA_PREFIX}{key}"), value.clone());
        }

        safetensors::serialize(views, &Some(metadata))
            .map_err(|e| Error::Serialization(format!("archive serialization failed: {e}")))
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes)?;
        Ok(())
    }
}
