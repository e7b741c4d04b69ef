//! Model handle and load orchestration
//!
//! A [`Model`] owns at most one opaque [`Graph`]. Loading resolves the model
//! archive through a prioritized filename search, deserializes it through the
//! configured [`Engine`], and applies the load-time freeze policy; loading
//! again on a populated handle refreshes parameter values without touching
//! graph structure. The graph and any temp model directory are released when
//! the handle goes out of scope.

mod options;
mod resolver;

pub use options::LoadOptions;

use crate::engine::{Device, Engine, Graph, StateEngine, MODEL_EXT};
use crate::error::{Error, Result};
use crate::train::{Trainer, TrainerConfig};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Handle to a (possibly loaded) model.
pub struct Model {
    name: String,
    device: Device,
    model_dir: Option<PathBuf>,
    properties: HashMap<String, String>,
    graph: Option<Box<dyn Graph>>,
    engine: Box<dyn Engine>,
    was_loaded: bool,
    temp_dir: Option<TempDir>,
}

impl Model {
    /// Create a CPU model handle backed by the reference engine.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_engine(name, Device::Cpu, Box::new(StateEngine::new()))
    }

    /// Create a model handle on `device`, deserializing through `engine`.
    pub fn with_engine(name: impl Into<String>, device: Device, engine: Box<dyn Engine>) -> Self {
        Self {
            name: name.into(),
            device,
            model_dir: None,
            properties: HashMap::new(),
            graph: None,
            engine,
            was_loaded: false,
            temp_dir: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn model_dir(&self) -> Option<&Path> {
        self.model_dir.as_deref()
    }

    pub fn graph(&self) -> Option<&dyn Graph> {
        self.graph.as_deref()
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Load the model from a directory (or a direct archive path).
    ///
    /// Without an explicit `prefix`, candidate stems are tried in order: the
    /// model name, the directory name, then `model.pt`. A populated handle is
    /// not re-deserialized; its parameter values are refreshed in place.
    pub fn load(
        &mut self,
        model_path: impl AsRef<Path>,
        prefix: Option<&str>,
        options: &LoadOptions,
    ) -> Result<()> {
        let path = model_path.as_ref();
        self.was_loaded = true;

        let candidates: Vec<String> = match prefix {
            Some(p) => vec![p.to_string()],
            None => {
                let dir_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                vec![
                    self.name.clone(),
                    dir_name,
                    format!("model.{MODEL_EXT}"),
                ]
            }
        };
        let stem = prefix.unwrap_or(&self.name).to_string();

        let resolution = resolver::find_model_file(path, &candidates);
        let model_dir = resolution.model_dir;
        self.model_dir = Some(model_dir.clone());
        if let Some(name) = resolution.model_name {
            self.name = name;
        }

        if self.graph.is_none() {
            let file = resolution
                .file
                .ok_or_else(|| not_found(&stem, &model_dir))?;
            debug!(file = %file.display(), engine = self.engine.name(), "deserializing model archive");
            let loaded = self.engine.deserialize_file(&file, self.device, options)?;
            self.properties.extend(loaded.extra_files);
            let mut graph = loaded.graph;
            // Frozen by default after a structural load; train_param opts out.
            graph.freeze_parameters(!options.train_param());
            self.graph = Some(graph);
        } else {
            let file = resolution
                .file
                .ok_or_else(|| not_found(&stem, &model_dir))?;
            debug!(file = %file.display(), "refreshing parameters in place");
            let mut reader = BufReader::new(File::open(&file)?);
            if let Some(graph) = self.graph.as_mut() {
                graph.read_parameters(&mut reader)?;
            }
        }
        Ok(())
    }

    /// Load the model from a stream.
    ///
    /// The first load places the model directory in a temp location that
    /// lives as long as the handle. `map_location` forces the graph onto the
    /// handle's device.
    pub fn load_stream(&mut self, reader: &mut dyn Read, map_location: bool) -> Result<()> {
        self.was_loaded = true;
        if self.graph.is_none() {
            let temp = tempfile::Builder::new().prefix("pt-model").tempdir()?;
            self.model_dir = Some(temp.path().to_path_buf());
            self.temp_dir = Some(temp);
            let mut graph = self
                .engine
                .deserialize_stream(reader, self.device, map_location)?;
            graph.freeze_parameters(true);
            self.graph = Some(graph);
        } else if let Some(graph) = self.graph.as_mut() {
            graph.read_parameters(reader)?;
        }
        Ok(())
    }

    /// Stream load driven by the historical string-map options
    /// (`mapLocation` parses as case-insensitive `"true"`).
    pub fn load_stream_with_options(
        &mut self,
        reader: &mut dyn Read,
        options: &HashMap<String, String>,
    ) -> Result<()> {
        let map_location = options::parse_flag(options.get("mapLocation"));
        self.load_stream(reader, map_location)
    }

    /// Construct a trainer from the loaded handle.
    ///
    /// Unfreezes every parameter except running statistics, which are not
    /// gradient-updated and stay frozen regardless of the request, then
    /// applies the configured initializer pairs in order.
    pub fn new_trainer(&mut self, config: &TrainerConfig) -> Result<Trainer<'_>> {
        let graph = self.graph.as_mut().ok_or_else(|| {
            Error::InvalidState(
                "a graph must be attached to the model before creating a trainer".to_string(),
            )
        })?;
        if self.was_loaded {
            graph.freeze_parameters_where(false, &|p| !p.kind().is_running_statistic());
        }
        for (initializer, predicate) in config.initializers() {
            for param in graph.parameters_mut() {
                if predicate(param) {
                    initializer.initialize(param);
                }
            }
        }
        Ok(Trainer::new(self))
    }

    /// Every regular file under the model directory, as a path relative to
    /// it, excluding model archives.
    ///
    /// Panics when the model directory is unset or cannot be walked; artifact
    /// enumeration failure is not a recoverable condition.
    pub fn artifact_names(&self) -> Vec<String> {
        let model_dir = self
            .model_dir
            .as_deref()
            .expect("model directory not set; load a model first");
        let mut files = Vec::new();
        collect_files(model_dir, &mut files).expect("failed to list model directory");

        let extension = format!(".{MODEL_EXT}");
        let mut names: Vec<String> = files
            .iter()
            .filter(|path| {
                !path
                    .file_name()
                    .map(|n| n.to_string_lossy().ends_with(&extension))
                    .unwrap_or(false)
            })
            .filter_map(|path| path.strip_prefix(model_dir).ok())
            .map(|relative| relative.to_string_lossy().into_owned())
            .collect();
        names.sort_unstable();
        names
    }

    /// Resolve a named artifact to its path under the model directory.
    pub fn artifact(&self, name: &str) -> Result<PathBuf> {
        let model_dir = self
            .model_dir
            .as_deref()
            .ok_or_else(|| Error::InvalidState("model directory not set".to_string()))?;
        let path = model_dir.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::NotFound {
                file: name.to_string(),
                dir: model_dir.to_path_buf(),
            })
        }
    }
}

fn not_found(stem: &str, dir: &Path) -> Error {
    let extension = format!(".{MODEL_EXT}");
    let file = if stem.ends_with(&extension) {
        stem.to_string()
    } else {
        format!("{stem}{extension}")
    };
    Error::NotFound {
        file,
        dir: dir.to_path_buf(),
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), out)?;
        } else if file_type.is_file() {
            out.push(entry.path());
        }
    }
    Ok(())
}
