//! In-memory graph backing the reference engine

use super::archive;
use super::{Device, Graph, Parameter};
use crate::error::Result;
use std::io::Read;

/// Parameter graph held entirely in memory.
///
/// Structure is fixed at deserialization time; [`Graph::read_parameters`]
/// only refreshes values of parameters that already exist.
pub struct StateGraph {
    device: Device,
    parameters: Vec<Parameter>,
}

impl StateGraph {
    pub fn new(device: Device, parameters: Vec<Parameter>) -> Self {
        Self { device, parameters }
    }
}

impl Graph for StateGraph {
    fn device(&self) -> Device {
        self.device
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.parameters
    }

    fn read_parameters(&mut self, reader: &mut dyn Read) -> Result<()> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let raw = archive::decode(&data)?;

        for param in &mut self.parameters {
            let values = raw.tensor(param.name()).ok_or_else(|| {
                super::malformed(format!("parameter {} missing from archive", param.name()))
            })?;
            if values.len() != param.len() {
                return Err(super::malformed(format!(
                    "parameter {} has {} values, expected {}",
                    param.name(),
                    values.len(),
                    param.len()
                )));
            }
            param
                .data_mut()
                .iter_mut()
                .zip(values)
                .for_each(|(slot, value)| *slot = *value);
        }
        Ok(())
    }
}
