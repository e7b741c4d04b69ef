//! Trainer construction
//!
//! A [`Trainer`] is built from a loaded [`Model`](crate::model::Model) via
//! [`Model::new_trainer`](crate::model::Model::new_trainer), which applies the
//! unfreeze policy and any configured initializers before handing the handle
//! over.

use crate::engine::{Device, Parameter};
use crate::model::Model;
use rand::Rng;

/// Initializes parameter values before training.
pub trait Initializer {
    fn initialize(&self, param: &mut Parameter);
}

/// Fills parameters with a constant value.
pub struct ConstantInit(pub f32);

impl Initializer for ConstantInit {
    fn initialize(&self, param: &mut Parameter) {
        param.data_mut().fill(self.0);
    }
}

/// Fills parameters with values drawn uniformly from `[low, high)`.
pub struct UniformInit {
    pub low: f32,
    pub high: f32,
}

impl UniformInit {
    pub fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }
}

impl Initializer for UniformInit {
    fn initialize(&self, param: &mut Parameter) {
        let mut rng = rand::thread_rng();
        for value in param.data_mut().iter_mut() {
            *value = rng.gen_range(self.low..self.high);
        }
    }
}

type ParamPredicate = Box<dyn Fn(&Parameter) -> bool>;

/// Configuration consumed when constructing a trainer.
///
/// Initializer/predicate pairs are applied in insertion order, after the
/// freeze-policy pass.
#[derive(Default)]
pub struct TrainerConfig {
    initializers: Vec<(Box<dyn Initializer>, ParamPredicate)>,
}

impl TrainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initializer<I, P>(mut self, initializer: I, predicate: P) -> Self
    where
        I: Initializer + 'static,
        P: Fn(&Parameter) -> bool + 'static,
    {
        self.initializers
            .push((Box::new(initializer), Box::new(predicate)));
        self
    }

    pub(crate) fn initializers(&self) -> &[(Box<dyn Initializer>, ParamPredicate)] {
        &self.initializers
    }
}

/// Handle for training a loaded model.
pub struct Trainer<'m> {
    model: &'m mut Model,
}

impl<'m> Trainer<'m> {
    pub(crate) fn new(model: &'m mut Model) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Model {
        self.model
    }

    pub fn device(&self) -> Device {
        self.model.device()
    }

    /// All parameters of the attached graph.
    pub fn parameters(&self) -> &[Parameter] {
        self.model
            .graph()
            .map(|g| g.parameters())
            .unwrap_or_default()
    }

    /// Parameters participating in gradient updates.
    pub fn trainable_parameters(&self) -> Vec<&Parameter> {
        self.parameters()
            .iter()
            .filter(|p| p.requires_grad())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_init() {
        let mut param = Parameter::from_vec("fc.weight", vec![1.0, 2.0, 3.0], true);
        ConstantInit(0.5).initialize(&mut param);
        assert_eq!(param.data().as_slice().unwrap(), &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_uniform_init_range() {
        let mut param = Parameter::from_vec("fc.weight", vec![0.0; 64], true);
        UniformInit::new(-0.1, 0.1).initialize(&mut param);
        assert!(param.data().iter().all(|v| (-0.1..0.1).contains(v)));
        // 64 draws all landing on zero would mean the init never ran.
        assert!(param.data().iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_trainer_config_preserves_order() {
        let config = TrainerConfig::new()
            .with_initializer(ConstantInit(1.0), |p: &Parameter| p.name() == "a")
            .with_initializer(ConstantInit(2.0), |p: &Parameter| p.name() == "b");
        assert_eq!(config.initializers().len(), 2);
    }
}
