//! Integration tests for the model loading lifecycle

use cargar::engine::{ArchiveWriter, Device, ParameterKind};
use cargar::train::{ConstantInit, TrainerConfig};
use cargar::{parse_args, Graph, LoadOptions, Model};
use std::collections::HashMap;
use std::fs;

fn write_model(dir: &std::path::Path, file: &str, fill: f32) {
    ArchiveWriter::new("resnet")
        .with_parameter("conv.weight", vec![fill; 8])
        .with_parameter("norm.weight", vec![1.0; 4])
        .with_parameter("norm.running_mean", vec![0.0; 4])
        .with_parameter("norm.running_var", vec![1.0; 4])
        .with_extra_file("config.json", "{\"arch\": \"resnet18\"}")
        .write_to(dir.join(file))
        .unwrap();
}

#[test]
fn test_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), "resnet.pt", 0.1);
    fs::write(dir.path().join("synset.txt"), "cat\ndog\n").unwrap();

    // Load: resolved by model name, extras extracted, frozen by default.
    let mut model = Model::new("resnet");
    let options = LoadOptions::new().with_extra_files(["config.json"]);
    model.load(dir.path(), None, &options).unwrap();

    assert_eq!(model.name(), "resnet");
    assert_eq!(
        model.property("config.json").unwrap(),
        "{\"arch\": \"resnet18\"}"
    );
    let graph = model.graph().unwrap();
    assert!(graph.parameters().iter().all(|p| !p.requires_grad()));

    // Trainer: everything unfrozen except running statistics.
    let trainer = model.new_trainer(&TrainerConfig::new()).unwrap();
    assert_eq!(trainer.parameters().len(), 4);
    let trainable: Vec<&str> = trainer
        .trainable_parameters()
        .iter()
        .map(|p| p.name())
        .collect();
    assert_eq!(trainable, ["conv.weight", "norm.weight"]);

    // Artifacts: relative paths, archives excluded.
    assert_eq!(model.artifact_names(), vec!["synset.txt"]);
    assert!(model.artifact("synset.txt").unwrap().is_file());
}

#[test]
fn test_direct_file_load_and_refresh() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), "checkpoint.pt", 1.0);

    let mut model = Model::new("anything");
    model
        .load(
            dir.path().join("checkpoint.pt"),
            None,
            &LoadOptions::default(),
        )
        .unwrap();
    assert_eq!(model.name(), "checkpoint");
    assert_eq!(model.model_dir().unwrap(), dir.path());

    // Second load refreshes weights without re-deserializing structure.
    write_model(dir.path(), "checkpoint.pt", 2.0);
    model
        .load(
            dir.path().join("checkpoint.pt"),
            None,
            &LoadOptions::default(),
        )
        .unwrap();

    let graph = model.graph().unwrap();
    let conv = graph
        .parameters()
        .iter()
        .find(|p| p.name() == "conv.weight")
        .unwrap();
    assert!(conv.data().iter().all(|v| (*v - 2.0).abs() < f32::EPSILON));
    assert_eq!(graph.parameters().len(), 4);
}

#[test]
fn test_stream_load_with_compat_options() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), "resnet.pt", 0.5);
    let bytes = fs::read(dir.path().join("resnet.pt")).unwrap();

    let mut options = HashMap::new();
    options.insert("mapLocation".to_string(), "true".to_string());

    let mut model = Model::new("streamed");
    model
        .load_stream_with_options(&mut bytes.as_slice(), &options)
        .unwrap();

    assert_eq!(model.graph().unwrap().device(), Device::Cpu);
    assert!(model.model_dir().unwrap().exists());
    assert!(model
        .graph()
        .unwrap()
        .parameters()
        .iter()
        .all(|p| !p.requires_grad()));
}

#[test]
fn test_trainer_initializers_run_after_unfreeze() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), "model.pt", 0.1);

    let mut model = Model::new("model");
    model
        .load(dir.path(), None, &LoadOptions::default())
        .unwrap();

    let config = TrainerConfig::new()
        .with_initializer(ConstantInit(0.0), |p| p.kind() == ParameterKind::Weight);
    let trainer = model.new_trainer(&config).unwrap();

    for param in trainer.parameters() {
        if param.kind() == ParameterKind::Weight {
            assert!(param.data().iter().all(|v| *v == 0.0));
        }
    }
}

#[test]
fn test_cli_config_drives_load() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), "model.pt", 0.1);

    let dir_arg = dir.path().to_string_lossy().into_owned();
    let config = parse_args(["cargar", "--model-dir", &dir_arg, "--max-gpus", "2"]).unwrap();

    assert_eq!(config.batch_size, 64);
    assert_eq!(config.devices(), vec![Device::Cuda(0), Device::Cuda(1)]);

    let mut model = Model::new("model");
    model
        .load(
            config.model_dir.as_ref().unwrap(),
            None,
            &LoadOptions::new().with_train_param(!config.pre_trained),
        )
        .unwrap();
    assert!(model.graph().is_some());
}
