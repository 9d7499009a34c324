use std::env;

use anyhow::Result;
use nnlower::config::{ENV_ALLOW_DYNAMIC_DIMS, ENV_CONSTANT_PREFIX, ENV_INPUT_PREFIX};
use nnlower::hal::{Dimension, ModelBuilder, OperationType, PrecisionCode, Shape};
use nnlower::{build_network_from_env, ConverterConfig, ParamTable, Status};
use nnlower_backend_ref::RecordingBuilder;

// Single test in this binary: it owns the NNLOWER_* variables for the whole process.
#[test]
fn environment_overrides_reach_the_build() -> Result<()> {
    env::set_var(ENV_INPUT_PREFIX, "feed_");
    env::set_var(ENV_CONSTANT_PREFIX, "w_");
    env::set_var(ENV_ALLOW_DYNAMIC_DIMS, "false");

    let config = ConverterConfig::from_env();
    assert_eq!(config.input_prefix, "feed_");
    assert_eq!(config.constant_prefix, "w_");
    assert!(!config.allow_dynamic_dims);

    let mut model = ModelBuilder::new();
    let x = model.add_input(PrecisionCode::Float32, Shape::from_static(&[2]));
    let c = model.add_float32_constant(&[1.0, 2.0], Shape::from_static(&[2]));
    let y = model.add_temporary(PrecisionCode::Float32, Shape::from_static(&[2]));
    model.add_operation(OperationType::Add, vec![x, c], vec![y]);
    let model = model.finish(vec![x], vec![y]);

    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    build_network_from_env(&model, &mut builder, &mut params)?;
    assert_eq!(builder.into_network()?.input_names(), ["feed_0"]);
    assert!(params.contains("w_1"));

    let mut model = ModelBuilder::new();
    let x = model.add_input(
        PrecisionCode::Float32,
        Shape::new(vec![Dimension::Dynamic, Dimension::Static(2)]),
    );
    let y = model.add_temporary(
        PrecisionCode::Float32,
        Shape::new(vec![Dimension::Dynamic, Dimension::Static(2)]),
    );
    model.add_operation(OperationType::Exp, vec![x], vec![y]);
    let model = model.finish(vec![x], vec![y]);

    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let err = build_network_from_env(&model, &mut builder, &mut params)
        .expect_err("dynamic dims are disabled through the environment");
    assert_eq!(err.status(), Status::InvalidParameter);

    env::remove_var(ENV_INPUT_PREFIX);
    env::remove_var(ENV_CONSTANT_PREFIX);
    env::remove_var(ENV_ALLOW_DYNAMIC_DIMS);
    Ok(())
}
