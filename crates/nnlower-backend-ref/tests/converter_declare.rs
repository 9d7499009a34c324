use anyhow::Result;
use nnlower::backend::{BackendError, Dim, ElemType, TensorType};
use nnlower::hal::{Dimension, ModelBuilder, OperationType, PrecisionCode, Shape};
use nnlower::{Converter, ConvertError, ConverterConfig, ExprMap, ParamTable, Status};
use nnlower_backend_ref::{NodeKind, NodeType, RecordingBuilder};

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[test]
fn constants_and_inputs_take_separate_paths() -> Result<()> {
    let mut model = ModelBuilder::new();
    let c = model.add_float32_constant(&[0.5; 6], Shape::from_static(&[2, 3]));
    let x = model.add_input(PrecisionCode::Float32, Shape::from_static(&[2, 3]));
    let model = model.finish(vec![x], Vec::new());

    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);
    let x_expr = converter.convert_operand(&model, x, None, Some("tokens"))?;
    let c_expr = converter.convert_operand(&model, c, None, None)?;

    assert_eq!(builder.inputs(), vec![(x_expr, "tokens")]);
    assert_eq!(builder.constants(), vec![(c_expr, "const_0")]);
    let array = params.get("const_0").expect("constant stored");
    assert_eq!(
        array.ty,
        TensorType::new(ElemType::Float32, vec![Dim::Fixed(2), Dim::Fixed(3)])
    );
    assert_eq!(&array.bytes[..], &f32_bytes(&[0.5; 6])[..]);
    Ok(())
}

#[test]
fn dimension_override_reshapes_the_declaration_only() -> Result<()> {
    let mut model = ModelBuilder::new();
    let c = model.add_float32_constant(&[1.0, 2.0, 3.0, 4.0], Shape::from_static(&[2, 2]));
    let model = model.finish(Vec::new(), Vec::new());

    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);
    let expr = converter.convert_operand(&model, c, Some(&[Dimension::Static(4)]), Some("flat"))?;

    let node = builder.node(expr).expect("recorded constant");
    assert_eq!(
        node.ty,
        NodeType::Tensor(TensorType::new(ElemType::Float32, vec![Dim::Fixed(4)]))
    );
    assert_eq!(params.get("flat").map(|a| a.ty.dims.clone()), Some(vec![Dim::Fixed(4)]));
    assert_eq!(model.operand(c).map(|o| o.shape().rank()), Some(2));
    Ok(())
}

#[test]
fn mismatched_element_count_is_rejected() {
    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);

    let err = converter
        .add_constant_tensor(
            &f32_bytes(&[1.0, 2.0, 3.0]),
            PrecisionCode::Float32,
            Some(&[Dimension::Static(2), Dimension::Static(2)]),
            None,
        )
        .expect_err("three values cannot fill a 2x2 tensor");
    assert!(matches!(err, ConvertError::InvalidShape(_)));
    assert_eq!(err.status(), Status::InvalidParameter);
    assert!(params.is_empty());
    assert!(builder.nodes().is_empty());
}

#[test]
fn typed_constants_infer_vectors_and_scalars() -> Result<()> {
    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);

    converter.add_int32_constant_tensor(&[3, 1, 4, 1, 5], None, None)?;
    converter.add_float32_constant_tensor(&[0.25], Some(&[]), Some("scale"))?;

    let ints = params.get("const_0").expect("generated name");
    assert_eq!(
        ints.ty,
        TensorType::new(ElemType::Int32, vec![Dim::Fixed(5)])
    );
    assert_eq!(&ints.bytes[..4], &3i32.to_le_bytes());
    let scale = params.get("scale").expect("explicit name");
    assert_eq!(scale.ty, TensorType::new(ElemType::Float32, Vec::new()));
    assert_eq!(scale.bytes.len(), 4);
    Ok(())
}

#[test]
fn empty_name_falls_back_to_a_generated_one() -> Result<()> {
    let config = ConverterConfig {
        constant_prefix: "w_".to_string(),
        ..ConverterConfig::default()
    };
    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::with_config(&mut builder, &mut params, &mut exprs, config);
    converter.add_float32_constant_tensor(&[1.0, 2.0], None, Some(""))?;
    assert!(params.contains("w_0"));
    Ok(())
}

#[test]
fn duplicate_constant_name_is_a_collision() -> Result<()> {
    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);

    converter.add_float32_constant_tensor(&[1.0], None, Some("w"))?;
    let err = converter
        .add_float32_constant_tensor(&[2.0], None, Some("w"))
        .expect_err("second 'w' must collide");
    assert!(matches!(err, ConvertError::NameCollision(ref name) if name == "w"));

    assert_eq!(builder.constants().len(), 1);
    assert_eq!(params.len(), 1);
    let kept = params.get("w").expect("first constant kept");
    assert_eq!(&kept.bytes[..], &1.0f32.to_le_bytes());
    Ok(())
}

#[test]
fn generated_names_skip_explicitly_taken_ones() -> Result<()> {
    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);

    converter.add_float32_constant_tensor(&[1.0], None, Some("const_0"))?;
    converter.add_float32_constant_tensor(&[2.0], None, None)?;

    assert_eq!(params.len(), 2);
    let generated = params.get("const_1").expect("next free generated name");
    assert_eq!(&generated.bytes[..], &2.0f32.to_le_bytes());
    Ok(())
}

#[test]
fn apply_steps_around_a_caller_chosen_constant_name() -> Result<()> {
    let mut model = ModelBuilder::new();
    let x = model.add_input(PrecisionCode::Float32, Shape::from_static(&[2]));
    let c = model.add_float32_constant(&[3.0, 4.0], Shape::from_static(&[2]));
    let y = model.add_temporary(PrecisionCode::Float32, Shape::from_static(&[2]));
    model.add_operation(OperationType::Add, vec![x, c], vec![y]);
    let model = model.finish(vec![x], vec![y]);

    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);
    converter.add_float32_constant_tensor(&[9.0], None, Some("const_1"))?;
    converter.apply(&model)?;

    assert_eq!(params.len(), 2);
    assert_eq!(params.get("const_1").map(|a| a.bytes.len()), Some(4));
    assert_eq!(params.get("const_2").map(|a| a.bytes.len()), Some(8));
    assert_eq!(builder.calls().len(), 1);
    Ok(())
}

#[test]
fn precision_without_element_type_is_unsupported() {
    let mut model = ModelBuilder::new();
    let x = model.add_input(PrecisionCode::UInt32, Shape::from_static(&[4]));
    let model = model.finish(vec![x], Vec::new());

    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);
    let err = converter
        .convert_operand(&model, x, None, None)
        .expect_err("uint32 has no element type");
    assert!(matches!(
        err,
        ConvertError::UnsupportedPrecision(PrecisionCode::UInt32)
    ));
    assert_eq!(err.status().code(), 3);
    assert!(!exprs.contains(x));
}

#[test]
fn dynamic_input_dimensions_follow_the_config() -> Result<()> {
    let mut model = ModelBuilder::new();
    let x = model.add_input(
        PrecisionCode::Float32,
        Shape::new(vec![Dimension::Dynamic, Dimension::Static(8)]),
    );
    let model = model.finish(vec![x], Vec::new());

    let strict = ConverterConfig {
        allow_dynamic_dims: false,
        ..ConverterConfig::default()
    };
    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::with_config(&mut builder, &mut params, &mut exprs, strict);
    let err = converter
        .convert_operand(&model, x, None, None)
        .expect_err("dynamic dims are disabled");
    assert!(matches!(err, ConvertError::InvalidShape(_)));

    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);
    let expr = converter.convert_operand(&model, x, None, None)?;
    let node = builder.node(expr).expect("recorded input");
    assert_eq!(
        node.ty,
        NodeType::Tensor(TensorType::new(
            ElemType::Float32,
            vec![Dim::Any, Dim::Fixed(8)]
        ))
    );
    assert_eq!(
        node.kind,
        NodeKind::Input {
            name: "input_0".to_string()
        }
    );
    Ok(())
}

#[test]
fn backend_refusal_surfaces_as_backend_error() {
    let mut model = ModelBuilder::new();
    let x = model.add_input(PrecisionCode::Float64, Shape::from_static(&[2]));
    let model = model.finish(vec![x], Vec::new());

    let mut builder = RecordingBuilder::new().with_elem_types([ElemType::Float32]);
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);
    let result = converter.convert_operand(&model, x, None, None);

    let err = result.as_ref().expect_err("float64 is not enabled");
    assert!(matches!(
        err,
        ConvertError::Backend(BackendError::Unsupported { .. })
    ));
    assert_eq!(Status::of(&result), Status::FeatureNotSupported);
    assert!(exprs.is_empty());
}
