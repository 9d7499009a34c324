use std::collections::HashSet;

use anyhow::Result;
use nnlower::hal::{Model, ModelBuilder, OperandId, PrecisionCode, Shape};
use nnlower::{Converter, ExprMap, ParamTable};
use nnlower_backend_ref::{ExprId, RecordingBuilder};

fn constant_and_input() -> (Model, OperandId, OperandId) {
    let mut builder = ModelBuilder::new();
    let c = builder.add_float32_constant(&[1.0, 2.0, 3.0, 4.0], Shape::from_static(&[2, 2]));
    let x = builder.add_input(PrecisionCode::Float32, Shape::from_static(&[2, 2]));
    (builder.finish(vec![x], Vec::new()), c, x)
}

#[test]
fn unique_names_never_repeat() {
    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);

    let mut seen = HashSet::new();
    for idx in 0..64 {
        let suffix = if idx % 2 == 0 { "t" } else { "" };
        assert!(seen.insert(converter.get_unique_name(suffix)));
    }
    assert_eq!(converter.get_unique_name("w_"), "w_64");
}

#[test]
fn name_counters_are_per_converter() {
    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    {
        let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);
        assert_eq!(converter.get_unique_name("x"), "x0");
    }
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);
    assert_eq!(converter.get_unique_name("x"), "x0");
}

#[test]
fn update_expr_map_appends_and_returns_the_expression() {
    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);
    let id = OperandId(7);

    assert_eq!(converter.get_mapped_expr(id), None);
    assert_eq!(converter.get_mapped_exprs(id), None);
    assert_eq!(converter.update_expr_map(id, ExprId(3)), ExprId(3));
    assert_eq!(converter.update_expr_map(id, ExprId(5)), ExprId(5));
    assert_eq!(converter.get_mapped_expr(id), Some(ExprId(5)));
    assert_eq!(
        converter.get_mapped_exprs(id),
        Some(&[ExprId(3), ExprId(5)][..])
    );
}

#[test]
fn converting_an_operand_twice_reuses_the_cached_expression() -> Result<()> {
    let (model, c, x) = constant_and_input();
    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);

    let first_c = converter.convert_operand(&model, c, None, None)?;
    let first_x = converter.convert_operand(&model, x, None, None)?;
    let nodes = converter.builder().nodes().len();
    let param_count = converter.params().len();

    let second_c = converter.convert_operand(&model, c, None, None)?;
    let second_x = converter.convert_operand(&model, x, None, Some("ignored"))?;
    assert_eq!(first_c, second_c);
    assert_eq!(first_x, second_x);
    assert_eq!(converter.builder().nodes().len(), nodes);
    assert_eq!(converter.params().len(), param_count);
    assert_eq!(converter.get_mapped_exprs(c), Some(&[first_c][..]));
    assert_eq!(converter.get_mapped_exprs(x), Some(&[first_x][..]));
    Ok(())
}

#[test]
fn expressions_stay_visible_to_the_caller() -> Result<()> {
    let (model, c, x) = constant_and_input();
    let mut builder = RecordingBuilder::new();
    let mut params = ParamTable::new();
    let mut exprs = ExprMap::new();
    let expr = {
        let mut converter = Converter::new(&mut builder, &mut params, &mut exprs);
        converter.convert_operand(&model, c, None, None)?
    };
    assert_eq!(exprs.latest(c), Some(&expr));
    assert!(!exprs.contains(x));
    Ok(())
}
