use super::{clip_attrs, input_at, int32_scalar, output_at, tensor_type};
use crate::backend::{AttrValue, Attrs, NetworkBuilder};
use crate::converter::Converter;
use crate::error::{ConvertError, ConvertResult};
use crate::hal::{Model, Operation, OperationType};
use crate::utility::axis_index;

pub(super) fn lower_unary<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    operation: &Operation,
) -> ConvertResult<()> {
    let (op_name, attrs) = match &operation.kind {
        OperationType::Relu => ("nn.relu", Attrs::new()),
        OperationType::Relu6 => ("clip", clip_attrs(0.0, 6.0)),
        OperationType::Sigmoid => ("sigmoid", Attrs::new()),
        OperationType::Tanh => ("tanh", Attrs::new()),
        OperationType::Abs => ("abs", Attrs::new()),
        OperationType::Exp => ("exp", Attrs::new()),
        OperationType::Log => ("log", Attrs::new()),
        OperationType::Sqrt => ("sqrt", Attrs::new()),
        other => return Err(ConvertError::UnsupportedOperation(other.clone())),
    };
    let input = input_at(operation, 0)?;
    let output = output_at(operation, 0)?;

    let input_expr = converter.convert_operand(model, input, None, None)?;
    let out_ty = tensor_type(converter, model, output)?;
    let expr = converter
        .builder()
        .call(op_name, &[input_expr], attrs, &out_ty)?;
    converter.update_expr_map(output, expr);
    Ok(())
}

/// Inputs: `[x, axis]`.
pub(super) fn lower_softmax<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    operation: &Operation,
) -> ConvertResult<()> {
    let input = input_at(operation, 0)?;
    let axis_id = input_at(operation, 1)?;
    let output = output_at(operation, 0)?;
    let rank = super::operand(model, input)?.shape().rank();
    let axis = axis_index(int32_scalar(model, axis_id)?, rank)?;

    let input_expr = converter.convert_operand(model, input, None, None)?;
    let out_ty = tensor_type(converter, model, output)?;
    let mut attrs = Attrs::new();
    attrs.insert("axis".to_string(), AttrValue::Int(axis as i64));
    let expr = converter
        .builder()
        .call("nn.softmax", &[input_expr], attrs, &out_ty)?;
    converter.update_expr_map(output, expr);
    Ok(())
}
