use super::{fuse_code_at, input_at, map_with_fuse_code, output_at, tensor_type};
use crate::backend::{Attrs, NetworkBuilder};
use crate::converter::Converter;
use crate::error::{ConvertError, ConvertResult};
use crate::hal::{Model, Operation, OperationType};

fn binary_op_name(kind: &OperationType) -> ConvertResult<&'static str> {
    match kind {
        OperationType::Add => Ok("add"),
        OperationType::Sub => Ok("subtract"),
        OperationType::Mul => Ok("multiply"),
        OperationType::Div => Ok("divide"),
        OperationType::Max => Ok("maximum"),
        OperationType::Min => Ok("minimum"),
        OperationType::Pow => Ok("power"),
        other => Err(ConvertError::UnsupportedOperation(other.clone())),
    }
}

/// Inputs: `[lhs, rhs, fuse_code?]`, one output. Broadcasting is left to the backend.
pub(super) fn lower_binary<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    operation: &Operation,
) -> ConvertResult<()> {
    let op_name = binary_op_name(&operation.kind)?;
    let lhs = input_at(operation, 0)?;
    let rhs = input_at(operation, 1)?;
    let fuse_code = fuse_code_at(model, operation, 2)?;
    let output = output_at(operation, 0)?;

    let lhs_expr = converter.convert_operand(model, lhs, None, None)?;
    let rhs_expr = converter.convert_operand(model, rhs, None, None)?;
    let out_ty = tensor_type(converter, model, output)?;
    let expr = converter
        .builder()
        .call(op_name, &[lhs_expr, rhs_expr], Attrs::new(), &out_ty)?;
    map_with_fuse_code(converter, output, expr, fuse_code, &out_ty)
}
