//! Per-operation lowering rules.
//!
//! Operations carry their attributes as trailing constant operands (fuse code, axis, shape
//! and so on). Rules read those directly from the model and only declare the tensor
//! operands through [`Converter::convert_operand`].

mod activation;
mod elementwise;
mod linear;
mod shape;

use crate::backend::{AttrValue, Attrs, NetworkBuilder, TensorType};
use crate::converter::Converter;
use crate::error::{ConvertError, ConvertResult};
use crate::hal::{Model, Operand, OperandId, Operation, OperationType};
use crate::utility::tensor_type_of;

static SUPPORTED_OPERATIONS: [OperationType; 24] = [
    OperationType::Add,
    OperationType::Sub,
    OperationType::Mul,
    OperationType::Div,
    OperationType::Max,
    OperationType::Min,
    OperationType::Pow,
    OperationType::Relu,
    OperationType::Relu6,
    OperationType::Sigmoid,
    OperationType::Tanh,
    OperationType::Abs,
    OperationType::Exp,
    OperationType::Log,
    OperationType::Sqrt,
    OperationType::Softmax,
    OperationType::Reshape,
    OperationType::Transpose,
    OperationType::Concat,
    OperationType::Flatten,
    OperationType::Split,
    OperationType::FullyConnected,
    OperationType::MatMul,
    OperationType::Conv2D,
];

/// Operation kinds that have a lowering rule.
pub fn supported_operations() -> &'static [OperationType] {
    &SUPPORTED_OPERATIONS
}

pub(crate) fn lower_operation<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    operation: &Operation,
) -> ConvertResult<()> {
    match &operation.kind {
        OperationType::Add
        | OperationType::Sub
        | OperationType::Mul
        | OperationType::Div
        | OperationType::Max
        | OperationType::Min
        | OperationType::Pow => elementwise::lower_binary(converter, model, operation),
        OperationType::Relu
        | OperationType::Relu6
        | OperationType::Sigmoid
        | OperationType::Tanh
        | OperationType::Abs
        | OperationType::Exp
        | OperationType::Log
        | OperationType::Sqrt => activation::lower_unary(converter, model, operation),
        OperationType::Softmax => activation::lower_softmax(converter, model, operation),
        OperationType::Reshape => shape::lower_reshape(converter, model, operation),
        OperationType::Transpose => shape::lower_transpose(converter, model, operation),
        OperationType::Concat => shape::lower_concat(converter, model, operation),
        OperationType::Flatten => shape::lower_flatten(converter, model, operation),
        OperationType::Split => shape::lower_split(converter, model, operation),
        OperationType::FullyConnected => linear::lower_fully_connected(converter, model, operation),
        OperationType::MatMul => linear::lower_mat_mul(converter, model, operation),
        OperationType::Conv2D => linear::lower_conv2d(converter, model, operation),
        other => Err(ConvertError::UnsupportedOperation(other.clone())),
    }
}

/// Activation fused into the tail of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FuseCode {
    None,
    Relu,
    Relu1,
    Relu6,
}

impl FuseCode {
    fn from_i32(id: OperandId, value: i32) -> ConvertResult<Self> {
        match value {
            0 => Ok(FuseCode::None),
            1 => Ok(FuseCode::Relu),
            2 => Ok(FuseCode::Relu1),
            3 => Ok(FuseCode::Relu6),
            other => Err(ConvertError::invalid_operand(
                id,
                format!("unknown fuse code {other}"),
            )),
        }
    }
}

pub(crate) fn operand(model: &Model, id: OperandId) -> ConvertResult<&Operand> {
    model
        .operand(id)
        .ok_or_else(|| ConvertError::invalid_operand(id, "not part of the model"))
}

pub(crate) fn input_at(operation: &Operation, index: usize) -> ConvertResult<OperandId> {
    operation.inputs.get(index).copied().ok_or_else(|| {
        ConvertError::InvalidShape(format!(
            "{:?} expects an input at position {index}, got {} inputs",
            operation.kind,
            operation.inputs.len()
        ))
    })
}

pub(crate) fn output_at(operation: &Operation, index: usize) -> ConvertResult<OperandId> {
    operation.outputs.get(index).copied().ok_or_else(|| {
        ConvertError::InvalidShape(format!(
            "{:?} expects an output at position {index}, got {} outputs",
            operation.kind,
            operation.outputs.len()
        ))
    })
}

pub(crate) fn int32_scalar(model: &Model, id: OperandId) -> ConvertResult<i32> {
    operand(model, id)?
        .as_i32_scalar()
        .ok_or_else(|| ConvertError::invalid_operand(id, "expected a constant int32 scalar"))
}

pub(crate) fn int32_vector(model: &Model, id: OperandId) -> ConvertResult<Vec<i32>> {
    operand(model, id)?
        .as_i32_slice()
        .ok_or_else(|| ConvertError::invalid_operand(id, "expected a constant int32 vector"))
}

pub(crate) fn bool_scalar(model: &Model, id: OperandId) -> ConvertResult<bool> {
    operand(model, id)?
        .as_bool_scalar()
        .ok_or_else(|| ConvertError::invalid_operand(id, "expected a constant bool scalar"))
}

/// Reads an optional fuse-code operand; a missing operand means no activation.
pub(crate) fn fuse_code_at(
    model: &Model,
    operation: &Operation,
    index: usize,
) -> ConvertResult<FuseCode> {
    match operation.inputs.get(index) {
        Some(&id) => FuseCode::from_i32(id, int32_scalar(model, id)?),
        None => Ok(FuseCode::None),
    }
}

pub(crate) fn tensor_type<B: NetworkBuilder>(
    converter: &Converter<'_, B>,
    model: &Model,
    id: OperandId,
) -> ConvertResult<TensorType> {
    tensor_type_of(operand(model, id)?, converter.config().allow_dynamic_dims)
}

pub(crate) fn ints_attr(values: &[i32]) -> AttrValue {
    AttrValue::Ints(values.iter().map(|v| i64::from(*v)).collect())
}

/// Records `expr` for `output`, then appends the fused activation when there is one.
pub(crate) fn map_with_fuse_code<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    output: OperandId,
    expr: B::Expr,
    fuse_code: FuseCode,
    ty: &TensorType,
) -> ConvertResult<()> {
    let expr = converter.update_expr_map(output, expr);
    let activated = match fuse_code {
        FuseCode::None => return Ok(()),
        FuseCode::Relu => converter
            .builder()
            .call("nn.relu", &[expr], Attrs::new(), ty)?,
        FuseCode::Relu1 => converter
            .builder()
            .call("clip", &[expr], clip_attrs(-1.0, 1.0), ty)?,
        FuseCode::Relu6 => converter
            .builder()
            .call("clip", &[expr], clip_attrs(0.0, 6.0), ty)?,
    };
    converter.update_expr_map(output, activated);
    Ok(())
}

pub(crate) fn clip_attrs(min: f64, max: f64) -> Attrs {
    let mut attrs = Attrs::new();
    attrs.insert("a_min".to_string(), AttrValue::Float(min));
    attrs.insert("a_max".to_string(), AttrValue::Float(max));
    attrs
}
