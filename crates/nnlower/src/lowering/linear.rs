use super::{
    bool_scalar, fuse_code_at, input_at, int32_scalar, int32_vector, ints_attr,
    map_with_fuse_code, operand, output_at, tensor_type,
};
use crate::backend::{AttrValue, Attrs, Dim, NetworkBuilder, TensorType};
use crate::converter::Converter;
use crate::error::{ConvertError, ConvertResult};
use crate::hal::{Model, OperandId, Operation};

fn static_filter_dims(model: &Model, id: OperandId, rank: usize) -> ConvertResult<Vec<usize>> {
    let dims = operand(model, id)?
        .shape()
        .static_dims()
        .ok_or_else(|| ConvertError::invalid_operand(id, "weights need static dimensions"))?;
    if dims.len() != rank {
        return Err(ConvertError::invalid_operand(
            id,
            format!("expected rank {rank} weights, got rank {}", dims.len()),
        ));
    }
    Ok(dims)
}

fn bias_add<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    input: B::Expr,
    bias: OperandId,
    axis: i64,
    ty: &TensorType,
) -> ConvertResult<B::Expr> {
    let bias_expr = converter.convert_operand(model, bias, None, None)?;
    let mut attrs = Attrs::new();
    attrs.insert("axis".to_string(), AttrValue::Int(axis));
    Ok(converter
        .builder()
        .call("nn.bias_add", &[input, bias_expr], attrs, ty)?)
}

/// Inputs: `[x, weight, bias, fuse_code]` with `weight` laid out `[units, input_size]`.
///
/// Inputs of rank other than two are first reshaped to `[-1, input_size]`. When the model's
/// output type differs from the `[batch, units]` dense result, the result is reshaped onto it.
pub(super) fn lower_fully_connected<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    operation: &Operation,
) -> ConvertResult<()> {
    let input = input_at(operation, 0)?;
    let weight = input_at(operation, 1)?;
    let bias = input_at(operation, 2)?;
    let fuse_code = fuse_code_at(model, operation, 3)?;
    let output = output_at(operation, 0)?;

    let weight_dims = static_filter_dims(model, weight, 2)?;
    let (units, input_size) = (weight_dims[0], weight_dims[1]);
    let out_ty = tensor_type(converter, model, output)?;
    let in_ty = tensor_type(converter, model, input)?;

    let mut input_expr = converter.convert_operand(model, input, None, None)?;
    let batch = if in_ty.dims.len() == 2 {
        in_ty.dims[0]
    } else {
        let batch = match in_ty.element_count() {
            Some(count) if input_size > 0 && count % input_size == 0 => {
                Dim::Fixed(count / input_size)
            }
            Some(count) => {
                return Err(ConvertError::InvalidShape(format!(
                    "{count} input elements do not split into rows of {input_size}"
                )))
            }
            None => Dim::Any,
        };
        let flat_ty = TensorType::new(in_ty.elem, vec![batch, Dim::Fixed(input_size)]);
        let mut attrs = Attrs::new();
        attrs.insert(
            "newshape".to_string(),
            AttrValue::Ints(vec![-1, input_size as i64]),
        );
        input_expr = converter
            .builder()
            .call("reshape", &[input_expr], attrs, &flat_ty)?;
        batch
    };

    let dense_ty = TensorType::new(out_ty.elem, vec![batch, Dim::Fixed(units)]);
    let weight_expr = converter.convert_operand(model, weight, None, None)?;
    let mut attrs = Attrs::new();
    attrs.insert("units".to_string(), AttrValue::Int(units as i64));
    let dense = converter
        .builder()
        .call("nn.dense", &[input_expr, weight_expr], attrs, &dense_ty)?;
    let mut expr = bias_add(converter, model, dense, bias, 1, &dense_ty)?;
    if out_ty != dense_ty {
        expr = reshape_onto(converter, expr, &dense_ty, &out_ty)?;
    }
    map_with_fuse_code(converter, output, expr, fuse_code, &out_ty)
}

fn reshape_onto<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    expr: B::Expr,
    from: &TensorType,
    to: &TensorType,
) -> ConvertResult<B::Expr> {
    let mismatch = || {
        ConvertError::InvalidShape(format!("fully connected result {from} cannot become {to}"))
    };
    if let (Some(have), Some(want)) = (from.element_count(), to.element_count()) {
        if have != want {
            return Err(mismatch());
        }
    }
    if to.dims.iter().filter(|dim| **dim == Dim::Any).count() > 1 {
        return Err(mismatch());
    }
    let newshape = to
        .dims
        .iter()
        .map(|dim| match dim {
            Dim::Fixed(value) => *value as i64,
            Dim::Any => -1,
        })
        .collect();
    let mut attrs = Attrs::new();
    attrs.insert("newshape".to_string(), AttrValue::Ints(newshape));
    Ok(converter.builder().call("reshape", &[expr], attrs, to)?)
}

/// Inputs: `[x, y, transpose_x, transpose_y]`.
pub(super) fn lower_mat_mul<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    operation: &Operation,
) -> ConvertResult<()> {
    let lhs = input_at(operation, 0)?;
    let rhs = input_at(operation, 1)?;
    let transpose_lhs = bool_scalar(model, input_at(operation, 2)?)?;
    let transpose_rhs = bool_scalar(model, input_at(operation, 3)?)?;
    let output = output_at(operation, 0)?;

    let lhs_expr = converter.convert_operand(model, lhs, None, None)?;
    let rhs_expr = converter.convert_operand(model, rhs, None, None)?;
    let out_ty = tensor_type(converter, model, output)?;
    let mut attrs = Attrs::new();
    attrs.insert("transpose_a".to_string(), AttrValue::Bool(transpose_lhs));
    attrs.insert("transpose_b".to_string(), AttrValue::Bool(transpose_rhs));
    let expr = converter
        .builder()
        .call("nn.matmul", &[lhs_expr, rhs_expr], attrs, &out_ty)?;
    converter.update_expr_map(output, expr);
    Ok(())
}

fn auto_pad_name(id: OperandId, code: i32) -> ConvertResult<&'static str> {
    match code {
        0 => Ok("explicit"),
        1 => Ok("same"),
        2 => Ok("valid"),
        other => Err(ConvertError::invalid_operand(
            id,
            format!("unknown auto pad code {other}"),
        )),
    }
}

fn pair_attr(model: &Model, id: OperandId) -> ConvertResult<AttrValue> {
    let values = int32_vector(model, id)?;
    if values.len() != 2 {
        return Err(ConvertError::invalid_operand(
            id,
            format!("expected 2 values, got {}", values.len()),
        ));
    }
    Ok(ints_attr(&values))
}

/// Inputs: `[x, filter, bias, auto_pad, pads, strides, group, dilations, fuse_code]`.
///
/// Layout is NCHW with an OIHW filter; `pads` is `[top, bottom, left, right]`.
pub(super) fn lower_conv2d<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    operation: &Operation,
) -> ConvertResult<()> {
    let input = input_at(operation, 0)?;
    let filter = input_at(operation, 1)?;
    let bias = input_at(operation, 2)?;
    let auto_pad_id = input_at(operation, 3)?;
    let pads_id = input_at(operation, 4)?;
    let strides_id = input_at(operation, 5)?;
    let group = int32_scalar(model, input_at(operation, 6)?)?;
    let dilations_id = input_at(operation, 7)?;
    let fuse_code = fuse_code_at(model, operation, 8)?;
    let output = output_at(operation, 0)?;

    let filter_dims = static_filter_dims(model, filter, 4)?;
    let auto_pad = auto_pad_name(auto_pad_id, int32_scalar(model, auto_pad_id)?)?;
    let pads = int32_vector(model, pads_id)?;
    let &[top, bottom, left, right] = pads.as_slice() else {
        return Err(ConvertError::invalid_operand(
            pads_id,
            format!("expected 4 pads, got {}", pads.len()),
        ));
    };
    if group <= 0 {
        return Err(ConvertError::InvalidShape(format!(
            "conv2d group must be positive, got {group}"
        )));
    }

    let input_expr = converter.convert_operand(model, input, None, None)?;
    let filter_expr = converter.convert_operand(model, filter, None, None)?;
    let out_ty = tensor_type(converter, model, output)?;
    let mut attrs = Attrs::new();
    attrs.insert(
        "channels".to_string(),
        AttrValue::Int(filter_dims[0] as i64),
    );
    attrs.insert(
        "kernel_size".to_string(),
        AttrValue::Ints(vec![filter_dims[2] as i64, filter_dims[3] as i64]),
    );
    attrs.insert("strides".to_string(), pair_attr(model, strides_id)?);
    attrs.insert("dilation".to_string(), pair_attr(model, dilations_id)?);
    attrs.insert("padding".to_string(), ints_attr(&[top, left, bottom, right]));
    attrs.insert("groups".to_string(), AttrValue::Int(i64::from(group)));
    attrs.insert("auto_pad".to_string(), AttrValue::Str(auto_pad.to_string()));
    attrs.insert(
        "data_layout".to_string(),
        AttrValue::Str("NCHW".to_string()),
    );
    attrs.insert(
        "kernel_layout".to_string(),
        AttrValue::Str("OIHW".to_string()),
    );
    let conv = converter
        .builder()
        .call("nn.conv2d", &[input_expr, filter_expr], attrs, &out_ty)?;
    let expr = bias_add(converter, model, conv, bias, 1, &out_ty)?;
    map_with_fuse_code(converter, output, expr, fuse_code, &out_ty)
}
