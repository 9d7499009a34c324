use super::{input_at, int32_scalar, int32_vector, ints_attr, operand, output_at, tensor_type};
use crate::backend::{AttrValue, Attrs, Dim, NetworkBuilder};
use crate::converter::Converter;
use crate::error::{ConvertError, ConvertResult};
use crate::hal::{Model, Operation};
use crate::utility::axis_index;

/// Inputs: `[x, shape]`; `0` copies the input extent and `-1` is inferred by the backend.
pub(super) fn lower_reshape<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    operation: &Operation,
) -> ConvertResult<()> {
    let input = input_at(operation, 0)?;
    let shape = int32_vector(model, input_at(operation, 1)?)?;
    let output = output_at(operation, 0)?;

    let input_expr = converter.convert_operand(model, input, None, None)?;
    let out_ty = tensor_type(converter, model, output)?;
    let mut attrs = Attrs::new();
    attrs.insert("newshape".to_string(), ints_attr(&shape));
    let expr = converter
        .builder()
        .call("reshape", &[input_expr], attrs, &out_ty)?;
    converter.update_expr_map(output, expr);
    Ok(())
}

/// Inputs: `[x, perm]`.
pub(super) fn lower_transpose<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    operation: &Operation,
) -> ConvertResult<()> {
    let input = input_at(operation, 0)?;
    let perm_id = input_at(operation, 1)?;
    let perm = int32_vector(model, perm_id)?;
    let rank = operand(model, input)?.shape().rank();
    if perm.len() != rank {
        return Err(ConvertError::invalid_operand(
            perm_id,
            format!("permutation of length {} for rank {rank}", perm.len()),
        ));
    }
    let output = output_at(operation, 0)?;

    let input_expr = converter.convert_operand(model, input, None, None)?;
    let out_ty = tensor_type(converter, model, output)?;
    let mut attrs = Attrs::new();
    attrs.insert("axes".to_string(), ints_attr(&perm));
    let expr = converter
        .builder()
        .call("transpose", &[input_expr], attrs, &out_ty)?;
    converter.update_expr_map(output, expr);
    Ok(())
}

/// Inputs: `[x0, .., xn, axis]`.
pub(super) fn lower_concat<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    operation: &Operation,
) -> ConvertResult<()> {
    let Some((&axis_id, tensors)) = operation.inputs.split_last() else {
        return Err(ConvertError::InvalidShape(
            "concat needs at least one tensor and an axis".to_string(),
        ));
    };
    let first = tensors.first().copied().ok_or_else(|| {
        ConvertError::InvalidShape("concat needs at least one tensor".to_string())
    })?;
    let rank = operand(model, first)?.shape().rank();
    let axis = axis_index(int32_scalar(model, axis_id)?, rank)?;
    let output = output_at(operation, 0)?;

    let mut args = Vec::with_capacity(tensors.len());
    for &id in tensors {
        args.push(converter.convert_operand(model, id, None, None)?);
    }
    let out_ty = tensor_type(converter, model, output)?;
    let mut attrs = Attrs::new();
    attrs.insert("axis".to_string(), AttrValue::Int(axis as i64));
    let expr = converter
        .builder()
        .call("concatenate", &args, attrs, &out_ty)?;
    converter.update_expr_map(output, expr);
    Ok(())
}

/// Inputs: `[x, start_axis, end_axis]`; lowered to a reshape that keeps every axis outside
/// the flattened span.
pub(super) fn lower_flatten<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    operation: &Operation,
) -> ConvertResult<()> {
    let input = input_at(operation, 0)?;
    let rank = operand(model, input)?.shape().rank();
    let start = axis_index(int32_scalar(model, input_at(operation, 1)?)?, rank)?;
    let end = axis_index(int32_scalar(model, input_at(operation, 2)?)?, rank)?;
    if start > end {
        return Err(ConvertError::InvalidShape(format!(
            "flatten start axis {start} is after end axis {end}"
        )));
    }
    let output = output_at(operation, 0)?;

    let input_expr = converter.convert_operand(model, input, None, None)?;
    let out_ty = tensor_type(converter, model, output)?;
    let in_dims = &tensor_type(converter, model, input)?.dims;
    let span = in_dims[start..=end]
        .iter()
        .try_fold(1i64, |acc, dim| match dim {
            Dim::Fixed(value) => Some(acc * *value as i64),
            Dim::Any => None,
        })
        .unwrap_or(-1);
    // Kept axes copy their input extent, so only the flattened span can be inferred.
    let mut newshape = vec![0i64; start];
    newshape.push(span);
    newshape.extend(std::iter::repeat(0i64).take(rank - end - 1));
    if newshape.len() != out_ty.dims.len() {
        return Err(ConvertError::InvalidShape(format!(
            "flatten of axes {start}..={end} yields rank {}, output has rank {}",
            newshape.len(),
            out_ty.dims.len()
        )));
    }
    let mut attrs = Attrs::new();
    attrs.insert("newshape".to_string(), AttrValue::Ints(newshape));
    let expr = converter
        .builder()
        .call("reshape", &[input_expr], attrs, &out_ty)?;
    converter.update_expr_map(output, expr);
    Ok(())
}

/// Inputs: `[x, axis, split]`; one output per entry of `split`.
pub(super) fn lower_split<B: NetworkBuilder>(
    converter: &mut Converter<'_, B>,
    model: &Model,
    operation: &Operation,
) -> ConvertResult<()> {
    let input = input_at(operation, 0)?;
    let rank = operand(model, input)?.shape().rank();
    let axis = axis_index(int32_scalar(model, input_at(operation, 1)?)?, rank)?;
    let split_id = input_at(operation, 2)?;
    let split = int32_vector(model, split_id)?;
    if split.is_empty()
        || split.len() != operation.outputs.len()
        || split.iter().any(|size| *size < 0)
    {
        return Err(ConvertError::invalid_operand(
            split_id,
            format!(
                "split sizes {split:?} do not match {} outputs",
                operation.outputs.len()
            ),
        ));
    }

    let input_expr = converter.convert_operand(model, input, None, None)?;
    let mut out_types = Vec::with_capacity(operation.outputs.len());
    for &output in &operation.outputs {
        out_types.push(tensor_type(converter, model, output)?);
    }
    // Split points between consecutive sections.
    let mut indices = Vec::with_capacity(split.len().saturating_sub(1));
    let mut offset = 0i64;
    for size in &split[..split.len().saturating_sub(1)] {
        offset += i64::from(*size);
        indices.push(offset);
    }
    let mut attrs = Attrs::new();
    attrs.insert("axis".to_string(), AttrValue::Int(axis as i64));
    attrs.insert("indices_or_sections".to_string(), AttrValue::Ints(indices));
    let tuple = converter
        .builder()
        .call_tuple("split", &[input_expr], attrs, &out_types)?;
    for (index, (&output, ty)) in operation.outputs.iter().zip(&out_types).enumerate() {
        let item = converter.builder().tuple_get_item(&tuple, index, ty)?;
        converter.update_expr_map(output, item);
    }
    Ok(())
}
