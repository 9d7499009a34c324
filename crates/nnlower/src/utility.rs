use crate::backend::{Dim, ElemType, TensorType};
use crate::error::{ConvertError, ConvertResult};
use crate::hal::{Dimension, Operand, PrecisionCode};

/// Backend element type for a precision code, if the backend can hold it.
pub fn elem_type_of(precision: PrecisionCode) -> Option<ElemType> {
    match precision {
        PrecisionCode::Bool8 => Some(ElemType::Bool),
        PrecisionCode::Int8 | PrecisionCode::QuantInt8SymmPerLayer => Some(ElemType::Int8),
        PrecisionCode::UInt8 | PrecisionCode::QuantUInt8AsymmPerLayer => Some(ElemType::UInt8),
        PrecisionCode::Int16 => Some(ElemType::Int16),
        PrecisionCode::Int32 | PrecisionCode::QuantInt32SymmPerLayer => Some(ElemType::Int32),
        PrecisionCode::Int64 => Some(ElemType::Int64),
        PrecisionCode::Float16 => Some(ElemType::Float16),
        PrecisionCode::Float32 => Some(ElemType::Float32),
        PrecisionCode::Float64 => Some(ElemType::Float64),
        PrecisionCode::UInt16
        | PrecisionCode::UInt32
        | PrecisionCode::UInt64
        | PrecisionCode::QuantInt8SymmPerChannel
        | PrecisionCode::QuantInt32SymmPerChannel => None,
    }
}

pub fn convert_precision(precision: PrecisionCode) -> ConvertResult<ElemType> {
    elem_type_of(precision).ok_or(ConvertError::UnsupportedPrecision(precision))
}

pub fn convert_dimensions(dims: &[Dimension], allow_dynamic: bool) -> ConvertResult<Vec<Dim>> {
    let mut out = Vec::with_capacity(dims.len());
    for dim in dims {
        match dim {
            Dimension::Static(value) => out.push(Dim::Fixed(*value)),
            Dimension::Dynamic if allow_dynamic => out.push(Dim::Any),
            Dimension::Dynamic => {
                return Err(ConvertError::InvalidShape(
                    "dynamic dimensions are not allowed".to_string(),
                ))
            }
        }
    }
    Ok(out)
}

pub fn tensor_type_of(operand: &Operand, allow_dynamic: bool) -> ConvertResult<TensorType> {
    Ok(TensorType::new(
        convert_precision(operand.precision())?,
        convert_dimensions(operand.shape().dims(), allow_dynamic)?,
    ))
}

/// Normalizes a possibly negative axis against `rank`.
pub fn axis_index(axis: i32, rank: usize) -> ConvertResult<usize> {
    let resolved = if axis < 0 {
        rank as i64 + axis as i64
    } else {
        axis as i64
    };
    if resolved < 0 || resolved >= rank as i64 {
        return Err(ConvertError::InvalidShape(format!(
            "axis {axis} out of range for rank {rank}"
        )));
    }
    Ok(resolved as usize)
}
