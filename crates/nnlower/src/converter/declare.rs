use tracing::debug;

use super::Converter;
use crate::backend::{ConstantArray, Dim, NetworkBuilder, TensorType};
use crate::error::{ConvertError, ConvertResult};
use crate::hal::{Dimension, Model, OperandId, PrecisionCode};
use crate::utility::{convert_dimensions, convert_precision};

impl<'a, B: NetworkBuilder> Converter<'a, B> {
    /// Declares a graph input of the given precision and shape.
    pub fn add_input_tensor(
        &mut self,
        name: &str,
        precision: PrecisionCode,
        dimensions: &[Dimension],
    ) -> ConvertResult<B::Expr> {
        let ty = TensorType::new(
            convert_precision(precision)?,
            convert_dimensions(dimensions, self.config.allow_dynamic_dims)?,
        );
        let expr = self.builder.declare_input(name, &ty)?;
        debug!(name, ty = %ty, "declared input tensor");
        Ok(expr)
    }

    /// Declares a constant backed by a copy of `values` (little-endian elements).
    ///
    /// `dimensions: None` declares a 1-D tensor holding every element of `values`;
    /// `Some(&[])` declares a scalar. Without a name, the first generated name from the
    /// configured constant prefix that is not yet in the parameter table is used; an
    /// explicit name that is already taken is a [`ConvertError::NameCollision`].
    pub fn add_constant_tensor(
        &mut self,
        values: &[u8],
        precision: PrecisionCode,
        dimensions: Option<&[Dimension]>,
        name: Option<&str>,
    ) -> ConvertResult<B::Expr> {
        let elem = convert_precision(precision)?;
        let dims = match dimensions {
            Some(dims) => convert_dimensions(dims, false).map_err(|_| {
                ConvertError::InvalidShape("constant tensors need static dimensions".to_string())
            })?,
            None => {
                if values.len() % elem.size_in_bytes() != 0 {
                    return Err(ConvertError::InvalidShape(format!(
                        "{} bytes do not hold whole {elem} elements",
                        values.len()
                    )));
                }
                vec![Dim::Fixed(values.len() / elem.size_in_bytes())]
            }
        };
        let ty = TensorType::new(elem, dims);
        if ty.byte_len() != Some(values.len()) {
            return Err(ConvertError::InvalidShape(format!(
                "constant of type {ty} does not match its {} byte buffer",
                values.len()
            )));
        }
        let array = ConstantArray::copy_from(ty.clone(), values)?;

        let name = match name.filter(|name| !name.is_empty()) {
            Some(name) if self.params.contains(name) => {
                return Err(ConvertError::NameCollision(name.to_string()))
            }
            Some(name) => name.to_string(),
            None => {
                let prefix = self.config.constant_prefix.clone();
                let mut name = self.get_unique_name(&prefix);
                // Skip generated names a caller already took explicitly.
                while self.params.contains(&name) {
                    name = self.get_unique_name(&prefix);
                }
                name
            }
        };
        let expr = self.builder.declare_constant(&name, &ty)?;
        self.params.insert(name.clone(), array)?;
        debug!(name = %name, ty = %ty, "declared constant tensor");
        Ok(expr)
    }

    pub fn add_int32_constant_tensor(
        &mut self,
        values: &[i32],
        dimensions: Option<&[Dimension]>,
        name: Option<&str>,
    ) -> ConvertResult<B::Expr> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.add_constant_tensor(&bytes, PrecisionCode::Int32, dimensions, name)
    }

    pub fn add_float32_constant_tensor(
        &mut self,
        values: &[f32],
        dimensions: Option<&[Dimension]>,
        name: Option<&str>,
    ) -> ConvertResult<B::Expr> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.add_constant_tensor(&bytes, PrecisionCode::Float32, dimensions, name)
    }

    /// Converts a constant or model-input operand and records its expression.
    ///
    /// An operand that already has an expression is returned as is. Otherwise constants are
    /// declared through [`Self::add_constant_tensor`] and everything else through
    /// [`Self::add_input_tensor`]. `dimensions` overrides the operand's own shape at the
    /// declaration site; the operand itself is untouched.
    pub fn convert_operand(
        &mut self,
        model: &Model,
        id: OperandId,
        dimensions: Option<&[Dimension]>,
        name: Option<&str>,
    ) -> ConvertResult<B::Expr> {
        if let Some(expr) = self.get_mapped_expr(id) {
            return Ok(expr);
        }
        let operand = model
            .operand(id)
            .ok_or_else(|| ConvertError::invalid_operand(id, "not part of the model"))?;
        let dims = dimensions.unwrap_or_else(|| operand.shape().dims());
        let expr = match operand.buffer.as_deref() {
            Some(bytes) => self.add_constant_tensor(bytes, operand.precision(), Some(dims), name)?,
            None => {
                let name = match name.filter(|name| !name.is_empty()) {
                    Some(name) => name.to_string(),
                    None => {
                        let prefix = self.config.input_prefix.clone();
                        self.get_unique_name(&prefix)
                    }
                };
                self.add_input_tensor(&name, operand.precision(), dims)?
            }
        };
        Ok(self.update_expr_map(id, expr))
    }
}
