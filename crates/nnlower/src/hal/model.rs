use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::precision::PrecisionCode;
use super::shape::Shape;

/// Stable handle for an operand: its index in [`Model::operands`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperandId(pub u32);

impl OperandId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OperandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandLifetime {
    TemporaryVariable,
    ConstantCopy,
    ConstantReference,
    ModelInput,
    ModelOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandType {
    pub precision: PrecisionCode,
    pub shape: Shape,
    pub lifetime: OperandLifetime,
}

impl OperandType {
    pub fn new(precision: PrecisionCode, shape: Shape, lifetime: OperandLifetime) -> Self {
        Self {
            precision,
            shape,
            lifetime,
        }
    }
}

/// A typed tensor node of the model graph.
///
/// Constant operands carry their little-endian element data in a shared buffer; the
/// converter copies it out when declaring the constant, so the model never has to outlive
/// the parameter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operand {
    pub ty: OperandType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer: Option<Arc<[u8]>>,
}

impl Operand {
    pub fn new(ty: OperandType) -> Self {
        Self { ty, buffer: None }
    }

    pub fn with_buffer(ty: OperandType, buffer: impl Into<Arc<[u8]>>) -> Self {
        Self {
            ty,
            buffer: Some(buffer.into()),
        }
    }

    pub fn is_constant(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn precision(&self) -> PrecisionCode {
        self.ty.precision
    }

    pub fn shape(&self) -> &Shape {
        &self.ty.shape
    }

    /// Decodes a constant int32 buffer.
    pub fn as_i32_slice(&self) -> Option<Vec<i32>> {
        if !matches!(
            self.ty.precision,
            PrecisionCode::Int32 | PrecisionCode::QuantInt32SymmPerLayer
        ) {
            return None;
        }
        let bytes = self.buffer.as_deref()?;
        if bytes.len() % 4 != 0 {
            return None;
        }
        Some(
            bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }

    pub fn as_i32_scalar(&self) -> Option<i32> {
        match self.as_i32_slice()?.as_slice() {
            [value] => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool_scalar(&self) -> Option<bool> {
        if self.ty.precision != PrecisionCode::Bool8 {
            return None;
        }
        match self.buffer.as_deref()? {
            [value] => Some(*value != 0),
            _ => None,
        }
    }
}

/// Operation kinds understood by the hardware-neutral model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
    Pow,
    Relu,
    Relu6,
    Sigmoid,
    Tanh,
    Abs,
    Exp,
    Log,
    Sqrt,
    Softmax,
    Reshape,
    Transpose,
    Concat,
    Flatten,
    Split,
    FullyConnected,
    MatMul,
    Conv2D,
    AveragePool2D,
    MaxPool2D,
    BatchNormalization,
    Lstm,
    NonMaxSuppression,
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationType,
    pub inputs: Vec<OperandId>,
    pub outputs: Vec<OperandId>,
}

/// Hardware-neutral model graph: an arena of operands linked by operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub operands: Vec<Operand>,
    pub operations: Vec<Operation>,
    pub input_indexes: Vec<OperandId>,
    pub output_indexes: Vec<OperandId>,
}

impl Model {
    pub fn operand(&self, id: OperandId) -> Option<&Operand> {
        self.operands.get(id.index())
    }

    pub fn is_model_input(&self, id: OperandId) -> bool {
        self.input_indexes.contains(&id)
    }

    pub fn from_json_str(source: &str) -> serde_json::Result<Self> {
        serde_json::from_str(source)
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Default)]
pub struct ModelBuilder {
    operands: Vec<Operand>,
    operations: Vec<Operation>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_operand(&mut self, operand: Operand) -> OperandId {
        let id = OperandId(self.operands.len() as u32);
        self.operands.push(operand);
        id
    }

    pub fn add_input(&mut self, precision: PrecisionCode, shape: Shape) -> OperandId {
        self.add_operand(Operand::new(OperandType::new(
            precision,
            shape,
            OperandLifetime::ModelInput,
        )))
    }

    pub fn add_temporary(&mut self, precision: PrecisionCode, shape: Shape) -> OperandId {
        self.add_operand(Operand::new(OperandType::new(
            precision,
            shape,
            OperandLifetime::TemporaryVariable,
        )))
    }

    pub fn add_constant(
        &mut self,
        precision: PrecisionCode,
        shape: Shape,
        bytes: impl Into<Arc<[u8]>>,
    ) -> OperandId {
        self.add_operand(Operand::with_buffer(
            OperandType::new(precision, shape, OperandLifetime::ConstantCopy),
            bytes,
        ))
    }

    pub fn add_int32_constant(&mut self, values: &[i32], shape: Shape) -> OperandId {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.add_constant(PrecisionCode::Int32, shape, bytes)
    }

    pub fn add_float32_constant(&mut self, values: &[f32], shape: Shape) -> OperandId {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.add_constant(PrecisionCode::Float32, shape, bytes)
    }

    pub fn add_int32_scalar(&mut self, value: i32) -> OperandId {
        self.add_int32_constant(&[value], Shape::scalar())
    }

    /// One-dimensional int32 attribute (shape, perm, pads, ...).
    pub fn add_int32_vector(&mut self, values: &[i32]) -> OperandId {
        self.add_int32_constant(values, Shape::from_static(&[values.len()]))
    }

    pub fn add_bool_scalar(&mut self, value: bool) -> OperandId {
        self.add_constant(PrecisionCode::Bool8, Shape::scalar(), vec![u8::from(value)])
    }

    pub fn add_operation(
        &mut self,
        kind: OperationType,
        inputs: Vec<OperandId>,
        outputs: Vec<OperandId>,
    ) -> usize {
        self.operations.push(Operation {
            kind,
            inputs,
            outputs,
        });
        self.operations.len() - 1
    }

    /// Finalizes the model; listed outputs that were temporaries become model outputs.
    pub fn finish(mut self, inputs: Vec<OperandId>, outputs: Vec<OperandId>) -> Model {
        for id in &outputs {
            if let Some(operand) = self.operands.get_mut(id.index()) {
                if operand.ty.lifetime == OperandLifetime::TemporaryVariable {
                    operand.ty.lifetime = OperandLifetime::ModelOutput;
                }
            }
        }
        Model {
            operands: self.operands,
            operations: self.operations,
            input_indexes: inputs,
            output_indexes: outputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_accessors_decode_little_endian_buffers() {
        let mut builder = ModelBuilder::new();
        let axis = builder.add_int32_scalar(-1);
        let flag = builder.add_bool_scalar(true);
        let perm = builder.add_int32_vector(&[0, 2, 1]);
        let model = builder.finish(Vec::new(), Vec::new());

        let axis = model.operand(axis).expect("axis operand");
        assert_eq!(axis.as_i32_scalar(), Some(-1));
        assert_eq!(axis.as_bool_scalar(), None);
        let flag = model.operand(flag).expect("flag operand");
        assert_eq!(flag.as_bool_scalar(), Some(true));
        let perm = model.operand(perm).expect("perm operand");
        assert_eq!(perm.as_i32_slice(), Some(vec![0, 2, 1]));
        assert_eq!(perm.as_i32_scalar(), None);
    }

    #[test]
    fn finish_promotes_output_temporaries() {
        let mut builder = ModelBuilder::new();
        let x = builder.add_input(PrecisionCode::Float32, Shape::from_static(&[4]));
        let y = builder.add_temporary(PrecisionCode::Float32, Shape::from_static(&[4]));
        builder.add_operation(OperationType::Relu, vec![x], vec![y]);
        let model = builder.finish(vec![x], vec![y]);

        let y_operand = model.operand(y).expect("output operand");
        assert_eq!(y_operand.ty.lifetime, OperandLifetime::ModelOutput);
        assert_eq!(model.operand(x).map(|o| o.ty.lifetime), Some(OperandLifetime::ModelInput));
        assert!(model.is_model_input(x));
    }

    #[test]
    fn model_round_trips_through_json() {
        let mut builder = ModelBuilder::new();
        let x = builder.add_input(PrecisionCode::Float32, Shape::from_static(&[2]));
        let c = builder.add_float32_constant(&[1.0, 2.0], Shape::from_static(&[2]));
        let fuse = builder.add_int32_scalar(0);
        let y = builder.add_temporary(PrecisionCode::Float32, Shape::from_static(&[2]));
        builder.add_operation(OperationType::Add, vec![x, c, fuse], vec![y]);
        let model = builder.finish(vec![x], vec![y]);

        let json = model.to_json_string().expect("serialize model");
        let parsed = Model::from_json_str(&json).expect("parse model");
        assert_eq!(parsed, model);
    }
}
