//! Boundary between the converter and a target backend.
//!
//! A backend supplies a [`NetworkBuilder`] that accepts declared tensors and calls and hands
//! back opaque expression handles. Constant data lands in a [`ParamTable`] owned by the
//! caller; the compiled network refers to those entries by name.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Element types accepted by backend declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElemType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    Float16,
    Float32,
    Float64,
}

impl ElemType {
    pub fn size_in_bytes(self) -> usize {
        match self {
            ElemType::Bool | ElemType::Int8 | ElemType::UInt8 => 1,
            ElemType::Int16 | ElemType::Float16 => 2,
            ElemType::Int32 | ElemType::Float32 => 4,
            ElemType::Int64 | ElemType::Float64 => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElemType::Bool => "bool",
            ElemType::Int8 => "int8",
            ElemType::Int16 => "int16",
            ElemType::Int32 => "int32",
            ElemType::Int64 => "int64",
            ElemType::UInt8 => "uint8",
            ElemType::Float16 => "float16",
            ElemType::Float32 => "float32",
            ElemType::Float64 => "float64",
        }
    }
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend axis extent; `Any` is the backend's dynamic marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    Fixed(usize),
    Any,
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(value) => write!(f, "{value}"),
            Dim::Any => f.write_str("?"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorType {
    pub elem: ElemType,
    pub dims: Vec<Dim>,
}

impl TensorType {
    pub fn new(elem: ElemType, dims: Vec<Dim>) -> Self {
        Self { elem, dims }
    }

    pub fn element_count(&self) -> Option<usize> {
        let mut count = 1usize;
        for dim in &self.dims {
            match dim {
                Dim::Fixed(value) => count = count.checked_mul(*value)?,
                Dim::Any => return None,
            }
        }
        Some(count)
    }

    pub fn byte_len(&self) -> Option<usize> {
        self.element_count()?.checked_mul(self.elem.size_in_bytes())
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor<{}", self.elem)?;
        for (idx, dim) in self.dims.iter().enumerate() {
            if idx == 0 {
                write!(f, ", {dim}")?;
            } else {
                write!(f, "x{dim}")?;
            }
        }
        f.write_str(">")
    }
}

/// Attribute attached to a backend call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Int(i64),
    Ints(Vec<i64>),
    Float(f64),
    Bool(bool),
    Str(String),
}

pub type Attrs = BTreeMap<String, AttrValue>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("{what} is not supported by backend: {reason}")]
    Unsupported { what: String, reason: String },
    #[error("invalid declaration: {0}")]
    Invalid(String),
    #[error("backend failure: {0}")]
    Internal(String),
}

impl BackendError {
    pub fn unsupported(what: impl Into<String>, reason: impl Into<String>) -> Self {
        BackendError::Unsupported {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        BackendError::Invalid(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        BackendError::Internal(message.into())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Accumulates the target network for one conversion pass.
pub trait NetworkBuilder {
    type Expr: Clone + PartialEq + fmt::Debug;

    /// Declares a graph input; it becomes part of the compiled network's input signature.
    fn declare_input(&mut self, name: &str, ty: &TensorType) -> BackendResult<Self::Expr>;

    /// Declares a constant whose data is stored under `name` in the parameter table.
    fn declare_constant(&mut self, name: &str, ty: &TensorType) -> BackendResult<Self::Expr>;

    fn call(
        &mut self,
        op: &str,
        args: &[Self::Expr],
        attrs: Attrs,
        output: &TensorType,
    ) -> BackendResult<Self::Expr>;

    /// Emits a call yielding one tensor per entry of `outputs`, packed in a tuple expression.
    fn call_tuple(
        &mut self,
        op: &str,
        args: &[Self::Expr],
        attrs: Attrs,
        outputs: &[TensorType],
    ) -> BackendResult<Self::Expr>;

    /// Projects element `index` out of a tuple expression.
    fn tuple_get_item(
        &mut self,
        tuple: &Self::Expr,
        index: usize,
        ty: &TensorType,
    ) -> BackendResult<Self::Expr>;

    fn finalize(&mut self, outputs: &[Self::Expr]) -> BackendResult<()>;
}

/// Constant tensor data owned by the parameter table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantArray {
    pub ty: TensorType,
    pub bytes: Arc<[u8]>,
}

impl ConstantArray {
    /// Copies `bytes`; the length must match the static byte size of `ty`.
    pub fn copy_from(ty: TensorType, bytes: &[u8]) -> BackendResult<Self> {
        let expected = ty.byte_len().ok_or_else(|| {
            BackendError::invalid(format!("constant of type {ty} must have a static shape"))
        })?;
        if expected != bytes.len() {
            return Err(BackendError::invalid(format!(
                "constant of type {ty} needs {expected} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            ty,
            bytes: Arc::from(bytes),
        })
    }
}

/// Name-keyed constant storage referenced by the compiled network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamTable {
    entries: BTreeMap<String, ConstantArray>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `array` under `name`; an existing entry is never overwritten.
    pub fn insert(&mut self, name: impl Into<String>, array: ConstantArray) -> BackendResult<()> {
        match self.entries.entry(name.into()) {
            btree_map::Entry::Occupied(entry) => Err(BackendError::invalid(format!(
                "parameter '{}' already exists",
                entry.key()
            ))),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(array);
                Ok(())
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ConstantArray> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConstantArray)> {
        self.entries.iter().map(|(name, array)| (name.as_str(), array))
    }
}
