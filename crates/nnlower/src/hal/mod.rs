//! Hardware-neutral model graph consumed by the converter.
//!
//! Operands live in an arena owned by [`Model`] and are referred to by [`OperandId`];
//! operations link operands into a DAG.

mod model;
mod precision;
mod shape;

pub use model::{
    Model, ModelBuilder, Operand, OperandId, OperandLifetime, OperandType, Operation,
    OperationType,
};
pub use precision::PrecisionCode;
pub use shape::{element_count, static_dims, Dimension, Shape};
