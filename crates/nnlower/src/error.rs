use thiserror::Error;

use crate::backend::BackendError;
use crate::hal::{OperandId, OperationType, PrecisionCode};
use crate::legality::LegalityReport;
use crate::topology::TopologyError;

#[derive(Debug, Error, Clone)]
pub enum ConvertError {
    #[error("operation {0:?} has no lowering rule")]
    UnsupportedOperation(OperationType),
    #[error("precision {0:?} has no backend element type")]
    UnsupportedPrecision(PrecisionCode),
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error("operand {id}: {reason}")]
    InvalidOperand { id: OperandId, reason: String },
    #[error("parameter name '{0}' is already taken")]
    NameCollision(String),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("model rejected: {0}")]
    Illegal(LegalityReport),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ConvertError {
    pub fn invalid_operand(id: OperandId, reason: impl Into<String>) -> Self {
        ConvertError::InvalidOperand {
            id,
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            ConvertError::UnsupportedOperation(_) | ConvertError::UnsupportedPrecision(_) => {
                Status::FeatureNotSupported
            }
            ConvertError::Illegal(report) => report.status(),
            ConvertError::InvalidShape(_)
            | ConvertError::InvalidOperand { .. }
            | ConvertError::NameCollision(_) => Status::InvalidParameter,
            ConvertError::Topology(_) => Status::InvalidModel,
            ConvertError::Backend(BackendError::Unsupported { .. }) => Status::FeatureNotSupported,
            ConvertError::Backend(BackendError::Invalid(_)) => Status::InvalidParameter,
            ConvertError::Backend(BackendError::Internal(_)) => Status::BackendFailure,
        }
    }
}

pub type ConvertResult<T> = Result<T, ConvertError>;

/// Coarse outcome of a conversion, for callers that report integer status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    InvalidParameter,
    InvalidModel,
    FeatureNotSupported,
    BackendFailure,
}

impl Status {
    pub fn code(self) -> i32 {
        match self {
            Status::Success => 0,
            Status::InvalidParameter => 1,
            Status::InvalidModel => 2,
            Status::FeatureNotSupported => 3,
            Status::BackendFailure => 4,
        }
    }

    pub fn of<T>(result: &ConvertResult<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(err) => err.status(),
        }
    }
}
