use std::collections::HashSet;
use std::fmt;

use crate::error::Status;
use crate::hal::{Model, OperandId, OperationType, PrecisionCode};
use crate::lowering::supported_operations;
use crate::utility::elem_type_of;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegalityIssue {
    UnsupportedOperation(OperationType),
    UnsupportedPrecision(PrecisionCode),
    DynamicShape,
    /// A constant buffer whose length does not match its precision and static shape.
    ConstantSize { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegalityDiagnostic {
    pub operation: Option<usize>,
    pub operand: Option<OperandId>,
    pub issue: LegalityIssue,
}

impl fmt::Display for LegalityDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.issue {
            LegalityIssue::UnsupportedOperation(kind) => {
                write!(f, "operation {kind:?} is not supported")?
            }
            LegalityIssue::UnsupportedPrecision(precision) => {
                write!(f, "precision {precision:?} is not supported")?
            }
            LegalityIssue::DynamicShape => f.write_str("dynamic dimensions are not allowed")?,
            LegalityIssue::ConstantSize { expected, actual } => write!(
                f,
                "constant buffer holds {actual} bytes, its type needs {expected}"
            )?,
        }
        if let Some(operand) = self.operand {
            write!(f, " (operand {operand})")?;
        }
        if let Some(operation) = self.operation {
            write!(f, " (operation {operation})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LegalitySpec {
    pub allowed_ops: Option<HashSet<OperationType>>,
    pub allow_dynamic_dims: bool,
    pub allowed_precisions: Option<HashSet<PrecisionCode>>,
}

impl Default for LegalitySpec {
    fn default() -> Self {
        Self {
            allowed_ops: None,
            allow_dynamic_dims: true,
            allowed_precisions: None,
        }
    }
}

impl LegalitySpec {
    /// Operations with a lowering rule and precisions with a backend element type.
    pub fn lowerable() -> Self {
        Self::default()
            .allow_ops(supported_operations().iter().cloned())
            .allow_precisions(
                ALL_PRECISIONS
                    .iter()
                    .copied()
                    .filter(|precision| elem_type_of(*precision).is_some()),
            )
    }

    pub fn allow_ops(mut self, ops: impl IntoIterator<Item = OperationType>) -> Self {
        self.allowed_ops = Some(ops.into_iter().collect());
        self
    }

    pub fn allow_precisions(mut self, precisions: impl IntoIterator<Item = PrecisionCode>) -> Self {
        self.allowed_precisions = Some(precisions.into_iter().collect());
        self
    }

    pub fn with_dynamic_dims(mut self, allowed: bool) -> Self {
        self.allow_dynamic_dims = allowed;
        self
    }
}

const ALL_PRECISIONS: [PrecisionCode; 17] = [
    PrecisionCode::Bool8,
    PrecisionCode::Int8,
    PrecisionCode::UInt8,
    PrecisionCode::Int16,
    PrecisionCode::UInt16,
    PrecisionCode::Int32,
    PrecisionCode::UInt32,
    PrecisionCode::Int64,
    PrecisionCode::UInt64,
    PrecisionCode::Float16,
    PrecisionCode::Float32,
    PrecisionCode::Float64,
    PrecisionCode::QuantInt8SymmPerLayer,
    PrecisionCode::QuantInt8SymmPerChannel,
    PrecisionCode::QuantUInt8AsymmPerLayer,
    PrecisionCode::QuantInt32SymmPerLayer,
    PrecisionCode::QuantInt32SymmPerChannel,
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegalityReport {
    pub diagnostics: Vec<LegalityDiagnostic>,
}

impl LegalityReport {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn status(&self) -> Status {
        let unsupported = self.diagnostics.iter().any(|diag| {
            matches!(
                diag.issue,
                LegalityIssue::UnsupportedOperation(_) | LegalityIssue::UnsupportedPrecision(_)
            )
        });
        if unsupported {
            Status::FeatureNotSupported
        } else {
            Status::InvalidParameter
        }
    }
}

impl fmt::Display for LegalityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, diag) in self.diagnostics.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{diag}")?;
        }
        Ok(())
    }
}

/// Checks every operation, every operand an operation touches and every model input
/// against `spec`.
pub fn check_model_legality(model: &Model, spec: &LegalitySpec) -> Result<(), LegalityReport> {
    let mut report = LegalityReport::default();
    let mut seen = HashSet::new();

    for (idx, operation) in model.operations.iter().enumerate() {
        if let Some(allowed) = &spec.allowed_ops {
            if !allowed.contains(&operation.kind) {
                report.diagnostics.push(LegalityDiagnostic {
                    operation: Some(idx),
                    operand: None,
                    issue: LegalityIssue::UnsupportedOperation(operation.kind.clone()),
                });
            }
        }
        for &id in operation.inputs.iter().chain(operation.outputs.iter()) {
            if seen.insert(id) {
                check_operand(model, id, Some(idx), spec, &mut report);
            }
        }
    }
    for &id in &model.input_indexes {
        if seen.insert(id) {
            check_operand(model, id, None, spec, &mut report);
        }
    }

    if report.is_ok() {
        Ok(())
    } else {
        Err(report)
    }
}

fn check_operand(
    model: &Model,
    id: OperandId,
    operation: Option<usize>,
    spec: &LegalitySpec,
    report: &mut LegalityReport,
) {
    // Dangling ids are reported by the topology pass.
    let Some(operand) = model.operand(id) else {
        return;
    };
    if let Some(allowed) = &spec.allowed_precisions {
        if !allowed.contains(&operand.precision()) {
            report.diagnostics.push(LegalityDiagnostic {
                operation,
                operand: Some(id),
                issue: LegalityIssue::UnsupportedPrecision(operand.precision()),
            });
        }
    }
    if !spec.allow_dynamic_dims && operand.shape().is_dynamic() {
        report.diagnostics.push(LegalityDiagnostic {
            operation,
            operand: Some(id),
            issue: LegalityIssue::DynamicShape,
        });
    }
    if let (Some(bytes), Some(count)) = (operand.buffer.as_deref(), operand.shape().element_count())
    {
        let expected = count * operand.precision().size_in_bytes();
        if bytes.len() != expected {
            report.diagnostics.push(LegalityDiagnostic {
                operation,
                operand: Some(id),
                issue: LegalityIssue::ConstantSize {
                    expected,
                    actual: bytes.len(),
                },
            });
        }
    }
}
