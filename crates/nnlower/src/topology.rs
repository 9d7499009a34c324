use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::fmt;

use crate::hal::{Model, OperandId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    UnknownOperand {
        operand: OperandId,
        operation: usize,
    },
    /// An operation reads an operand that is neither constant, a model input, nor produced.
    OrphanOperand {
        operand: OperandId,
        operation: usize,
    },
    MultipleProducers {
        operand: OperandId,
        first: usize,
        second: usize,
    },
    Cycle {
        operations: Vec<usize>,
    },
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyError::UnknownOperand { operand, operation } => write!(
                f,
                "operation {operation} references unknown operand {operand}"
            ),
            TopologyError::OrphanOperand { operand, operation } => write!(
                f,
                "operand {operand} is missing before operation {operation}"
            ),
            TopologyError::MultipleProducers {
                operand,
                first,
                second,
            } => write!(
                f,
                "operand {operand} is produced by both operation {first} and operation {second}"
            ),
            TopologyError::Cycle { operations } => {
                write!(f, "operations {operations:?} form a cycle")
            }
        }
    }
}

impl std::error::Error for TopologyError {}

/// Orders operations so that every operation follows the producers of its inputs.
///
/// Among operations that are ready at the same time, the one listed first in the model wins,
/// so an already ordered model keeps its order.
pub fn sort_operations_in_topological_order(model: &Model) -> Result<Vec<usize>, TopologyError> {
    let operand_count = model.operands.len();
    let mut producers: HashMap<OperandId, usize> = HashMap::new();
    for (op_idx, operation) in model.operations.iter().enumerate() {
        for &output in &operation.outputs {
            if output.index() >= operand_count {
                return Err(TopologyError::UnknownOperand {
                    operand: output,
                    operation: op_idx,
                });
            }
            if let Some(&first) = producers.get(&output) {
                return Err(TopologyError::MultipleProducers {
                    operand: output,
                    first,
                    second: op_idx,
                });
            }
            producers.insert(output, op_idx);
        }
    }

    let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); model.operations.len()];
    let mut pending: Vec<usize> = vec![0; model.operations.len()];
    for (op_idx, operation) in model.operations.iter().enumerate() {
        let mut deps = BTreeSet::new();
        for &input in &operation.inputs {
            let operand = model
                .operand(input)
                .ok_or(TopologyError::UnknownOperand {
                    operand: input,
                    operation: op_idx,
                })?;
            match producers.get(&input) {
                Some(&producer) => {
                    deps.insert(producer);
                }
                None if operand.is_constant() || model.is_model_input(input) => {}
                None => {
                    return Err(TopologyError::OrphanOperand {
                        operand: input,
                        operation: op_idx,
                    })
                }
            }
        }
        pending[op_idx] = deps.len();
        for producer in deps {
            successors[producer].insert(op_idx);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();
    let mut order = Vec::with_capacity(model.operations.len());
    while let Some(Reverse(op_idx)) = ready.pop() {
        order.push(op_idx);
        for &next in &successors[op_idx] {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() != model.operations.len() {
        let operations = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(idx, _)| idx)
            .collect();
        return Err(TopologyError::Cycle { operations });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{ModelBuilder, OperationType, PrecisionCode, Shape};

    fn f32_shape() -> Shape {
        Shape::from_static(&[2])
    }

    #[test]
    fn out_of_order_operations_are_sorted_by_dependency() {
        let mut builder = ModelBuilder::new();
        let x = builder.add_input(PrecisionCode::Float32, f32_shape());
        let a = builder.add_temporary(PrecisionCode::Float32, f32_shape());
        let b = builder.add_temporary(PrecisionCode::Float32, f32_shape());
        builder.add_operation(OperationType::Tanh, vec![a], vec![b]);
        builder.add_operation(OperationType::Relu, vec![x], vec![a]);
        let model = builder.finish(vec![x], vec![b]);

        let order = sort_operations_in_topological_order(&model).expect("acyclic");
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn independent_operations_keep_model_order() {
        let mut builder = ModelBuilder::new();
        let x = builder.add_input(PrecisionCode::Float32, f32_shape());
        let a = builder.add_temporary(PrecisionCode::Float32, f32_shape());
        let b = builder.add_temporary(PrecisionCode::Float32, f32_shape());
        let c = builder.add_temporary(PrecisionCode::Float32, f32_shape());
        let fuse = builder.add_int32_scalar(0);
        builder.add_operation(OperationType::Relu, vec![x], vec![a]);
        builder.add_operation(OperationType::Tanh, vec![x], vec![b]);
        builder.add_operation(OperationType::Add, vec![a, b, fuse], vec![c]);
        let model = builder.finish(vec![x], vec![c]);

        let order = sort_operations_in_topological_order(&model).expect("acyclic");
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn cycles_are_reported() {
        let mut builder = ModelBuilder::new();
        let a = builder.add_temporary(PrecisionCode::Float32, f32_shape());
        let b = builder.add_temporary(PrecisionCode::Float32, f32_shape());
        builder.add_operation(OperationType::Relu, vec![a], vec![b]);
        builder.add_operation(OperationType::Tanh, vec![b], vec![a]);
        let model = builder.finish(Vec::new(), vec![b]);

        let err = sort_operations_in_topological_order(&model).expect_err("cycle");
        assert_eq!(
            err,
            TopologyError::Cycle {
                operations: vec![0, 1]
            }
        );
    }

    #[test]
    fn orphan_temporaries_are_reported() {
        let mut builder = ModelBuilder::new();
        let dangling = builder.add_temporary(PrecisionCode::Float32, f32_shape());
        let out = builder.add_temporary(PrecisionCode::Float32, f32_shape());
        builder.add_operation(OperationType::Relu, vec![dangling], vec![out]);
        let model = builder.finish(Vec::new(), vec![out]);

        let err = sort_operations_in_topological_order(&model).expect_err("orphan");
        assert_eq!(
            err,
            TopologyError::OrphanOperand {
                operand: dangling,
                operation: 0
            }
        );
    }

    #[test]
    fn double_producers_are_reported() {
        let mut builder = ModelBuilder::new();
        let x = builder.add_input(PrecisionCode::Float32, f32_shape());
        let out = builder.add_temporary(PrecisionCode::Float32, f32_shape());
        builder.add_operation(OperationType::Relu, vec![x], vec![out]);
        builder.add_operation(OperationType::Tanh, vec![x], vec![out]);
        let model = builder.finish(vec![x], vec![out]);

        assert!(matches!(
            sort_operations_in_topological_order(&model),
            Err(TopologyError::MultipleProducers {
                first: 0,
                second: 1,
                ..
            })
        ));
    }
}
