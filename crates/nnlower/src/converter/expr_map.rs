use std::collections::HashMap;

use smallvec::SmallVec;

use crate::hal::OperandId;

/// Operand to expression sequence mapping shared between a converter and its caller.
///
/// A present entry is never empty. The last expression is the operand's current value;
/// earlier ones stay reachable through [`ExprMap::get`].
#[derive(Debug, Clone)]
pub struct ExprMap<E> {
    entries: HashMap<OperandId, SmallVec<[E; 1]>>,
}

impl<E> Default for ExprMap<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<E: Clone> ExprMap<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: OperandId) -> Option<&[E]> {
        self.entries.get(&id).map(|exprs| exprs.as_slice())
    }

    pub fn latest(&self, id: OperandId) -> Option<&E> {
        self.entries.get(&id).and_then(|exprs| exprs.last())
    }

    pub fn push(&mut self, id: OperandId, expr: E) {
        self.entries.entry(id).or_default().push(expr);
    }

    pub fn contains(&self, id: OperandId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of operands with at least one expression.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
