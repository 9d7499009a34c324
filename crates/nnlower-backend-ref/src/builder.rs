use std::collections::HashSet;

use nnlower::backend::{
    Attrs, BackendError, BackendResult, ElemType, NetworkBuilder, TensorType,
};
use tracing::{debug, trace};

use crate::network::{render, ExprId, Node, NodeKind, NodeType, RecordedNetwork};

/// Network builder that records every declaration as a node.
///
/// Element types and call names can be restricted to mimic a backend that rejects part
/// of the declaration surface.
#[derive(Debug, Default)]
pub struct RecordingBuilder {
    nodes: Vec<Node>,
    input_names: HashSet<String>,
    outputs: Option<Vec<ExprId>>,
    allowed_elems: Option<HashSet<ElemType>>,
    allowed_ops: Option<HashSet<String>>,
}

impl RecordingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_elem_types(mut self, elems: impl IntoIterator<Item = ElemType>) -> Self {
        self.allowed_elems = Some(elems.into_iter().collect());
        self
    }

    pub fn with_ops<S: Into<String>>(mut self, ops: impl IntoIterator<Item = S>) -> Self {
        self.allowed_ops = Some(ops.into_iter().map(Into::into).collect());
        self
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: ExprId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn inputs(&self) -> Vec<(ExprId, &str)> {
        self.filter_named(|kind| match kind {
            NodeKind::Input { name } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn constants(&self) -> Vec<(ExprId, &str)> {
        self.filter_named(|kind| match kind {
            NodeKind::Constant { name } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Ids and names of every call node, in declaration order.
    pub fn calls(&self) -> Vec<(ExprId, &str)> {
        self.filter_named(|kind| match kind {
            NodeKind::Call { op, .. } => Some(op.as_str()),
            _ => None,
        })
    }

    pub fn outputs(&self) -> Option<&[ExprId]> {
        self.outputs.as_deref()
    }

    pub fn is_finalized(&self) -> bool {
        self.outputs.is_some()
    }

    pub fn to_text(&self) -> String {
        render(&self.nodes, self.outputs.as_deref())
    }

    pub fn into_network(self) -> BackendResult<RecordedNetwork> {
        let outputs = self
            .outputs
            .ok_or_else(|| BackendError::invalid("network has not been finalized"))?;
        Ok(RecordedNetwork {
            nodes: self.nodes,
            outputs,
        })
    }

    fn filter_named<'a>(
        &'a self,
        select: impl Fn(&'a NodeKind) -> Option<&'a str>,
    ) -> Vec<(ExprId, &'a str)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| select(&node.kind).map(|name| (ExprId(idx as u32), name)))
            .collect()
    }

    fn ensure_open(&self) -> BackendResult<()> {
        if self.is_finalized() {
            return Err(BackendError::invalid("network is already finalized"));
        }
        Ok(())
    }

    fn check_type(&self, ty: &TensorType) -> BackendResult<()> {
        if let Some(allowed) = &self.allowed_elems {
            if !allowed.contains(&ty.elem) {
                return Err(BackendError::unsupported(
                    format!("element type {}", ty.elem),
                    "not enabled for this builder",
                ));
            }
        }
        Ok(())
    }

    fn check_call(&self, op: &str, args: &[ExprId]) -> BackendResult<()> {
        if let Some(allowed) = &self.allowed_ops {
            if !allowed.contains(op) {
                return Err(BackendError::unsupported(
                    format!("call '{op}'"),
                    "not enabled for this builder",
                ));
            }
        }
        for arg in args {
            match self.node(*arg) {
                Some(Node {
                    ty: NodeType::Tensor(_),
                    ..
                }) => {}
                Some(_) => {
                    return Err(BackendError::invalid(format!(
                        "argument {arg} of '{op}' is a tuple"
                    )))
                }
                None => {
                    return Err(BackendError::invalid(format!(
                        "argument {arg} of '{op}' is not declared"
                    )))
                }
            }
        }
        Ok(())
    }

    fn push(&mut self, kind: NodeKind, ty: NodeType) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        trace!(id = %id, ty = %ty, "recorded node");
        self.nodes.push(Node { kind, ty });
        id
    }
}

impl NetworkBuilder for RecordingBuilder {
    type Expr = ExprId;

    fn declare_input(&mut self, name: &str, ty: &TensorType) -> BackendResult<ExprId> {
        self.ensure_open()?;
        self.check_type(ty)?;
        if !self.input_names.insert(name.to_string()) {
            return Err(BackendError::invalid(format!(
                "input '{name}' is declared twice"
            )));
        }
        Ok(self.push(
            NodeKind::Input {
                name: name.to_string(),
            },
            NodeType::Tensor(ty.clone()),
        ))
    }

    fn declare_constant(&mut self, name: &str, ty: &TensorType) -> BackendResult<ExprId> {
        self.ensure_open()?;
        self.check_type(ty)?;
        if ty.element_count().is_none() {
            return Err(BackendError::invalid(format!(
                "constant '{name}' has dynamic dimensions"
            )));
        }
        Ok(self.push(
            NodeKind::Constant {
                name: name.to_string(),
            },
            NodeType::Tensor(ty.clone()),
        ))
    }

    fn call(
        &mut self,
        op: &str,
        args: &[ExprId],
        attrs: Attrs,
        output: &TensorType,
    ) -> BackendResult<ExprId> {
        self.ensure_open()?;
        self.check_call(op, args)?;
        self.check_type(output)?;
        Ok(self.push(
            NodeKind::Call {
                op: op.to_string(),
                args: args.to_vec(),
                attrs,
            },
            NodeType::Tensor(output.clone()),
        ))
    }

    fn call_tuple(
        &mut self,
        op: &str,
        args: &[ExprId],
        attrs: Attrs,
        outputs: &[TensorType],
    ) -> BackendResult<ExprId> {
        self.ensure_open()?;
        self.check_call(op, args)?;
        for ty in outputs {
            self.check_type(ty)?;
        }
        Ok(self.push(
            NodeKind::Call {
                op: op.to_string(),
                args: args.to_vec(),
                attrs,
            },
            NodeType::Tuple(outputs.to_vec()),
        ))
    }

    fn tuple_get_item(
        &mut self,
        tuple: &ExprId,
        index: usize,
        ty: &TensorType,
    ) -> BackendResult<ExprId> {
        self.ensure_open()?;
        match self.node(*tuple).map(|node| &node.ty) {
            Some(NodeType::Tuple(types)) if types.get(index) == Some(ty) => {}
            Some(NodeType::Tuple(types)) => {
                return Err(BackendError::invalid(format!(
                    "tuple {tuple} has no element {index} of type {ty} ({} elements)",
                    types.len()
                )))
            }
            Some(NodeType::Tensor(_)) => {
                return Err(BackendError::invalid(format!("{tuple} is not a tuple")))
            }
            None => {
                return Err(BackendError::invalid(format!(
                    "tuple {tuple} is not declared"
                )))
            }
        }
        Ok(self.push(
            NodeKind::TupleItem {
                tuple: *tuple,
                index,
            },
            NodeType::Tensor(ty.clone()),
        ))
    }

    fn finalize(&mut self, outputs: &[ExprId]) -> BackendResult<()> {
        self.ensure_open()?;
        if let Some(missing) = outputs.iter().find(|id| self.node(**id).is_none()) {
            return Err(BackendError::invalid(format!(
                "output {missing} is not declared"
            )));
        }
        self.outputs = Some(outputs.to_vec());
        debug!(
            nodes = self.nodes.len(),
            outputs = outputs.len(),
            "recorded network finalized"
        );
        Ok(())
    }
}
