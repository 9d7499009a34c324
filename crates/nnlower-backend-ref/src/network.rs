use std::fmt::{self, Write as _};

use nnlower::backend::{AttrValue, Attrs, TensorType};
use serde::{Deserialize, Serialize};

/// Handle of a recorded node: its position in [`RecordedNetwork::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Input {
        name: String,
    },
    Constant {
        name: String,
    },
    Call {
        op: String,
        args: Vec<ExprId>,
        attrs: Attrs,
    },
    TupleItem {
        tuple: ExprId,
        index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeType {
    Tensor(TensorType),
    Tuple(Vec<TensorType>),
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Tensor(ty) => write!(f, "{ty}"),
            NodeType::Tuple(types) => {
                f.write_str("(")?;
                for (idx, ty) in types.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub ty: NodeType,
}

/// Finalized network recorded by [`crate::RecordingBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedNetwork {
    pub nodes: Vec<Node>,
    pub outputs: Vec<ExprId>,
}

impl RecordedNetwork {
    pub fn input_names(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter_map(|node| match &node.kind {
                NodeKind::Input { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Stable hash of the recorded graph, independent of the process that built it.
    pub fn digest(&self) -> u64 {
        let bytes = bincode::serialize(self).unwrap_or_default();
        fnv_hash(&bytes)
    }

    pub fn to_text(&self) -> String {
        render(&self.nodes, Some(&self.outputs))
    }
}

pub(crate) fn render(nodes: &[Node], outputs: Option<&[ExprId]>) -> String {
    let mut out = String::new();
    for (idx, node) in nodes.iter().enumerate() {
        let id = ExprId(idx as u32);
        let _ = match &node.kind {
            NodeKind::Input { name } => writeln!(out, "{id} = input \"{name}\" : {}", node.ty),
            NodeKind::Constant { name } => {
                writeln!(out, "{id} = constant \"{name}\" : {}", node.ty)
            }
            NodeKind::Call { op, args, attrs } => writeln!(
                out,
                "{id} = {op}({}){} : {}",
                join_ids(args),
                render_attrs(attrs),
                node.ty
            ),
            NodeKind::TupleItem { tuple, index } => {
                writeln!(out, "{id} = {tuple}.{index} : {}", node.ty)
            }
        };
    }
    if let Some(outputs) = outputs {
        let _ = writeln!(out, "return {}", join_ids(outputs));
    }
    out
}

fn join_ids(ids: &[ExprId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_attrs(attrs: &Attrs) -> String {
    if attrs.is_empty() {
        return String::new();
    }
    let body = attrs
        .iter()
        .map(|(key, value)| format!("{key} = {}", render_attr(value)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(" {{{body}}}")
}

fn render_attr(value: &AttrValue) -> String {
    match value {
        AttrValue::Int(v) => v.to_string(),
        AttrValue::Ints(values) => format!(
            "[{}]",
            values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        AttrValue::Float(v) => format!("{v:?}"),
        AttrValue::Bool(v) => v.to_string(),
        AttrValue::Str(v) => format!("\"{v}\""),
    }
}

fn fnv_hash(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
