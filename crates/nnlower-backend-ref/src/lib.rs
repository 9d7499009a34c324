//! Reference backend for `nnlower`: a [`RecordingBuilder`] whose expressions are node ids.
//!
//! Nothing is compiled or executed; the recorded network can be inspected, rendered as text
//! or hashed, which is what conversion tests need.

mod builder;
mod network;

pub use builder::RecordingBuilder;
pub use network::{ExprId, Node, NodeKind, NodeType, RecordedNetwork};
