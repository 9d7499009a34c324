//! Lowering of hardware-neutral model graphs into backend expression networks.
//!
//! [`hal`] describes the source model, [`backend`] the target builder boundary, and
//! [`converter::Converter`] walks one model into one builder. [`program::build_network`]
//! wraps a full conversion pass including network finalization.

pub mod backend;
pub mod config;
pub mod converter;
pub mod error;
pub mod hal;
pub mod legality;
pub mod lowering;
pub mod program;
pub mod topology;
pub mod utility;

pub use backend::{NetworkBuilder, ParamTable};
pub use config::ConverterConfig;
pub use converter::{Converter, ExprMap};
pub use error::{ConvertError, ConvertResult, Status};
pub use program::{build_network, build_network_from_env, NetworkBinding};
