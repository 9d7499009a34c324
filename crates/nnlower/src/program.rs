use tracing::info;

use crate::backend::{NetworkBuilder, ParamTable};
use crate::config::ConverterConfig;
use crate::converter::{Converter, ExprMap};
use crate::error::{ConvertError, ConvertResult};
use crate::hal::Model;

/// Expressions standing for the model's inputs and outputs, in model order.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkBinding<E> {
    pub inputs: Vec<E>,
    pub outputs: Vec<E>,
}

/// Lowers `model` into `builder` and finalizes the network on the model outputs.
///
/// Model inputs that no operation reads are still declared so the network keeps the
/// model's full input signature.
pub fn build_network<B: NetworkBuilder>(
    model: &Model,
    builder: &mut B,
    params: &mut ParamTable,
    config: ConverterConfig,
) -> ConvertResult<NetworkBinding<B::Expr>> {
    let mut exprs = ExprMap::new();
    let mut converter = Converter::with_config(builder, params, &mut exprs, config);
    converter.apply(model)?;

    let mut inputs = Vec::with_capacity(model.input_indexes.len());
    for &id in &model.input_indexes {
        inputs.push(converter.convert_operand(model, id, None, None)?);
    }
    let mut outputs = Vec::with_capacity(model.output_indexes.len());
    for &id in &model.output_indexes {
        let expr = converter
            .get_mapped_expr(id)
            .ok_or_else(|| ConvertError::invalid_operand(id, "model output is never produced"))?;
        outputs.push(expr);
    }
    converter.builder().finalize(&outputs)?;
    info!(
        inputs = inputs.len(),
        outputs = outputs.len(),
        "network finalized"
    );
    Ok(NetworkBinding { inputs, outputs })
}

/// [`build_network`] with [`ConverterConfig::from_env`].
pub fn build_network_from_env<B: NetworkBuilder>(
    model: &Model,
    builder: &mut B,
    params: &mut ParamTable,
) -> ConvertResult<NetworkBinding<B::Expr>> {
    build_network(model, builder, params, ConverterConfig::from_env())
}
