use tracing::{debug, info, warn};

use super::Converter;
use crate::backend::NetworkBuilder;
use crate::error::{ConvertError, ConvertResult};
use crate::hal::Model;
use crate::legality::{check_model_legality, LegalitySpec};
use crate::lowering::lower_operation;
use crate::topology::sort_operations_in_topological_order;

impl<'a, B: NetworkBuilder> Converter<'a, B> {
    /// Lowers every operation of `model` into the builder.
    ///
    /// The model is checked up front, so an unsupported operation or precision fails before
    /// anything is declared. Operations run in dependency order; each one finds its inputs
    /// either already mapped or converts them as constants/model inputs. On error the
    /// builder keeps whatever was declared so far and should be discarded.
    pub fn apply(&mut self, model: &Model) -> ConvertResult<()> {
        let legality = LegalitySpec::lowerable().with_dynamic_dims(self.config.allow_dynamic_dims);
        if let Err(report) = check_model_legality(model, &legality) {
            warn!(report = %report, "model rejected before lowering");
            return Err(ConvertError::Illegal(report));
        }
        let order = sort_operations_in_topological_order(model)?;
        info!(
            operations = order.len(),
            operands = model.operands.len(),
            "lowering model"
        );

        for op_idx in order {
            let operation = &model.operations[op_idx];
            debug!(index = op_idx, kind = ?operation.kind, "lowering operation");
            lower_operation(self, model, operation)?;
            for &output in &operation.outputs {
                if self.get_mapped_exprs(output).is_none() {
                    return Err(ConvertError::invalid_operand(
                        output,
                        format!("operation {op_idx} left its output without an expression"),
                    ));
                }
            }
        }

        info!(
            mapped_operands = self.exprs.len(),
            params = self.params.len(),
            "model lowered"
        );
        Ok(())
    }
}
