//! Model-to-network converter.
//!
//! A [`Converter`] walks one [`Model`](crate::hal::Model) and declares its inputs, constants
//! and operations into a backend [`NetworkBuilder`]. Each operand is translated at most
//! once: every declaration is recorded in the borrowed [`ExprMap`] and later references reuse
//! the recorded expression.

mod apply;
mod declare;
mod expr_map;

pub use expr_map::ExprMap;

use crate::backend::{NetworkBuilder, ParamTable};
use crate::config::ConverterConfig;
use crate::hal::OperandId;

pub struct Converter<'a, B: NetworkBuilder> {
    builder: &'a mut B,
    params: &'a mut ParamTable,
    exprs: &'a mut ExprMap<B::Expr>,
    config: ConverterConfig,
    // Only used to generate unique expression names.
    expr_index: u32,
}

impl<'a, B: NetworkBuilder> Converter<'a, B> {
    pub fn new(
        builder: &'a mut B,
        params: &'a mut ParamTable,
        exprs: &'a mut ExprMap<B::Expr>,
    ) -> Self {
        Self::with_config(builder, params, exprs, ConverterConfig::default())
    }

    pub fn with_config(
        builder: &'a mut B,
        params: &'a mut ParamTable,
        exprs: &'a mut ExprMap<B::Expr>,
        config: ConverterConfig,
    ) -> Self {
        Self {
            builder,
            params,
            exprs,
            config,
            expr_index: 0,
        }
    }

    pub fn builder(&mut self) -> &mut B {
        &mut *self.builder
    }

    pub fn params(&self) -> &ParamTable {
        &*self.params
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Returns `suffix` followed by this converter's next counter value.
    pub fn get_unique_name(&mut self, suffix: &str) -> String {
        let name = format!("{suffix}{}", self.expr_index);
        self.expr_index += 1;
        name
    }

    /// Current expression of `operand`, if it has been converted.
    pub fn get_mapped_expr(&self, operand: OperandId) -> Option<B::Expr> {
        self.exprs.latest(operand).cloned()
    }

    pub fn get_mapped_exprs(&self, operand: OperandId) -> Option<&[B::Expr]> {
        self.exprs.get(operand)
    }

    /// Appends `expr` to the sequence of `operand` and hands it back.
    pub fn update_expr_map(&mut self, operand: OperandId, expr: B::Expr) -> B::Expr {
        self.exprs.push(operand, expr.clone());
        expr
    }
}
