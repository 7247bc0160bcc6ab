//! Two-phase expression compilation.
//!
//! Phase one walks the whole [`TypedExpr`] tree and resolves the type of every
//! node. Phase two constructs executable nodes bottom-up. No node is built
//! until every type in the tree is known, so special-form construction never
//! observes a partially resolved tree.

use std::sync::Arc;

use arrow::datatypes::Schema;
use tracing::debug;

use crate::config::QueryConfig;
use crate::error::{ExecError, Result};
use crate::memory::MemoryPool;
use crate::special_form::SpecialFormRegistry;
use crate::types::{DataType, Value};

use super::functions::{FunctionCatalog, ScalarFunction};
use super::nodes::{CallExpr, ConstantExpr, FieldReference};
use super::{ExprPtr, TypedExpr, TypedInput};

/// Type-resolved mirror of a [`TypedExpr`].
enum Resolved {
    Field {
        name: String,
        index: usize,
        data_type: DataType,
    },
    Constant {
        value: Value,
        data_type: DataType,
    },
    SpecialForm {
        name: String,
        data_type: DataType,
        args: Vec<Resolved>,
    },
    Function {
        function: Arc<dyn ScalarFunction>,
        data_type: DataType,
        args: Vec<Resolved>,
    },
}

impl Resolved {
    fn data_type(&self) -> DataType {
        match self {
            Resolved::Field { data_type, .. }
            | Resolved::Constant { data_type, .. }
            | Resolved::SpecialForm { data_type, .. }
            | Resolved::Function { data_type, .. } => *data_type,
        }
    }
}

/// Compiles typed expressions against an input schema.
///
/// Calls are dispatched to the special-form registry first; only names it
/// does not know reach the function catalog.
pub struct ExprCompiler<'a> {
    special_forms: &'a SpecialFormRegistry,
    functions: &'a dyn FunctionCatalog,
    config: &'a QueryConfig,
    pool: Arc<MemoryPool>,
}

impl<'a> ExprCompiler<'a> {
    #[must_use]
    pub fn new(
        special_forms: &'a SpecialFormRegistry,
        functions: &'a dyn FunctionCatalog,
        config: &'a QueryConfig,
        pool: Arc<MemoryPool>,
    ) -> Self {
        ExprCompiler {
            special_forms,
            functions,
            config,
            pool,
        }
    }

    /// Resolves the result type of `expr` without building anything.
    ///
    /// # Errors
    ///
    /// See [`ExprCompiler::compile`].
    pub fn resolve_type(&self, expr: &TypedExpr, schema: &Schema) -> Result<DataType> {
        Ok(self.resolve(expr, schema)?.data_type())
    }

    /// Compiles `expr` into an executable node.
    ///
    /// # Errors
    ///
    /// - `Validation` if a field name is not in `schema`
    /// - `SchemaError` if a field's declared type disagrees with `schema`
    /// - `TypeResolution` if a special form or function rejects its arguments
    /// - `UnknownFunction` if a call names neither a special form nor a function
    pub fn compile(&self, expr: &TypedExpr, schema: &Schema) -> Result<ExprPtr> {
        let resolved = self.resolve(expr, schema)?;
        debug!(expr = %expr, data_type = %resolved.data_type(), "compiled expression");
        self.construct(resolved)
    }

    /// Compiles every expression; fails on the first error.
    ///
    /// # Errors
    ///
    /// See [`ExprCompiler::compile`].
    pub fn compile_all(&self, exprs: &[TypedExpr], schema: &Schema) -> Result<Vec<ExprPtr>> {
        exprs.iter().map(|expr| self.compile(expr, schema)).collect()
    }

    fn resolve(&self, expr: &TypedExpr, schema: &Schema) -> Result<Resolved> {
        match expr {
            TypedExpr::Field { name, data_type } => {
                let index = schema.index_of(name).map_err(|_| {
                    ExecError::Validation(format!("field '{name}' not found in input schema"))
                })?;
                let actual = DataType::from_arrow(schema.field(index).data_type());
                if actual != Some(*data_type) {
                    return Err(ExecError::SchemaError(format!(
                        "field '{name}' is declared {data_type} but the input has {}",
                        schema.field(index).data_type()
                    )));
                }
                Ok(Resolved::Field {
                    name: name.clone(),
                    index,
                    data_type: *data_type,
                })
            }
            TypedExpr::Constant { value, data_type } => {
                if !value.is_null() && value.data_type() != Some(*data_type) {
                    return Err(ExecError::SchemaError(format!(
                        "constant {value} is not a {data_type}"
                    )));
                }
                Ok(Resolved::Constant {
                    value: value.clone(),
                    data_type: *data_type,
                })
            }
            TypedExpr::Call { name, args } => {
                let resolved = args
                    .iter()
                    .map(|arg| self.resolve(arg, schema))
                    .collect::<Result<Vec<_>>>()?;
                let arg_types = resolved.iter().map(Resolved::data_type).collect::<Vec<_>>();

                if self.special_forms.is_registered(name) {
                    let data_type = self.resolve_special_form(name, args, &arg_types)?;
                    return Ok(Resolved::SpecialForm {
                        name: name.clone(),
                        data_type,
                        args: resolved,
                    });
                }

                let function = self
                    .functions
                    .get(name)
                    .ok_or_else(|| ExecError::UnknownFunction(name.clone()))?;
                let data_type = function.return_type(&arg_types)?;
                Ok(Resolved::Function {
                    function,
                    data_type,
                    args: resolved,
                })
            }
        }
    }

    fn resolve_special_form(
        &self,
        name: &str,
        args: &[TypedExpr],
        arg_types: &[DataType],
    ) -> Result<DataType> {
        if let Some(data_type) = self.special_forms.resolve_type(name, arg_types)? {
            return Ok(data_type);
        }
        let inputs = args
            .iter()
            .zip(arg_types)
            .map(|(expr, data_type)| TypedInput {
                expr,
                data_type: *data_type,
            })
            .collect::<Vec<_>>();
        self.special_forms
            .resolve_type_from_inputs(name, &inputs)?
            .ok_or_else(|| {
                ExecError::type_resolution(name, "result type cannot be resolved from arguments")
            })
    }

    fn construct(&self, resolved: Resolved) -> Result<ExprPtr> {
        let track_cpu_usage = self.config.track_expression_cpu_usage;
        match resolved {
            Resolved::Field {
                name,
                index,
                data_type,
            } => Ok(Box::new(FieldReference::new(name, index, data_type))),
            Resolved::Constant { value, data_type } => Ok(Box::new(ConstantExpr::new(
                value,
                data_type,
                Arc::clone(&self.pool),
            ))),
            Resolved::SpecialForm {
                name,
                data_type,
                args,
            } => {
                let children = self.construct_all(args)?;
                self.special_forms
                    .construct(&name, data_type, children, track_cpu_usage, self.config)
                    .ok_or(ExecError::UnknownFunction(name))
            }
            Resolved::Function {
                function,
                data_type,
                args,
            } => {
                let children = self.construct_all(args)?;
                Ok(Box::new(CallExpr::new(
                    function,
                    children,
                    data_type,
                    track_cpu_usage,
                )))
            }
        }
    }

    fn construct_all(&self, args: Vec<Resolved>) -> Result<Vec<ExprPtr>> {
        args.into_iter().map(|arg| self.construct(arg)).collect()
    }
}
