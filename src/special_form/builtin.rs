//! Special forms shipped with the crate.

use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef, AsArray, BooleanArray};
use arrow::compute::kernels::boolean::{and_kleene, or_kleene};
use arrow::compute::kernels::zip::zip;
use arrow::compute::{is_not_null, prep_null_mask_filter};
use arrow::datatypes::Decimal128Type;
use tracing::debug;

use crate::config::QueryConfig;
use crate::error::{ExecError, Result};
use crate::expr::{CostTracker, Expr, ExprPtr, ExprStats, TypedInput};
use crate::types::{DataType, Value, MAX_DECIMAL_PRECISION};
use crate::vector::{RowBatch, Vector, VectorRef};

use super::{SpecialForm, SpecialFormRegistryBuilder};

/// Registers every built-in form as `{prefix}{name}`.
///
/// # Errors
///
/// Returns `Registry` if a name is taken and `overwrite` is false.
pub fn register_builtin_special_forms(
    builder: &mut SpecialFormRegistryBuilder,
    prefix: &str,
    overwrite: bool,
) -> Result<()> {
    let forms: [(&str, Arc<dyn SpecialForm>); 6] = [
        ("and", Arc::new(AndForm)),
        ("or", Arc::new(OrForm)),
        ("if", Arc::new(IfForm)),
        ("coalesce", Arc::new(CoalesceForm)),
        ("try", Arc::new(TryForm)),
        ("decimal_round", Arc::new(DecimalRoundForm)),
    ];
    for (name, form) in forms {
        builder.register(format!("{prefix}{name}"), form, overwrite)?;
    }
    Ok(())
}

fn to_boolean(vector: &VectorRef, context: &str) -> Result<BooleanArray> {
    let array = vector.to_array()?;
    array
        .as_boolean_opt()
        .cloned()
        .ok_or_else(|| ExecError::ExecutionError(format!("{context} operand must be boolean")))
}

fn flat(array: ArrayRef) -> Result<VectorRef> {
    Ok(Arc::new(Vector::from_array(array)?))
}

fn check_all_bool(name: &str, arg_types: &[DataType]) -> Result<()> {
    if arg_types.len() < 2 {
        return Err(ExecError::type_resolution(
            name,
            format!("expected at least 2 arguments, got {}", arg_types.len()),
        ));
    }
    if let Some(bad) = arg_types.iter().find(|t| **t != DataType::Bool) {
        return Err(ExecError::type_resolution(
            name,
            format!("expected BOOL arguments, got {bad}"),
        ));
    }
    Ok(())
}

// ============================================================================
// AND / OR
// ============================================================================

/// Short-circuit conjunction.
#[derive(Debug, Clone, Copy)]
pub struct AndForm;

/// Short-circuit disjunction.
#[derive(Debug, Clone, Copy)]
pub struct OrForm;

impl SpecialForm for AndForm {
    fn resolve_type(&self, arg_types: &[DataType]) -> Result<Option<DataType>> {
        check_all_bool("and", arg_types)?;
        Ok(Some(DataType::Bool))
    }

    fn construct(
        &self,
        _data_type: DataType,
        children: Vec<ExprPtr>,
        track_cpu_usage: bool,
        _config: &QueryConfig,
    ) -> ExprPtr {
        Box::new(ConjunctExpr::new(true, children, track_cpu_usage))
    }
}

impl SpecialForm for OrForm {
    fn resolve_type(&self, arg_types: &[DataType]) -> Result<Option<DataType>> {
        check_all_bool("or", arg_types)?;
        Ok(Some(DataType::Bool))
    }

    fn construct(
        &self,
        _data_type: DataType,
        children: Vec<ExprPtr>,
        track_cpu_usage: bool,
        _config: &QueryConfig,
    ) -> ExprPtr {
        Box::new(ConjunctExpr::new(false, children, track_cpu_usage))
    }
}

/// AND/OR with three-valued logic.
///
/// Stops evaluating operands once every row is decided: all false for AND,
/// all true for OR.
#[derive(Debug)]
struct ConjunctExpr {
    is_and: bool,
    children: Vec<ExprPtr>,
    tracker: CostTracker,
}

impl ConjunctExpr {
    fn new(is_and: bool, children: Vec<ExprPtr>, track_cpu_usage: bool) -> Self {
        ConjunctExpr {
            is_and,
            children,
            tracker: CostTracker::new(track_cpu_usage),
        }
    }

    fn decided(&self, acc: &BooleanArray) -> bool {
        if acc.null_count() > 0 {
            return false;
        }
        if self.is_and {
            acc.true_count() == 0
        } else {
            acc.true_count() == acc.len()
        }
    }
}

impl Expr for ConjunctExpr {
    fn name(&self) -> &str {
        if self.is_and {
            "and"
        } else {
            "or"
        }
    }

    fn data_type(&self) -> DataType {
        DataType::Bool
    }

    fn eval(&self, batch: &RowBatch) -> Result<VectorRef> {
        self.tracker.track(|| -> Result<VectorRef> {
            let mut acc: Option<BooleanArray> = None;
            for child in &self.children {
                let values = to_boolean(&child.eval(batch)?, self.name())?;
                let next = match acc {
                    None => values,
                    Some(prev) if self.is_and => and_kleene(&prev, &values)?,
                    Some(prev) => or_kleene(&prev, &values)?,
                };
                let done = self.decided(&next);
                acc = Some(next);
                if done {
                    break;
                }
            }
            let acc =
                acc.unwrap_or_else(|| BooleanArray::from(vec![self.is_and; batch.num_rows()]));
            flat(Arc::new(acc))
        })
    }

    fn stats(&self) -> Option<ExprStats> {
        self.tracker.stats()
    }
}

// ============================================================================
// IF
// ============================================================================

/// `if(cond, then[, else])` with lazily evaluated branches.
#[derive(Debug, Clone, Copy)]
pub struct IfForm;

impl SpecialForm for IfForm {
    fn resolve_type(&self, arg_types: &[DataType]) -> Result<Option<DataType>> {
        match arg_types {
            [DataType::Bool, then] => Ok(Some(*then)),
            [DataType::Bool, then, otherwise] if then == otherwise => Ok(Some(*then)),
            [DataType::Bool, then, otherwise] => Err(ExecError::type_resolution(
                "if",
                format!("branches differ: {then} vs {otherwise}"),
            )),
            [cond, ..] if arg_types.len() <= 3 && *cond != DataType::Bool => Err(
                ExecError::type_resolution("if", format!("condition must be BOOL, got {cond}")),
            ),
            _ => Err(ExecError::type_resolution(
                "if",
                format!("expected 2 or 3 arguments, got {}", arg_types.len()),
            )),
        }
    }

    fn construct(
        &self,
        data_type: DataType,
        children: Vec<ExprPtr>,
        track_cpu_usage: bool,
        _config: &QueryConfig,
    ) -> ExprPtr {
        let mut children = children.into_iter();
        let (Some(condition), Some(then_branch)) = (children.next(), children.next()) else {
            // Resolution admits only 2 or 3 children.
            return Box::new(NullExpr::new("if", data_type));
        };
        Box::new(IfExpr {
            condition,
            then_branch,
            else_branch: children.next(),
            data_type,
            tracker: CostTracker::new(track_cpu_usage),
        })
    }
}

#[derive(Debug)]
struct IfExpr {
    condition: ExprPtr,
    then_branch: ExprPtr,
    else_branch: Option<ExprPtr>,
    data_type: DataType,
    tracker: CostTracker,
}

impl Expr for IfExpr {
    fn name(&self) -> &str {
        "if"
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn eval(&self, batch: &RowBatch) -> Result<VectorRef> {
        self.tracker.track(|| -> Result<VectorRef> {
            let rows = batch.num_rows();
            let mut mask = to_boolean(&self.condition.eval(batch)?, "if")?;
            if mask.null_count() > 0 {
                mask = prep_null_mask_filter(&mask);
            }
            let selected = mask.true_count();

            if selected == rows {
                return self.then_branch.eval(batch);
            }
            let otherwise = match &self.else_branch {
                Some(branch) => branch.eval(batch)?,
                None => Arc::new(Vector::null_constant(self.data_type, rows)),
            };
            if selected == 0 {
                return Ok(otherwise);
            }

            let then = self.then_branch.eval(batch)?.to_array()?;
            flat(zip(&mask, &then, &otherwise.to_array()?)?)
        })
    }

    fn stats(&self) -> Option<ExprStats> {
        self.tracker.stats()
    }
}

// ============================================================================
// COALESCE
// ============================================================================

/// First non-null argument, evaluated left to right.
#[derive(Debug, Clone, Copy)]
pub struct CoalesceForm;

impl SpecialForm for CoalesceForm {
    fn resolve_type(&self, arg_types: &[DataType]) -> Result<Option<DataType>> {
        let Some(first) = arg_types.first() else {
            return Err(ExecError::type_resolution(
                "coalesce",
                "expected at least 1 argument",
            ));
        };
        if let Some(bad) = arg_types.iter().find(|t| *t != first) {
            return Err(ExecError::type_resolution(
                "coalesce",
                format!("arguments must share one type: {first} vs {bad}"),
            ));
        }
        Ok(Some(*first))
    }

    fn construct(
        &self,
        data_type: DataType,
        children: Vec<ExprPtr>,
        track_cpu_usage: bool,
        _config: &QueryConfig,
    ) -> ExprPtr {
        Box::new(CoalesceExpr {
            children,
            data_type,
            tracker: CostTracker::new(track_cpu_usage),
        })
    }
}

#[derive(Debug)]
struct CoalesceExpr {
    children: Vec<ExprPtr>,
    data_type: DataType,
    tracker: CostTracker,
}

impl Expr for CoalesceExpr {
    fn name(&self) -> &str {
        "coalesce"
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn eval(&self, batch: &RowBatch) -> Result<VectorRef> {
        self.tracker.track(|| -> Result<VectorRef> {
            let mut children = self.children.iter();
            let mut acc: ArrayRef = match children.next() {
                Some(first) => first.eval(batch)?.to_array()?,
                None => new_null_array(&self.data_type.to_arrow(), batch.num_rows()),
            };
            for child in children {
                if acc.null_count() == 0 {
                    break;
                }
                let next = child.eval(batch)?.to_array()?;
                acc = zip(&is_not_null(acc.as_ref())?, &acc, &next)?;
            }
            flat(acc)
        })
    }

    fn stats(&self) -> Option<ExprStats> {
        self.tracker.stats()
    }
}

// ============================================================================
// TRY
// ============================================================================

/// Evaluates its argument, turning an evaluation error into nulls.
#[derive(Debug, Clone, Copy)]
pub struct TryForm;

impl SpecialForm for TryForm {
    fn resolve_type(&self, arg_types: &[DataType]) -> Result<Option<DataType>> {
        match arg_types {
            [inner] => Ok(Some(*inner)),
            _ => Err(ExecError::type_resolution(
                "try",
                format!("expected 1 argument, got {}", arg_types.len()),
            )),
        }
    }

    fn construct(
        &self,
        data_type: DataType,
        children: Vec<ExprPtr>,
        track_cpu_usage: bool,
        _config: &QueryConfig,
    ) -> ExprPtr {
        match children.into_iter().next() {
            Some(child) => Box::new(TryExpr {
                child,
                data_type,
                tracker: CostTracker::new(track_cpu_usage),
            }),
            None => Box::new(NullExpr::new("try", data_type)),
        }
    }
}

#[derive(Debug)]
struct TryExpr {
    child: ExprPtr,
    data_type: DataType,
    tracker: CostTracker,
}

impl Expr for TryExpr {
    fn name(&self) -> &str {
        "try"
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn eval(&self, batch: &RowBatch) -> Result<VectorRef> {
        self.tracker.track(|| match self.child.eval(batch) {
            Ok(vector) => Ok(vector),
            Err(err) => {
                debug!(error = %err, "try suppressed evaluation error");
                Ok(Arc::new(Vector::null_constant(self.data_type, batch.num_rows())))
            }
        })
    }

    fn stats(&self) -> Option<ExprStats> {
        self.tracker.stats()
    }
}

// ============================================================================
// DECIMAL_ROUND
// ============================================================================

/// `decimal_round(x DECIMAL(p,s)[, r INT64 literal])`, rounding half away
/// from zero to `r` fractional digits.
///
/// The result type depends on the value of `r`, so the two-argument form
/// resolves only through the argument expressions.
#[derive(Debug, Clone, Copy)]
pub struct DecimalRoundForm;

/// Result type of rounding `DECIMAL(precision, scale)` to `round_scale` digits.
#[must_use]
pub fn decimal_round_type(precision: u8, scale: i8, round_scale: i64) -> DataType {
    let scale = i64::from(scale.max(0));
    let new_scale = round_scale.clamp(0, scale);
    let new_precision = (i64::from(precision) - scale + new_scale + 1)
        .clamp(1, i64::from(MAX_DECIMAL_PRECISION));
    DataType::Decimal {
        precision: new_precision as u8,
        scale: new_scale as i8,
    }
}

impl DecimalRoundForm {
    fn decimal_input(arg_types: &[DataType]) -> Result<(u8, i8)> {
        match arg_types {
            [DataType::Decimal { scale, .. }, ..] if *scale < 0 => Err(ExecError::type_resolution(
                "decimal_round",
                format!("input scale must not be negative, got {scale}"),
            )),
            [DataType::Decimal { precision, scale }] => Ok((*precision, *scale)),
            [DataType::Decimal { precision, scale }, DataType::Int64] => Ok((*precision, *scale)),
            [DataType::Decimal { .. }, other] => Err(ExecError::type_resolution(
                "decimal_round",
                format!("scale must be INT64, got {other}"),
            )),
            [first, ..] if arg_types.len() <= 2 => Err(ExecError::type_resolution(
                "decimal_round",
                format!("expected a DECIMAL argument, got {first}"),
            )),
            _ => Err(ExecError::type_resolution(
                "decimal_round",
                format!("expected 1 or 2 arguments, got {}", arg_types.len()),
            )),
        }
    }
}

impl SpecialForm for DecimalRoundForm {
    fn resolve_type(&self, arg_types: &[DataType]) -> Result<Option<DataType>> {
        let (precision, scale) = Self::decimal_input(arg_types)?;
        if arg_types.len() == 1 {
            return Ok(Some(decimal_round_type(precision, scale, 0)));
        }
        Ok(None)
    }

    fn resolve_type_from_inputs(&self, inputs: &[TypedInput<'_>]) -> Result<Option<DataType>> {
        let arg_types = inputs.iter().map(|i| i.data_type).collect::<Vec<_>>();
        let (precision, scale) = Self::decimal_input(&arg_types)?;
        let round_scale = match inputs.get(1) {
            None => 0,
            Some(input) => match input.constant_value() {
                Some(Value::Int64(r)) => *r,
                _ => {
                    return Err(ExecError::type_resolution(
                        "decimal_round",
                        format!("scale must be a non-null INT64 literal, got {}", input.expr),
                    ))
                }
            },
        };
        Ok(Some(decimal_round_type(precision, scale, round_scale)))
    }

    fn construct(
        &self,
        data_type: DataType,
        children: Vec<ExprPtr>,
        track_cpu_usage: bool,
        _config: &QueryConfig,
    ) -> ExprPtr {
        let mut children = children.into_iter();
        let Some(child) = children.next() else {
            return Box::new(NullExpr::new("decimal_round", data_type));
        };
        let scale_arg = children.next();
        let round_scale = match scale_arg.as_ref().and_then(|arg| arg.constant_value()) {
            Some(Value::Int64(r)) => *r,
            // The result scale equals the rounding scale whenever it is non-negative.
            _ => match data_type {
                DataType::Decimal { scale, .. } => i64::from(scale),
                _ => 0,
            },
        };
        Box::new(DecimalRoundExpr {
            child,
            round_scale,
            data_type,
            tracker: CostTracker::new(track_cpu_usage),
        })
    }
}

/// Rounds an unscaled decimal from `from_scale` to `round_scale` digits and
/// returns it at the result scale `clamp(round_scale, 0, from_scale)`.
fn round_unscaled(value: i128, from_scale: i8, round_scale: i64) -> Option<i128> {
    let from_scale = i64::from(from_scale);
    if round_scale >= from_scale {
        return Some(value);
    }
    // Dropping more digits than an i128 holds leaves nothing to round up.
    let dropped = from_scale.saturating_sub(round_scale);
    if dropped > i64::from(MAX_DECIMAL_PRECISION) {
        return Some(0);
    }
    let divisor = 10_i128.pow(dropped as u32);
    let quotient = value / divisor;
    let remainder = (value % divisor).abs();
    let rounded = if remainder >= divisor - remainder {
        quotient + value.signum()
    } else {
        quotient
    };
    if round_scale >= 0 {
        Some(rounded)
    } else {
        rounded.checked_mul(10_i128.checked_pow((-round_scale) as u32)?)
    }
}

#[derive(Debug)]
struct DecimalRoundExpr {
    child: ExprPtr,
    round_scale: i64,
    data_type: DataType,
    tracker: CostTracker,
}

impl Expr for DecimalRoundExpr {
    fn name(&self) -> &str {
        "decimal_round"
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn eval(&self, batch: &RowBatch) -> Result<VectorRef> {
        self.tracker.track(|| -> Result<VectorRef> {
            let DataType::Decimal { precision, scale } = self.data_type else {
                return Err(ExecError::ExecutionError(format!(
                    "decimal_round cannot produce {}",
                    self.data_type
                )));
            };
            let array = self.child.eval(batch)?.to_array()?;
            let input = array.as_primitive_opt::<Decimal128Type>().ok_or_else(|| {
                ExecError::ExecutionError("decimal_round operand must be DECIMAL".to_string())
            })?;
            let from_scale = input.scale();
            let round_scale = self.round_scale;
            let rounded = input
                .unary_opt::<_, Decimal128Type>(|v| round_unscaled(v, from_scale, round_scale))
                .with_precision_and_scale(precision, scale)?;
            flat(Arc::new(rounded))
        })
    }

    fn stats(&self) -> Option<ExprStats> {
        self.tracker.stats()
    }
}

/// All-null result, used only when a form is constructed without the
/// children its resolution required.
#[derive(Debug)]
struct NullExpr {
    name: &'static str,
    data_type: DataType,
}

impl NullExpr {
    fn new(name: &'static str, data_type: DataType) -> Self {
        NullExpr { name, data_type }
    }
}

impl Expr for NullExpr {
    fn name(&self) -> &str {
        self.name
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn eval(&self, batch: &RowBatch) -> Result<VectorRef> {
        Ok(Arc::new(Vector::null_constant(self.data_type, batch.num_rows())))
    }
}
