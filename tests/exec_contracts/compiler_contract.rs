//! Contract tests for expression compilation and evaluation.

use std::sync::Arc;

use colexec::vector::batch::schema_of;
use colexec::{
    DataType, ExecError, ExprCompiler, ExprPtr, FunctionRegistry, MemoryPool, QueryConfig,
    RowBatch, SpecialFormRegistry, TypedExpr, Value,
};

use super::int_batch;

fn compile(expr: &TypedExpr, config: &QueryConfig) -> colexec::Result<ExprPtr> {
    let forms = SpecialFormRegistry::with_builtins()?;
    let functions = FunctionRegistry::with_builtins();
    let compiler = ExprCompiler::new(&forms, &functions, config, Arc::new(MemoryPool::new("t")));
    compiler.compile(expr, &schema_of(&[("a", DataType::Int64), ("b", DataType::Int64)]))
}

fn column(expr: &ExprPtr, batch: &RowBatch) -> Vec<Value> {
    let vector = expr.eval(batch).unwrap();
    (0..batch.num_rows())
        .map(|row| vector.value_at(row).unwrap())
        .collect()
}

fn a() -> TypedExpr {
    TypedExpr::field("a", DataType::Int64)
}

fn b() -> TypedExpr {
    TypedExpr::field("b", DataType::Int64)
}

fn int(v: i64) -> TypedExpr {
    TypedExpr::literal(Value::Int64(v))
}

#[test]
fn test_field_reference_is_zero_copy() {
    let batch = int_batch(vec![("a", vec![1, 2]), ("b", vec![3, 4])]);
    let expr = compile(&b(), &QueryConfig::new()).unwrap();
    let out = expr.eval(&batch).unwrap();
    assert!(Arc::ptr_eq(&out, batch.column(1)));
}

#[test]
fn test_and_with_comparisons() {
    // a > 1 AND a < 4
    let expr = TypedExpr::call(
        "and",
        vec![
            TypedExpr::call("gt", vec![a(), int(1)]),
            TypedExpr::call("lt", vec![a(), int(4)]),
        ],
    );
    let compiled = compile(&expr, &QueryConfig::new()).unwrap();
    assert_eq!(compiled.data_type(), DataType::Bool);

    let batch = int_batch(vec![("a", vec![0, 2, 3, 5]), ("b", vec![0; 4])]);
    assert_eq!(
        column(&compiled, &batch),
        vec![
            Value::Bool(false),
            Value::Bool(true),
            Value::Bool(true),
            Value::Bool(false)
        ]
    );
}

#[test]
fn test_or_with_null_operand() {
    // NULL OR a = 1 is true where a = 1, null elsewhere
    let expr = TypedExpr::call(
        "or",
        vec![
            TypedExpr::null(DataType::Bool),
            TypedExpr::call("eq", vec![a(), int(1)]),
        ],
    );
    let compiled = compile(&expr, &QueryConfig::new()).unwrap();
    let batch = int_batch(vec![("a", vec![1, 2]), ("b", vec![0, 0])]);
    assert_eq!(column(&compiled, &batch), vec![Value::Bool(true), Value::Null]);
}

#[test]
fn test_if_picks_branch_per_row() {
    let expr = TypedExpr::call(
        "if",
        vec![TypedExpr::call("gt", vec![a(), b()]), a(), b()],
    );
    let compiled = compile(&expr, &QueryConfig::new()).unwrap();
    let batch = int_batch(vec![("a", vec![5, 1, 7]), ("b", vec![2, 3, 9])]);
    assert_eq!(
        column(&compiled, &batch),
        vec![Value::Int64(5), Value::Int64(3), Value::Int64(9)]
    );
}

#[test]
fn test_if_without_else_yields_null() {
    let expr = TypedExpr::call("if", vec![TypedExpr::call("gt", vec![a(), int(1)]), a()]);
    let compiled = compile(&expr, &QueryConfig::new()).unwrap();
    let batch = int_batch(vec![("a", vec![1, 2]), ("b", vec![0, 0])]);
    assert_eq!(column(&compiled, &batch), vec![Value::Null, Value::Int64(2)]);
}

#[test]
fn test_coalesce_with_null_literal() {
    let expr = TypedExpr::call("coalesce", vec![TypedExpr::null(DataType::Int64), b()]);
    let compiled = compile(&expr, &QueryConfig::new()).unwrap();
    let batch = int_batch(vec![("a", vec![1, 2]), ("b", vec![8, 9])]);
    assert_eq!(column(&compiled, &batch), vec![Value::Int64(8), Value::Int64(9)]);
}

#[test]
fn test_try_suppresses_overflow() {
    let overflow = TypedExpr::call("plus", vec![a(), a()]);
    let batch = int_batch(vec![("a", vec![i64::MAX, 1]), ("b", vec![0, 0])]);

    let bare = compile(&overflow, &QueryConfig::new()).unwrap();
    assert!(bare.eval(&batch).is_err());

    let guarded = compile(&TypedExpr::call("try", vec![overflow]), &QueryConfig::new()).unwrap();
    assert_eq!(column(&guarded, &batch), vec![Value::Null, Value::Null]);
}

#[test]
fn test_cost_tracking_follows_config() {
    let expr = TypedExpr::call("coalesce", vec![a(), b()]);
    let batch = int_batch(vec![("a", vec![1]), ("b", vec![2])]);

    let untracked = compile(&expr, &QueryConfig::new()).unwrap();
    untracked.eval(&batch).unwrap();
    assert!(untracked.stats().is_none());

    let config = QueryConfig::new().with_expression_cpu_tracking(true);
    let tracked = compile(&expr, &config).unwrap();
    tracked.eval(&batch).unwrap();
    tracked.eval(&batch).unwrap();
    assert_eq!(tracked.stats().unwrap().invocations, 2);
}

#[test]
fn test_errors_surface_at_compile_time() {
    let config = QueryConfig::new();
    assert!(matches!(
        compile(&TypedExpr::call("and", vec![a(), b()]), &config),
        Err(ExecError::TypeResolution { .. })
    ));
    assert!(matches!(
        compile(&TypedExpr::call("plus", vec![a()]), &config),
        Err(ExecError::TypeResolution { .. })
    ));
    assert!(matches!(
        compile(&TypedExpr::call("nope", vec![]), &config),
        Err(ExecError::UnknownFunction(_))
    ));
    assert!(matches!(
        compile(&TypedExpr::field("c", DataType::Int64), &config),
        Err(ExecError::Validation(_))
    ));
}

#[test]
fn test_compile_all_preserves_order() {
    let forms = SpecialFormRegistry::with_builtins().unwrap();
    let functions = FunctionRegistry::with_builtins();
    let config = QueryConfig::new();
    let compiler = ExprCompiler::new(&forms, &functions, &config, Arc::new(MemoryPool::new("t")));
    let schema = schema_of(&[("a", DataType::Int64), ("b", DataType::Int64)]);

    let compiled = compiler
        .compile_all(&[b(), TypedExpr::call("multiply", vec![a(), int(10)])], &schema)
        .unwrap();
    let batch = int_batch(vec![("a", vec![3]), ("b", vec![4])]);
    assert_eq!(column(&compiled[0], &batch), vec![Value::Int64(4)]);
    assert_eq!(column(&compiled[1], &batch), vec![Value::Int64(30)]);
}
