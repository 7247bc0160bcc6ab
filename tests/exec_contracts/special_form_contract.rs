//! Contract tests for the special-form registry.
//!
//! These tests verify:
//! - A registered special form shadows a same-named ordinary function
//! - Registration honours the {prefix, overwrite} idiom
//! - Unregistered names degrade to "not special"
//! - Value-dependent forms resolve only through their argument expressions

use std::sync::Arc;

use colexec::expr::TypedInput;
use colexec::special_form::register_builtin_special_forms;
use colexec::vector::batch::schema_of;
use colexec::{
    DataType, ExecError, Expr, ExprCompiler, ExprPtr, FunctionRegistry, MemoryPool, QueryConfig,
    Result, RowBatch, SpecialForm, SpecialFormRegistry, TypedExpr, Value, VectorRef,
};

use super::int_batch;

/// Form that answers every call with a constant 42.
struct Answer;

#[derive(Debug)]
struct AnswerExpr;

impl Expr for AnswerExpr {
    fn name(&self) -> &str {
        "answer"
    }

    fn data_type(&self) -> DataType {
        DataType::Int64
    }

    fn eval(&self, batch: &RowBatch) -> Result<VectorRef> {
        Ok(colexec::make_constant(
            DataType::Int64,
            Value::Int64(42),
            batch.num_rows(),
            &MemoryPool::new("answer"),
        ))
    }
}

impl SpecialForm for Answer {
    fn resolve_type(&self, _arg_types: &[DataType]) -> Result<Option<DataType>> {
        Ok(Some(DataType::Int64))
    }

    fn construct(
        &self,
        _data_type: DataType,
        _children: Vec<ExprPtr>,
        _track_cpu_usage: bool,
        _config: &QueryConfig,
    ) -> ExprPtr {
        Box::new(AnswerExpr)
    }
}

fn plus_ab() -> TypedExpr {
    TypedExpr::call(
        "plus",
        vec![
            TypedExpr::field("a", DataType::Int64),
            TypedExpr::field("b", DataType::Int64),
        ],
    )
}

#[test]
fn test_special_form_shadows_function() {
    // Contract: special forms are consulted before the function catalog
    let functions = FunctionRegistry::with_builtins();
    let config = QueryConfig::new();
    let schema = schema_of(&[("a", DataType::Int64), ("b", DataType::Int64)]);
    let batch = int_batch(vec![("a", vec![1, 2]), ("b", vec![3, 4])]);

    let plain = SpecialFormRegistry::empty();
    let compiler = ExprCompiler::new(&plain, &functions, &config, Arc::new(MemoryPool::new("t")));
    let compiled = compiler.compile(&plus_ab(), &schema).unwrap();
    assert_eq!(compiled.name(), "plus");
    assert_eq!(
        compiled.eval(&batch).unwrap().value_at(1).unwrap(),
        Value::Int64(6)
    );

    let mut builder = SpecialFormRegistry::builder();
    builder.register("plus", Arc::new(Answer), false).unwrap();
    let shadowing = builder.build();
    let compiler =
        ExprCompiler::new(&shadowing, &functions, &config, Arc::new(MemoryPool::new("t")));
    let compiled = compiler.compile(&plus_ab(), &schema).unwrap();
    assert_eq!(compiled.name(), "answer");
    assert_eq!(
        compiled.eval(&batch).unwrap().value_at(1).unwrap(),
        Value::Int64(42)
    );
}

#[test]
fn test_prefixed_registration() {
    let mut builder = SpecialFormRegistry::builder();
    register_builtin_special_forms(&mut builder, "presto.", false).unwrap();
    let registry = builder.build();

    assert!(registry.is_registered("presto.and"));
    assert!(registry.is_registered("presto.decimal_round"));
    assert!(!registry.is_registered("and"));
    assert_eq!(registry.len(), 6);
}

#[test]
fn test_duplicate_bulk_registration() {
    // Contract: overwrite=false refuses taken names, overwrite=true replaces
    let mut builder = SpecialFormRegistry::builder();
    register_builtin_special_forms(&mut builder, "", false).unwrap();
    let err = register_builtin_special_forms(&mut builder, "", false).unwrap_err();
    assert!(matches!(err, ExecError::Registry(_)));

    register_builtin_special_forms(&mut builder, "", true).unwrap();
    assert_eq!(builder.build().len(), 6);
}

#[test]
fn test_registered_iff_registration_completed() {
    let mut builder = SpecialFormRegistry::builder();
    assert!(!builder.contains("answer"));
    builder.register("answer", Arc::new(Answer), false).unwrap();
    let registry = builder.build();

    assert!(registry.is_registered("answer"));
    assert!(!registry.is_registered("Answer"));
    assert!(!registry.is_registered("answe"));
}

#[test]
fn test_unregistered_names_degrade() {
    let registry = SpecialFormRegistry::with_builtins().unwrap();
    assert_eq!(
        registry.resolve_type("plus", &[DataType::Int64]).unwrap(),
        None
    );
    let expr = TypedExpr::literal(Value::Int64(1));
    let inputs = [TypedInput {
        expr: &expr,
        data_type: DataType::Int64,
    }];
    assert_eq!(registry.resolve_type_from_inputs("plus", &inputs).unwrap(), None);
    assert!(registry
        .construct("plus", DataType::Int64, Vec::new(), false, &QueryConfig::new())
        .is_none());
}

#[test]
fn test_type_resolution_errors_are_synchronous() {
    let registry = SpecialFormRegistry::with_builtins().unwrap();
    let err = registry
        .resolve_type("and", &[DataType::Bool, DataType::Int64])
        .unwrap_err();
    assert!(matches!(err, ExecError::TypeResolution { .. }));
    assert!(registry.resolve_type("try", &[]).is_err());
    assert!(registry.resolve_type("coalesce", &[]).is_err());
}

#[test]
fn test_resolution_is_deterministic() {
    let registry = SpecialFormRegistry::with_builtins().unwrap();
    let args = [DataType::Bool, DataType::String, DataType::String];
    let results = (0..20)
        .map(|_| registry.resolve_type("if", &args).unwrap())
        .collect::<Vec<_>>();
    assert!(results.iter().all(|t| *t == Some(DataType::String)));
}

#[test]
fn test_decimal_round_needs_literal() {
    // Contract: value-dependent forms resolve through child expressions
    let decimal = DataType::Decimal {
        precision: 12,
        scale: 4,
    };
    let forms = SpecialFormRegistry::with_builtins().unwrap();
    let functions = FunctionRegistry::with_builtins();
    let config = QueryConfig::new();
    let compiler = ExprCompiler::new(&forms, &functions, &config, Arc::new(MemoryPool::new("t")));
    let schema = schema_of(&[("price", decimal), ("digits", DataType::Int64)]);

    let literal = TypedExpr::call(
        "decimal_round",
        vec![
            TypedExpr::field("price", decimal),
            TypedExpr::literal(Value::Int64(1)),
        ],
    );
    assert_eq!(
        compiler.resolve_type(&literal, &schema).unwrap(),
        DataType::Decimal {
            precision: 10,
            scale: 1
        }
    );

    let negative = TypedExpr::call(
        "decimal_round",
        vec![
            TypedExpr::field("price", decimal),
            TypedExpr::literal(Value::Int64(-2)),
        ],
    );
    assert_eq!(
        compiler.resolve_type(&negative, &schema).unwrap(),
        DataType::Decimal {
            precision: 9,
            scale: 0
        }
    );

    let column = TypedExpr::call(
        "decimal_round",
        vec![
            TypedExpr::field("price", decimal),
            TypedExpr::field("digits", DataType::Int64),
        ],
    );
    assert!(matches!(
        compiler.resolve_type(&column, &schema),
        Err(ExecError::TypeResolution { .. })
    ));

    let single = TypedExpr::call("decimal_round", vec![TypedExpr::field("price", decimal)]);
    assert_eq!(
        compiler.resolve_type(&single, &schema).unwrap(),
        DataType::Decimal {
            precision: 9,
            scale: 0
        }
    );
}
