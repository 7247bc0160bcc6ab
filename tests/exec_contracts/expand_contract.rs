//! Contract tests for the Expand operator and the pull protocol.
//!
//! These tests verify:
//! - One output batch per `get_output` call, K calls per input batch
//! - Field cells alias input columns; constant cells become constants
//! - Construction rejects anything but fields and constants
//! - Protocol transitions between Idle, Filled and Finished

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array};

use colexec::vector::batch::schema_of;
use colexec::vector::Encoding;
use colexec::{
    DataType, ExecError, ExpandNode, ExpandOperator, MemoryPool, Operator, OperatorState, Result,
    RowBatch, TypedExpr, Value, Vector,
};

use super::int_batch;

fn ab_schema() -> arrow::datatypes::SchemaRef {
    schema_of(&[("a", DataType::Int64), ("b", DataType::Int64)])
}

fn grouping_node() -> ExpandNode {
    ExpandNode::try_new(
        "expand-0",
        vec!["key".to_string(), "gid".to_string()],
        vec![
            vec![
                TypedExpr::field("a", DataType::Int64),
                TypedExpr::literal(Value::Int64(0)),
            ],
            vec![
                TypedExpr::field("b", DataType::Int64),
                TypedExpr::literal(Value::Int64(1)),
            ],
            vec![
                TypedExpr::null(DataType::Int64),
                TypedExpr::literal(Value::Int64(2)),
            ],
        ],
        ab_schema(),
    )
    .unwrap()
}

fn expand() -> ExpandOperator {
    ExpandOperator::new(&grouping_node(), Arc::new(MemoryPool::new("test"))).unwrap()
}

#[test]
fn test_one_batch_per_call_k_calls_per_input() {
    // Contract: exactly K output batches per input, each with N rows
    let mut op = expand();
    op.add_input(int_batch(vec![("a", vec![1, 2, 3]), ("b", vec![4, 5, 6])]))
        .unwrap();

    for k in 0..3 {
        assert_eq!(op.state(), OperatorState::Filled, "call {k}");
        assert!(!op.needs_input());
        let out = op.get_output().unwrap().unwrap();
        assert_eq!(out.num_rows(), 3);
        assert_eq!(out.num_columns(), 2);
    }
    assert!(op.needs_input());
    assert!(op.get_output().unwrap().is_none());
}

#[test]
fn test_cell_values() {
    // Contract: output[k][j][i] is input[i][c] for field cells, else the constant
    let mut op = expand();
    op.add_input(int_batch(vec![("a", vec![1, 2]), ("b", vec![10, 20])]))
        .unwrap();

    let rows = (0..3)
        .map(|_| op.get_output().unwrap().unwrap().rows().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        rows[0],
        vec![
            vec![Value::Int64(1), Value::Int64(0)],
            vec![Value::Int64(2), Value::Int64(0)]
        ]
    );
    assert_eq!(
        rows[1],
        vec![
            vec![Value::Int64(10), Value::Int64(1)],
            vec![Value::Int64(20), Value::Int64(1)]
        ]
    );
    assert_eq!(
        rows[2],
        vec![
            vec![Value::Null, Value::Int64(2)],
            vec![Value::Null, Value::Int64(2)]
        ]
    );
}

#[test]
fn test_field_cells_alias_input() {
    // Contract: field cells share the input column instance
    let mut op = expand();
    let input = int_batch(vec![("a", vec![1]), ("b", vec![2])]);
    let a = Arc::clone(input.column(0));
    let b = Arc::clone(input.column(1));
    op.add_input(input).unwrap();

    let first = op.get_output().unwrap().unwrap();
    let second = op.get_output().unwrap().unwrap();
    let third = op.get_output().unwrap().unwrap();
    assert!(Arc::ptr_eq(first.column(0), &a));
    assert!(Arc::ptr_eq(second.column(0), &b));
    assert_eq!(first.column(1).encoding(), Encoding::Constant);
    assert_eq!(third.column(0).encoding(), Encoding::Constant);
    assert!(third.column(0).is_null(0).unwrap());
}

#[test]
fn test_output_schema_matches_node() {
    let node = grouping_node();
    let op = ExpandOperator::new(&node, Arc::new(MemoryPool::new("test"))).unwrap();
    assert_eq!(op.output_schema(), node.output_schema());
    assert_eq!(op.output_schema().field(0).name(), "key");
}

#[test]
fn test_unsupported_cell_names_expression() {
    // Contract: non-field, non-constant cells fail construction with their text
    let node = ExpandNode::try_new(
        "e",
        vec!["x".to_string()],
        vec![
            vec![TypedExpr::field("a", DataType::Int64)],
            vec![TypedExpr::call(
                "negate",
                vec![TypedExpr::field("b", DataType::Int64)],
            )],
        ],
        ab_schema(),
    )
    .unwrap();

    match ExpandOperator::new(&node, Arc::new(MemoryPool::new("test"))) {
        Err(ExecError::UnsupportedExpression { expression, .. }) => {
            assert_eq!(expression, "negate(\"b\")");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("construction should fail"),
    }
}

#[test]
fn test_missing_field_fails_construction() {
    let node = ExpandNode::try_new(
        "e",
        vec!["x".to_string()],
        vec![vec![TypedExpr::field("missing", DataType::Int64)]],
        ab_schema(),
    )
    .unwrap();
    assert!(matches!(
        ExpandOperator::new(&node, Arc::new(MemoryPool::new("test"))),
        Err(ExecError::Validation(_))
    ));
}

#[test]
fn test_add_input_while_filled_is_violation() {
    let mut op = expand();
    op.add_input(int_batch(vec![("a", vec![1]), ("b", vec![2])]))
        .unwrap();
    let err = op
        .add_input(int_batch(vec![("a", vec![1]), ("b", vec![2])]))
        .unwrap_err();
    assert!(matches!(err, ExecError::ProtocolViolation { .. }));
}

#[test]
fn test_no_more_input_drains_before_finishing() {
    // Contract: Filled + no_more_input must drain before Finished
    let mut op = expand();
    op.add_input(int_batch(vec![("a", vec![1]), ("b", vec![2])]))
        .unwrap();
    op.no_more_input();

    assert!(!op.is_finished());
    op.get_output().unwrap().unwrap();
    op.get_output().unwrap().unwrap();
    assert!(!op.is_finished());
    op.get_output().unwrap().unwrap();
    assert!(op.is_finished());
    assert!(!op.needs_input());
}

#[test]
fn test_idle_with_no_more_input_is_finished() {
    let mut op = expand();
    op.no_more_input();
    assert!(op.is_finished());
    assert!(op.get_output().unwrap().is_none());
}

#[test]
fn test_add_input_forces_lazy_columns() {
    // Contract: lazy columns are loaded when the batch is accepted
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let lazy = Vector::lazy(DataType::Int64, 2, move || -> Result<ArrayRef> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Int64Array::from(vec![7, 8])))
    });
    let input = RowBatch::try_new(
        ab_schema(),
        vec![Arc::new(lazy), super::int_column(vec![1, 2])],
    )
    .unwrap();

    let mut op = expand();
    op.add_input(input).unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    let out = op.get_output().unwrap().unwrap();
    assert_eq!(out.column(0).encoding(), Encoding::Flat);
    assert_eq!(out.value_at(1, 0).unwrap(), Value::Int64(8));
}

#[test]
fn test_empty_batch_yields_empty_outputs() {
    let mut op = expand();
    op.add_input(int_batch(vec![("a", vec![]), ("b", vec![])]))
        .unwrap();
    for _ in 0..3 {
        assert_eq!(op.get_output().unwrap().unwrap().num_rows(), 0);
    }
    assert!(op.needs_input());
}
