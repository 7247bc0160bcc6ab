//! Contract tests for vectors and row batches.
//!
//! - Constant vectors hold one value regardless of length
//! - Dictionary columns stay encoded and read through their keys
//! - Lazy vectors load once and refuse row access until forced
//! - Batches reject columns of unequal length

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, DictionaryArray, Int64Array, StringArray};
use arrow::datatypes::Int32Type;

use colexec::vector::batch::schema_of;
use colexec::vector::Encoding;
use colexec::{
    force, make_constant, make_null_constant, DataType, ExecError, MemoryPool, Result, RowBatch,
    Value, Vector,
};

use super::int_column;

#[test]
fn test_constant_vector_repeats_value() {
    // Contract: make_constant yields a Constant encoding of the requested length
    let pool = MemoryPool::new("test");
    let vector = make_constant(DataType::Int64, Value::Int64(7), 1000, &pool);

    assert_eq!(vector.encoding(), Encoding::Constant);
    assert_eq!(vector.len(), 1000);
    assert_eq!(vector.value_at(0).unwrap(), Value::Int64(7));
    assert_eq!(vector.value_at(999).unwrap(), Value::Int64(7));
    assert_eq!(pool.allocations(), 1);
    assert_eq!(pool.used(), 8);
}

#[test]
fn test_null_constant_is_typed() {
    let pool = MemoryPool::new("test");
    let vector = make_null_constant(DataType::String, 3, &pool);

    assert_eq!(vector.data_type(), DataType::String);
    assert!(vector.is_null(2).unwrap());
    let array = vector.to_array().unwrap();
    assert_eq!(array.len(), 3);
    assert_eq!(array.null_count(), 3);
}

#[test]
fn test_out_of_range_row_is_error() {
    let vector = int_column(vec![1, 2]);
    assert!(matches!(vector.value_at(2), Err(ExecError::SchemaError(_))));
}

#[test]
fn test_dictionary_stays_encoded() {
    // Contract: Int32-keyed dictionaries keep their encoding
    let dictionary: DictionaryArray<Int32Type> =
        vec!["red", "blue", "red"].into_iter().collect();
    let vector = Vector::from_array(Arc::new(dictionary) as ArrayRef).unwrap();

    assert_eq!(vector.encoding(), Encoding::Dictionary);
    assert_eq!(vector.data_type(), DataType::String);
    assert_eq!(
        vector.value_at(2).unwrap(),
        Value::String("red".to_string())
    );

    let flat = vector.to_array().unwrap();
    let strings = flat.as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(strings.value(1), "blue");
}

#[test]
fn test_lazy_vector_loads_once() {
    // Contract: forcing is idempotent and the loader runs at most once
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let vector = Arc::new(Vector::lazy(DataType::Int64, 3, move || -> Result<ArrayRef> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Int64Array::from(vec![4, 5, 6])))
    }));

    assert!(!vector.is_loaded());
    assert!(matches!(vector.value_at(0), Err(ExecError::LazyLoad(_))));

    let first = force(&vector).unwrap();
    let second = force(&vector).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.encoding(), Encoding::Flat);
    assert_eq!(vector.value_at(1).unwrap(), Value::Int64(5));
}

#[test]
fn test_lazy_vector_checks_loaded_length() {
    let vector = Arc::new(Vector::lazy(DataType::Int64, 5, || -> Result<ArrayRef> {
        Ok(Arc::new(Int64Array::from(vec![1])))
    }));
    assert!(matches!(force(&vector), Err(ExecError::LazyLoad(_))));
}

#[test]
fn test_batch_requires_equal_lengths() {
    // Contract: all columns of a batch share one row count
    let schema = schema_of(&[("a", DataType::Int64), ("b", DataType::Int64)]);
    let err = RowBatch::try_new(schema, vec![int_column(vec![1, 2]), int_column(vec![1])])
        .unwrap_err();
    assert!(matches!(err, ExecError::SchemaError(_)));
}

#[test]
fn test_batch_rejects_type_mismatch() {
    let schema = schema_of(&[("a", DataType::String)]);
    let err = RowBatch::try_new(schema, vec![int_column(vec![1])]).unwrap_err();
    assert!(matches!(err, ExecError::SchemaError(_)));
}

#[test]
fn test_batch_aliases_columns() {
    // Contract: the same vector may appear in several batches
    let column = int_column(vec![1, 2, 3]);
    let schema = schema_of(&[("a", DataType::Int64)]);
    let first = RowBatch::try_new(schema.clone(), vec![Arc::clone(&column)]).unwrap();
    let second = RowBatch::try_new(schema, vec![Arc::clone(&column)]).unwrap();

    assert!(Arc::ptr_eq(first.column(0), second.column(0)));
    assert_eq!(Arc::strong_count(&column), 3);
}

#[test]
fn test_record_batch_conversion_materializes_constants() {
    let pool = MemoryPool::new("test");
    let schema = schema_of(&[("a", DataType::Int64), ("c", DataType::Int64)]);
    let batch = RowBatch::try_new(
        schema,
        vec![
            int_column(vec![1, 2]),
            make_constant(DataType::Int64, Value::Int64(9), 2, &pool),
        ],
    )
    .unwrap();

    let record = batch.to_record_batch().unwrap();
    assert_eq!(record.num_rows(), 2);
    let c = record
        .column(1)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(c.values().to_vec(), vec![9, 9]);

    let back = RowBatch::from_record_batch(&record).unwrap();
    assert_eq!(back.rows().unwrap(), batch.rows().unwrap());
}

#[test]
fn test_column_by_name() {
    let batch = super::int_batch(vec![("a", vec![1]), ("b", vec![2])]);
    assert_eq!(
        batch.column_by_name("b").unwrap().value_at(0).unwrap(),
        Value::Int64(2)
    );
    assert!(batch.column_by_name("z").is_none());
}
