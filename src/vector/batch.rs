//! Row batches: named, typed vectors sharing one row count.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::{ExecError, Result};
use crate::types::{DataType, Value};

use super::{force, Vector, VectorRef};

/// An immutable set of columns with a fixed schema and row count.
///
/// Columns are shared handles, so the same vector may appear in several
/// batches at once.
#[derive(Debug, Clone)]
pub struct RowBatch {
    schema: SchemaRef,
    columns: Vec<VectorRef>,
    num_rows: usize,
}

impl RowBatch {
    /// Creates a batch, taking the row count from the first column.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if the columns do not match the schema or differ
    /// in length.
    pub fn try_new(schema: SchemaRef, columns: Vec<VectorRef>) -> Result<Self> {
        let num_rows = columns.first().map_or(0, |c| c.len());
        Self::try_new_with_row_count(schema, columns, num_rows)
    }

    /// Creates a batch with an explicit row count (needed for zero columns).
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if the columns do not match the schema or any
    /// column length differs from `num_rows`.
    pub fn try_new_with_row_count(
        schema: SchemaRef,
        columns: Vec<VectorRef>,
        num_rows: usize,
    ) -> Result<Self> {
        if schema.fields().len() != columns.len() {
            return Err(ExecError::SchemaError(format!(
                "schema has {} fields but {} columns were supplied",
                schema.fields().len(),
                columns.len()
            )));
        }
        for (field, column) in schema.fields().iter().zip(&columns) {
            if column.len() != num_rows {
                return Err(ExecError::SchemaError(format!(
                    "column '{}' has {} rows, expected {}",
                    field.name(),
                    column.len(),
                    num_rows
                )));
            }
            if DataType::from_arrow(field.data_type()) != Some(column.data_type()) {
                return Err(ExecError::SchemaError(format!(
                    "column '{}' is {} but the schema declares {}",
                    field.name(),
                    column.data_type(),
                    field.data_type()
                )));
            }
        }
        Ok(Self::new_unchecked(schema, columns, num_rows))
    }

    /// Assembles a batch whose invariants the caller already guarantees.
    pub(crate) fn new_unchecked(schema: SchemaRef, columns: Vec<VectorRef>, num_rows: usize) -> Self {
        debug_assert_eq!(schema.fields().len(), columns.len());
        debug_assert!(columns.iter().all(|c| c.len() == num_rows));
        RowBatch {
            schema,
            columns,
            num_rows,
        }
    }

    /// Wraps an Arrow record batch, keeping dictionary columns encoded.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for Arrow types without a logical counterpart.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let columns = batch
            .columns()
            .iter()
            .map(|array| Vector::from_array(Arc::clone(array)).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        let schema = logical_schema(&batch.schema())?;
        Ok(Self::new_unchecked(schema, columns, batch.num_rows()))
    }

    /// Flattens every column into an Arrow record batch.
    ///
    /// # Errors
    ///
    /// Returns an error if a lazy column fails to load or Arrow rejects the
    /// assembled batch.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let arrays = self
            .columns
            .iter()
            .map(|c| c.to_array())
            .collect::<Result<Vec<ArrayRef>>>()?;
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows));
        let schema = logical_schema(&self.schema)?;
        Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
    }

    /// Returns the schema of this batch.
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Returns the number of rows in this batch.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Returns the number of columns in this batch.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns a column by index.
    #[must_use]
    pub fn column(&self, index: usize) -> &VectorRef {
        &self.columns[index]
    }

    /// Returns all columns.
    #[must_use]
    pub fn columns(&self) -> &[VectorRef] {
        &self.columns
    }

    /// Returns a column by name.
    pub fn column_by_name(&self, name: &str) -> Option<&VectorRef> {
        self.schema.index_of(name).ok().map(|i| &self.columns[i])
    }

    /// Reads one cell.
    ///
    /// # Errors
    ///
    /// Returns an error if the cell is out of range or its column is lazy
    /// and unloaded.
    pub fn value_at(&self, row: usize, column: usize) -> Result<Value> {
        let vector = self.columns.get(column).ok_or_else(|| {
            ExecError::SchemaError(format!(
                "column {column} out of bounds for batch with {} columns",
                self.columns.len()
            ))
        })?;
        vector.value_at(row)
    }

    /// Reads every row as a list of values, in column order.
    ///
    /// # Errors
    ///
    /// Returns an error if any column is lazy and unloaded.
    pub fn rows(&self) -> Result<Vec<Vec<Value>>> {
        (0..self.num_rows)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| c.value_at(row))
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    /// Returns true if no column is an unloaded lazy vector.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.columns.iter().all(|c| c.is_loaded())
    }

    /// Returns a batch in which every lazy column has been replaced by its
    /// loaded encoding.
    ///
    /// # Errors
    ///
    /// Returns `LazyLoad` if any deferred decode fails.
    pub fn loaded(self) -> Result<Self> {
        let columns = self.columns.iter().map(force).collect::<Result<Vec<_>>>()?;
        Ok(RowBatch {
            schema: self.schema,
            columns,
            num_rows: self.num_rows,
        })
    }
}

/// Rewrites a schema so every field carries its logical Arrow type.
///
/// # Errors
///
/// Returns `SchemaError` for Arrow types without a logical counterpart.
pub fn logical_schema(schema: &Schema) -> Result<SchemaRef> {
    let fields = schema
        .fields()
        .iter()
        .map(|field| {
            let data_type = DataType::from_arrow(field.data_type()).ok_or_else(|| {
                ExecError::SchemaError(format!(
                    "column '{}' has unsupported type {}",
                    field.name(),
                    field.data_type()
                ))
            })?;
            Ok(Field::new(field.name(), data_type.to_arrow(), true))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(Schema::new(fields)))
}

/// Builds a nullable schema from `(name, type)` pairs.
#[must_use]
pub fn schema_of(columns: &[(&str, DataType)]) -> SchemaRef {
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, data_type)| Field::new(*name, data_type.to_arrow(), true))
            .collect::<Vec<_>>(),
    ))
}
