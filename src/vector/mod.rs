//! Typed column containers.
//!
//! A [`Vector`] is one column of a [`RowBatch`] in one of four physical
//! encodings. Vectors are shared as [`VectorRef`] and never mutated once
//! shared; every transform produces a new vector.

pub mod batch;
pub mod lazy;

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, DictionaryArray};
use arrow::datatypes::Int32Type;
use tracing::trace;

use crate::error::{ExecError, Result};
use crate::memory::{MemoryPool, Reservation};
use crate::types::{DataType, Value};

pub use batch::RowBatch;
pub use lazy::{LazyVector, VectorLoader};

/// Shared handle to an immutable vector.
pub type VectorRef = Arc<Vector>;

/// Physical encoding of a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Materialized values with a null bitmap.
    Flat,
    /// One value (or null) repeated for every row.
    Constant,
    /// Indices into a shared value pool.
    Dictionary,
    /// Deferred decode bound to an external source.
    Lazy,
}

/// A column of fixed length in one physical encoding.
#[derive(Debug)]
pub enum Vector {
    /// Independently stored values.
    Flat { array: ArrayRef, data_type: DataType },
    /// A single logical value repeated `len` times.
    Constant {
        value: Value,
        data_type: DataType,
        len: usize,
        /// Pool charge held while the vector is alive.
        reservation: Option<Reservation>,
    },
    /// Int32 keys into a value array.
    Dictionary {
        array: DictionaryArray<Int32Type>,
        data_type: DataType,
    },
    /// Deferred decode; must be forced before row access.
    Lazy(LazyVector),
}

impl Vector {
    /// Null constant that is not charged to any pool.
    #[must_use]
    pub fn null_constant(data_type: DataType, len: usize) -> Self {
        Vector::Constant {
            value: Value::Null,
            data_type,
            len,
            reservation: None,
        }
    }

    /// Wraps an Arrow array, keeping Int32-keyed dictionaries encoded.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if the Arrow type has no logical counterpart.
    pub fn from_array(array: ArrayRef) -> Result<Vector> {
        let data_type = DataType::from_arrow(array.data_type()).ok_or_else(|| {
            ExecError::SchemaError(format!("unsupported Arrow type {}", array.data_type()))
        })?;

        if let arrow::datatypes::DataType::Dictionary(key_type, _) = array.data_type() {
            if key_type.as_ref() == &arrow::datatypes::DataType::Int32 {
                let array = array.as_dictionary::<Int32Type>().clone();
                return Ok(Vector::Dictionary { array, data_type });
            }
            // Other key widths are decoded up front.
            let array = arrow::compute::cast(&array, &data_type.to_arrow())?;
            return Ok(Vector::Flat { array, data_type });
        }

        Ok(Vector::Flat { array, data_type })
    }

    /// Creates a lazy vector.
    pub fn lazy(data_type: DataType, len: usize, loader: impl VectorLoader + 'static) -> Vector {
        Vector::Lazy(LazyVector::new(data_type, len, loader))
    }

    /// Returns the physical encoding.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        match self {
            Vector::Flat { .. } => Encoding::Flat,
            Vector::Constant { .. } => Encoding::Constant,
            Vector::Dictionary { .. } => Encoding::Dictionary,
            Vector::Lazy(_) => Encoding::Lazy,
        }
    }

    /// Returns the logical data type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Vector::Flat { data_type, .. }
            | Vector::Constant { data_type, .. }
            | Vector::Dictionary { data_type, .. } => *data_type,
            Vector::Lazy(lazy) => lazy.data_type(),
        }
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Vector::Flat { array, .. } => array.len(),
            Vector::Constant { len, .. } => *len,
            Vector::Dictionary { array, .. } => array.len(),
            Vector::Lazy(lazy) => lazy.len(),
        }
    }

    /// Returns true if the vector has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true unless this is a lazy vector that has not been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        match self {
            Vector::Lazy(lazy) => lazy.is_loaded(),
            _ => true,
        }
    }

    /// Returns true if `row` is null.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Vector::value_at`].
    pub fn is_null(&self, row: usize) -> Result<bool> {
        match self {
            Vector::Flat { array, .. } if row < array.len() => Ok(array.is_null(row)),
            Vector::Constant { value, len, .. } if row < *len => Ok(value.is_null()),
            _ => Ok(self.value_at(row)?.is_null()),
        }
    }

    /// Returns the constant value when the encoding is Constant.
    #[must_use]
    pub fn constant_value(&self) -> Option<&Value> {
        match self {
            Vector::Constant { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Reads one row.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for an out-of-range row and `LazyLoad` if the
    /// vector is lazy and has not been forced.
    pub fn value_at(&self, row: usize) -> Result<Value> {
        if row >= self.len() {
            return Err(ExecError::SchemaError(format!(
                "row {row} out of bounds for vector of length {}",
                self.len()
            )));
        }
        match self {
            Vector::Flat { array, .. } => Value::from_array(array.as_ref(), row),
            Vector::Constant { value, .. } => Ok(value.clone()),
            Vector::Dictionary { array, .. } => {
                if array.is_null(row) {
                    return Ok(Value::Null);
                }
                let key = array.keys().value(row) as usize;
                Value::from_array(array.values().as_ref(), key)
            }
            Vector::Lazy(lazy) => match lazy.loaded() {
                Some(vector) => vector.value_at(row),
                None => Err(ExecError::LazyLoad(
                    "lazy vector must be forced before row access".to_string(),
                )),
            },
        }
    }

    /// Flattens the vector into a plain Arrow array of its logical type.
    ///
    /// Forces lazy vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or an Arrow cast fails.
    pub fn to_array(&self) -> Result<ArrayRef> {
        match self {
            Vector::Flat { array, .. } => Ok(Arc::clone(array)),
            Vector::Constant {
                value,
                data_type,
                len,
                ..
            } => value.to_array(*data_type, *len),
            Vector::Dictionary { array, data_type } => {
                Ok(arrow::compute::cast(array, &data_type.to_arrow())?)
            }
            Vector::Lazy(lazy) => lazy.load()?.to_array(),
        }
    }
}

/// Builds a constant vector of `len` rows.
///
/// A null `value` yields a null constant of `data_type`.
pub fn make_constant(data_type: DataType, value: Value, len: usize, pool: &MemoryPool) -> VectorRef {
    debug_assert!(value.is_null() || value.data_type() == Some(data_type));
    let reservation = pool.reserve(value.estimated_size());
    trace!(pool = pool.name(), %data_type, len, "constant vector");
    Arc::new(Vector::Constant {
        value,
        data_type,
        len,
        reservation: Some(reservation),
    })
}

/// Builds a null constant vector of `len` rows.
pub fn make_null_constant(data_type: DataType, len: usize, pool: &MemoryPool) -> VectorRef {
    make_constant(data_type, Value::Null, len, pool)
}

/// Converts a lazy vector into its concrete encoding.
///
/// Concrete vectors are returned as-is. Calling this repeatedly is cheap.
///
/// # Errors
///
/// Returns `LazyLoad` if the deferred decode fails.
pub fn force(vector: &VectorRef) -> Result<VectorRef> {
    match vector.as_ref() {
        Vector::Lazy(lazy) => lazy.load(),
        _ => Ok(Arc::clone(vector)),
    }
}
