//! Value and `DataType` definitions.

use std::fmt;
use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, AsArray, BooleanArray, Date32Array, Decimal128Array,
    Float32Array, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{
    Date32Type, Decimal128Type, Float32Type, Float64Type, Int64Type, TimeUnit,
    TimestampMicrosecondType,
};
use serde::{Deserialize, Serialize};

use crate::error::{ExecError, Result};

/// Largest precision a 128-bit decimal can carry.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// Supported logical data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// Date (stored as days since epoch).
    Date,
    /// Timestamp (stored as microseconds since epoch).
    Timestamp,
    /// Fixed point decimal backed by a 128-bit integer.
    Decimal { precision: u8, scale: i8 },
}

impl DataType {
    /// Returns the base name of the data type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int64 => "INT64",
            DataType::Float32 => "FLOAT32",
            DataType::Float64 => "FLOAT64",
            DataType::Bool => "BOOL",
            DataType::String => "STRING",
            DataType::Date => "DATE",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Decimal { .. } => "DECIMAL",
        }
    }

    /// Returns the byte size for fixed-width types.
    #[must_use]
    pub fn byte_size(&self) -> Option<usize> {
        match self {
            DataType::Int64 | DataType::Float64 | DataType::Timestamp => Some(8),
            DataType::Float32 | DataType::Date => Some(4),
            DataType::Bool => Some(1),
            DataType::Decimal { .. } => Some(16),
            DataType::String => None, // variable width
        }
    }

    /// Converts to an Arrow data type.
    #[must_use]
    pub fn to_arrow(&self) -> arrow::datatypes::DataType {
        match self {
            DataType::Int64 => arrow::datatypes::DataType::Int64,
            DataType::Float32 => arrow::datatypes::DataType::Float32,
            DataType::Float64 => arrow::datatypes::DataType::Float64,
            DataType::Bool => arrow::datatypes::DataType::Boolean,
            DataType::String => arrow::datatypes::DataType::Utf8,
            DataType::Date => arrow::datatypes::DataType::Date32,
            DataType::Timestamp => {
                arrow::datatypes::DataType::Timestamp(TimeUnit::Microsecond, None)
            }
            DataType::Decimal { precision, scale } => {
                arrow::datatypes::DataType::Decimal128(*precision, *scale)
            }
        }
    }

    /// Converts from an Arrow data type.
    ///
    /// Dictionary types map to their value type. Returns None for unsupported
    /// Arrow types.
    #[must_use]
    pub fn from_arrow(arrow_type: &arrow::datatypes::DataType) -> Option<Self> {
        match arrow_type {
            arrow::datatypes::DataType::Int64 => Some(DataType::Int64),
            arrow::datatypes::DataType::Float32 => Some(DataType::Float32),
            arrow::datatypes::DataType::Float64 => Some(DataType::Float64),
            arrow::datatypes::DataType::Boolean => Some(DataType::Bool),
            arrow::datatypes::DataType::Utf8 => Some(DataType::String),
            arrow::datatypes::DataType::Date32 => Some(DataType::Date),
            arrow::datatypes::DataType::Timestamp(TimeUnit::Microsecond, None) => {
                Some(DataType::Timestamp)
            }
            arrow::datatypes::DataType::Decimal128(precision, scale) => Some(DataType::Decimal {
                precision: *precision,
                scale: *scale,
            }),
            arrow::datatypes::DataType::Dictionary(_, value_type) => Self::from_arrow(value_type),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Runtime value container for scalars and constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer value.
    Int64(i64),
    /// 32-bit floating point value.
    Float32(f32),
    /// 64-bit floating point value.
    Float64(f64),
    /// Boolean value.
    Bool(bool),
    /// String value.
    String(String),
    /// Date value (days since Unix epoch).
    Date(i32),
    /// Timestamp value (microseconds since Unix epoch).
    Timestamp(i64),
    /// Decimal value as an unscaled integer.
    Decimal { value: i128, precision: u8, scale: i8 },
    /// Null value.
    Null,
}

// Manual Hash implementation because f32/f64 doesn't implement Hash
impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Int64(v) | Value::Timestamp(v) => v.hash(state),
            Value::Float32(v) => v.to_bits().hash(state),
            Value::Float64(v) => v.to_bits().hash(state),
            Value::Bool(v) => v.hash(state),
            Value::String(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::Decimal {
                value,
                precision,
                scale,
            } => {
                value.hash(state);
                precision.hash(state);
                scale.hash(state);
            }
            Value::Null => {}
        }
    }
}

// Manual Eq implementation because f64 doesn't implement Eq
impl Eq for Value {}

impl Value {
    /// Returns true if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the data type of this value, or None for Null.
    #[must_use]
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float32(_) => Some(DataType::Float32),
            Value::Float64(_) => Some(DataType::Float64),
            Value::Bool(_) => Some(DataType::Bool),
            Value::String(_) => Some(DataType::String),
            Value::Date(_) => Some(DataType::Date),
            Value::Timestamp(_) => Some(DataType::Timestamp),
            Value::Decimal {
                precision, scale, ..
            } => Some(DataType::Decimal {
                precision: *precision,
                scale: *scale,
            }),
            Value::Null => None,
        }
    }

    /// Approximate number of bytes needed to hold this value once.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        match self {
            Value::String(s) => s.len(),
            Value::Null => 0,
            other => other
                .data_type()
                .and_then(|t| t.byte_size())
                .unwrap_or_default(),
        }
    }

    /// Builds an Arrow array holding this value `len` times.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if the value does not belong to `data_type`.
    pub fn to_array(&self, data_type: DataType, len: usize) -> Result<ArrayRef> {
        let array: ArrayRef = match (self, data_type) {
            (Value::Null, _) => new_null_array(&data_type.to_arrow(), len),
            (Value::Int64(v), DataType::Int64) => Arc::new(Int64Array::from(vec![*v; len])),
            (Value::Float32(v), DataType::Float32) => Arc::new(Float32Array::from(vec![*v; len])),
            (Value::Float64(v), DataType::Float64) => Arc::new(Float64Array::from(vec![*v; len])),
            (Value::Bool(v), DataType::Bool) => Arc::new(BooleanArray::from(vec![*v; len])),
            (Value::String(v), DataType::String) => {
                Arc::new(StringArray::from(vec![v.as_str(); len]))
            }
            (Value::Date(v), DataType::Date) => Arc::new(Date32Array::from(vec![*v; len])),
            (Value::Timestamp(v), DataType::Timestamp) => {
                Arc::new(TimestampMicrosecondArray::from(vec![*v; len]))
            }
            (Value::Decimal { value, .. }, DataType::Decimal { precision, scale }) => Arc::new(
                Decimal128Array::from(vec![*value; len])
                    .with_precision_and_scale(precision, scale)?,
            ),
            (value, expected) => {
                return Err(ExecError::SchemaError(format!(
                    "value {value:?} is not of type {expected}"
                )))
            }
        };
        Ok(array)
    }

    /// Reads row `row` of a plain (non-dictionary) Arrow array.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for Arrow types without a logical counterpart.
    pub fn from_array(array: &dyn Array, row: usize) -> Result<Value> {
        if array.is_null(row) {
            return Ok(Value::Null);
        }
        let value = match DataType::from_arrow(array.data_type()) {
            Some(DataType::Int64) => Value::Int64(array.as_primitive::<Int64Type>().value(row)),
            Some(DataType::Float32) => {
                Value::Float32(array.as_primitive::<Float32Type>().value(row))
            }
            Some(DataType::Float64) => {
                Value::Float64(array.as_primitive::<Float64Type>().value(row))
            }
            Some(DataType::Bool) => Value::Bool(array.as_boolean().value(row)),
            Some(DataType::String) => Value::String(array.as_string::<i32>().value(row).to_string()),
            Some(DataType::Date) => Value::Date(array.as_primitive::<Date32Type>().value(row)),
            Some(DataType::Timestamp) => {
                Value::Timestamp(array.as_primitive::<TimestampMicrosecondType>().value(row))
            }
            Some(DataType::Decimal { precision, scale }) => Value::Decimal {
                value: array.as_primitive::<Decimal128Type>().value(row),
                precision,
                scale,
            },
            None => {
                return Err(ExecError::SchemaError(format!(
                    "unsupported Arrow type {}",
                    array.data_type()
                )))
            }
        };
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int64(v) | Value::Timestamp(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v}"),
            Value::Decimal { value, scale, .. } => {
                let sign = if *value < 0 { "-" } else { "" };
                let digits = value.unsigned_abs().to_string();
                let places = usize::from(scale.unsigned_abs());
                if *scale <= 0 {
                    if *value == 0 {
                        return f.write_str("0");
                    }
                    return write!(f, "{sign}{digits}{}", "0".repeat(places));
                }
                let padded = format!("{digits:0>width$}", width = places + 1);
                let (whole, fraction) = padded.split_at(padded.len() - places);
                write!(f, "{sign}{whole}.{fraction}")
            }
            Value::Null => f.write_str("null"),
        }
    }
}
