//! Logical data types and scalar values.

mod value;

pub use value::{DataType, Value, MAX_DECIMAL_PRECISION};
