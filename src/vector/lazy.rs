//! Deferred-decode vectors.

use std::fmt;
use std::sync::Arc;

use arrow::array::ArrayRef;
use parking_lot::Mutex;

use crate::error::{ExecError, Result};
use crate::types::DataType;

use super::{Vector, VectorRef};

/// Source of a lazily decoded column.
///
/// A loader is bound to external state (a page, a reader position) that the
/// pipeline may recycle once it advances past the batch that produced it.
pub trait VectorLoader: Send + Sync {
    /// Decodes the full column.
    ///
    /// # Errors
    ///
    /// Returns `LazyLoad` if the backing source is no longer available.
    fn load(&self) -> Result<ArrayRef>;
}

impl<F> VectorLoader for F
where
    F: Fn() -> Result<ArrayRef> + Send + Sync,
{
    fn load(&self) -> Result<ArrayRef> {
        self()
    }
}

/// A column whose values are decoded on first use.
///
/// Loading runs the loader at most once; later calls return the cached vector.
pub struct LazyVector {
    data_type: DataType,
    len: usize,
    loader: Box<dyn VectorLoader>,
    loaded: Mutex<Option<VectorRef>>,
}

impl LazyVector {
    /// Creates a lazy vector of `len` rows of `data_type`.
    pub fn new(data_type: DataType, len: usize, loader: impl VectorLoader + 'static) -> Self {
        LazyVector {
            data_type,
            len,
            loader: Box::new(loader),
            loaded: Mutex::new(None),
        }
    }

    /// Returns the declared data type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns the declared row count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the vector declares zero rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true once the loader has run successfully.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.lock().is_some()
    }

    /// Returns the loaded vector, if loading already happened.
    #[must_use]
    pub fn loaded(&self) -> Option<VectorRef> {
        self.loaded.lock().clone()
    }

    /// Loads the vector, running the loader on the first call only.
    ///
    /// # Errors
    ///
    /// Returns `LazyLoad` if the loader fails or yields a column that does not
    /// match the declared type and length.
    pub fn load(&self) -> Result<VectorRef> {
        let mut slot = self.loaded.lock();
        if let Some(vector) = slot.as_ref() {
            return Ok(Arc::clone(vector));
        }

        let array = self.loader.load()?;
        if array.len() != self.len {
            return Err(ExecError::LazyLoad(format!(
                "loader produced {} rows, expected {}",
                array.len(),
                self.len
            )));
        }
        let vector = Vector::from_array(array)?;
        if vector.data_type() != self.data_type {
            return Err(ExecError::LazyLoad(format!(
                "loader produced {}, expected {}",
                vector.data_type(),
                self.data_type
            )));
        }

        let vector = Arc::new(vector);
        *slot = Some(Arc::clone(&vector));
        Ok(vector)
    }
}

impl fmt::Debug for LazyVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyVector")
            .field("data_type", &self.data_type)
            .field("len", &self.len)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
