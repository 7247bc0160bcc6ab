//! Session configuration forwarded into expression and operator construction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default batch size for vectorized execution (rows per batch).
pub const DEFAULT_BATCH_SIZE: usize = 2048;

/// Configuration for one query session.
///
/// The execution core reads only the typed fields. Everything else travels in
/// `properties` and is handed to special forms untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Number of rows per batch for vectorized execution.
    pub batch_size: usize,
    /// Limit on live pool bytes (0 = unlimited).
    pub memory_limit: usize,
    /// Whether compiled expressions record invocation counts and timings.
    pub track_expression_cpu_usage: bool,
    /// Free-form session properties.
    pub properties: HashMap<String, String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            memory_limit: 0,
            track_expression_cpu_usage: false,
            properties: HashMap::new(),
        }
    }
}

impl QueryConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the memory limit in bytes.
    #[must_use]
    pub fn with_memory_limit(mut self, memory_limit: usize) -> Self {
        self.memory_limit = memory_limit;
        self
    }

    /// Enables or disables expression cost tracking.
    #[must_use]
    pub fn with_expression_cpu_tracking(mut self, enabled: bool) -> Self {
        self.track_expression_cpu_usage = enabled;
        self
    }

    /// Sets a free-form session property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns a session property, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}
