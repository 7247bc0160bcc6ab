//! Error types for the execution core.

use thiserror::Error;

/// Result type alias using [`ExecError`].
pub type Result<T> = std::result::Result<T, ExecError>;

/// Error types for operator construction, expression compilation and execution.
#[derive(Debug, Error)]
pub enum ExecError {
    // ==================== Construction Errors ====================
    /// Plan or projection validation failure (unknown column, width mismatch).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Expression kind not supported in this position.
    #[error("Unsupported expression: {message}. {expression}")]
    UnsupportedExpression { message: String, expression: String },

    /// Batch or column shape mismatch.
    #[error("Schema error: {0}")]
    SchemaError(String),

    // ==================== Compilation Errors ====================
    /// A special form or function rejected its argument types.
    #[error("Type resolution error for '{function}': {message}")]
    TypeResolution { function: String, message: String },

    /// Call to a name that is neither a special form nor a known function.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Special-form registry misuse (duplicate name, double initialisation).
    #[error("Registry error: {0}")]
    Registry(String),

    // ==================== Runtime Errors ====================
    /// Pull protocol called out of order.
    #[error("Protocol violation in {operator}: {message}")]
    ProtocolViolation { operator: String, message: String },

    /// Deferred decode failed or its source is gone.
    #[error("Lazy load error: {0}")]
    LazyLoad(String),

    /// Memory limit exceeded during query execution.
    #[error("Memory limit exceeded: {used} bytes used, limit is {limit} bytes")]
    MemoryLimitExceeded { used: usize, limit: usize },

    /// General execution errors.
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Error bubbled up from an Arrow kernel.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl ExecError {
    /// Creates a type resolution error for `function`.
    pub fn type_resolution(function: impl Into<String>, message: impl Into<String>) -> Self {
        ExecError::TypeResolution {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol violation error for `operator`.
    pub fn protocol(operator: impl Into<String>, message: impl Into<String>) -> Self {
        ExecError::ProtocolViolation {
            operator: operator.into(),
            message: message.into(),
        }
    }
}
