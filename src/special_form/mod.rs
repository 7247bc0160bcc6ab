//! Special forms: function names compiled into custom executable nodes.
//!
//! Some calls cannot be evaluated as a uniform per-row function: boolean
//! connectives short-circuit, `if` evaluates branches lazily, `try` swallows
//! errors, and `decimal_round` derives its result type from a literal. Each
//! such name maps to a [`SpecialForm`] strategy in a [`SpecialFormRegistry`].
//!
//! The registry is built once with [`SpecialFormRegistryBuilder`] and is
//! immutable afterwards. A host installs its snapshot process-wide with
//! [`initialize_special_forms`] during startup, before any compilation.

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::config::QueryConfig;
use crate::error::{ExecError, Result};
use crate::expr::{ExprPtr, TypedInput};
use crate::types::DataType;

pub use builtin::{
    register_builtin_special_forms, AndForm, CoalesceForm, DecimalRoundForm, IfForm, OrForm,
    TryForm,
};

/// Compilation strategy for one special-form name.
///
/// Type resolution and construction are separate so a compiler can resolve
/// the type of every node in a tree before constructing any of them.
pub trait SpecialForm: Send + Sync {
    /// Resolves the result type from argument types alone.
    ///
    /// Returns `Ok(None)` when the type depends on argument values.
    ///
    /// # Errors
    ///
    /// Returns `TypeResolution` if the arity or argument types are invalid.
    fn resolve_type(&self, arg_types: &[DataType]) -> Result<Option<DataType>>;

    /// Resolves the result type from the argument expressions.
    ///
    /// Only forms whose type depends on a literal argument override this.
    ///
    /// # Errors
    ///
    /// Returns `TypeResolution` if a required literal is missing or invalid.
    fn resolve_type_from_inputs(&self, _inputs: &[TypedInput<'_>]) -> Result<Option<DataType>> {
        Ok(None)
    }

    /// Builds the executable node.
    ///
    /// Must succeed for every input on which type resolution succeeded.
    fn construct(
        &self,
        data_type: DataType,
        children: Vec<ExprPtr>,
        track_cpu_usage: bool,
        config: &QueryConfig,
    ) -> ExprPtr;
}

/// Mutable registration phase of a [`SpecialFormRegistry`].
#[derive(Default)]
pub struct SpecialFormRegistryBuilder {
    forms: HashMap<String, Arc<dyn SpecialForm>>,
}

impl SpecialFormRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `form` under `name`.
    ///
    /// Returns `true` when an existing form was replaced.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if `name` is taken and `overwrite` is false.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        form: Arc<dyn SpecialForm>,
        overwrite: bool,
    ) -> Result<bool> {
        let name = name.into();
        if !overwrite && self.forms.contains_key(&name) {
            return Err(ExecError::Registry(format!(
                "special form '{name}' is already registered"
            )));
        }
        debug!(name = %name, "registering special form");
        Ok(self.forms.insert(name, form).is_some())
    }

    /// Returns true if `name` has been registered so far.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.forms.contains_key(name)
    }

    /// Freezes the registrations.
    #[must_use]
    pub fn build(self) -> SpecialFormRegistry {
        SpecialFormRegistry { forms: self.forms }
    }
}

/// Immutable mapping from function name to special-form strategy.
///
/// Safe for concurrent lookups.
#[derive(Default)]
pub struct SpecialFormRegistry {
    forms: HashMap<String, Arc<dyn SpecialForm>>,
}

impl fmt::Debug for SpecialFormRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecialFormRegistry")
            .field("forms", &self.names())
            .finish()
    }
}

impl SpecialFormRegistry {
    /// Starts a new registration phase.
    #[must_use]
    pub fn builder() -> SpecialFormRegistryBuilder {
        SpecialFormRegistryBuilder::new()
    }

    /// A registry with no special forms.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding the built-in forms under their plain names.
    ///
    /// # Errors
    ///
    /// Never fails for an empty builder; the signature follows
    /// [`register_builtin_special_forms`].
    pub fn with_builtins() -> Result<Self> {
        let mut builder = Self::builder();
        register_builtin_special_forms(&mut builder, "", false)?;
        Ok(builder.build())
    }

    /// Returns true if `name` is a registered special form.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.forms.contains_key(name)
    }

    /// Returns the strategy registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn SpecialForm>> {
        self.forms.get(name)
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names = self.forms.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Number of registered forms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forms.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Resolves `name`'s result type from argument types.
    ///
    /// Returns `Ok(None)` for unregistered names.
    ///
    /// # Errors
    ///
    /// Propagates the form's `TypeResolution` error.
    pub fn resolve_type(&self, name: &str, arg_types: &[DataType]) -> Result<Option<DataType>> {
        match self.forms.get(name) {
            Some(form) => form.resolve_type(arg_types),
            None => Ok(None),
        }
    }

    /// Resolves `name`'s result type from argument expressions.
    ///
    /// Returns `Ok(None)` for unregistered names.
    ///
    /// # Errors
    ///
    /// Propagates the form's `TypeResolution` error.
    pub fn resolve_type_from_inputs(
        &self,
        name: &str,
        inputs: &[TypedInput<'_>],
    ) -> Result<Option<DataType>> {
        match self.forms.get(name) {
            Some(form) => form.resolve_type_from_inputs(inputs),
            None => Ok(None),
        }
    }

    /// Constructs `name`'s executable node, or None for unregistered names.
    #[must_use]
    pub fn construct(
        &self,
        name: &str,
        data_type: DataType,
        children: Vec<ExprPtr>,
        track_cpu_usage: bool,
        config: &QueryConfig,
    ) -> Option<ExprPtr> {
        self.forms
            .get(name)
            .map(|form| form.construct(data_type, children, track_cpu_usage, config))
    }
}

fn global_slot() -> &'static OnceLock<Arc<SpecialFormRegistry>> {
    static REGISTRY: OnceLock<Arc<SpecialFormRegistry>> = OnceLock::new();
    &REGISTRY
}

/// Installs the process-wide special-form registry.
///
/// Call once during engine startup, before any compilation begins.
///
/// # Errors
///
/// Returns `Registry` if a registry has already been installed.
pub fn initialize_special_forms(registry: SpecialFormRegistry) -> Result<Arc<SpecialFormRegistry>> {
    let registry = Arc::new(registry);
    global_slot()
        .set(Arc::clone(&registry))
        .map_err(|_| ExecError::Registry("special forms are already initialized".to_string()))?;
    debug!(forms = registry.len(), "special-form registry initialized");
    Ok(registry)
}

/// Returns the process-wide registry, if one has been installed.
#[must_use]
pub fn global_special_forms() -> Option<Arc<SpecialFormRegistry>> {
    global_slot().get().cloned()
}

/// Returns true iff `name` is registered in the process-wide registry.
#[must_use]
pub fn is_special_form_registered(name: &str) -> bool {
    global_slot()
        .get()
        .is_some_and(|registry| registry.is_registered(name))
}

/// Process-wide [`SpecialFormRegistry::resolve_type`].
///
/// # Errors
///
/// Propagates the form's `TypeResolution` error.
pub fn resolve_type_for_special_form(
    name: &str,
    arg_types: &[DataType],
) -> Result<Option<DataType>> {
    match global_slot().get() {
        Some(registry) => registry.resolve_type(name, arg_types),
        None => Ok(None),
    }
}

/// Process-wide [`SpecialFormRegistry::resolve_type_from_inputs`].
///
/// # Errors
///
/// Propagates the form's `TypeResolution` error.
pub fn resolve_type_for_special_form_inputs(
    name: &str,
    inputs: &[TypedInput<'_>],
) -> Result<Option<DataType>> {
    match global_slot().get() {
        Some(registry) => registry.resolve_type_from_inputs(name, inputs),
        None => Ok(None),
    }
}

/// Process-wide [`SpecialFormRegistry::construct`].
#[must_use]
pub fn construct_special_form(
    name: &str,
    data_type: DataType,
    children: Vec<ExprPtr>,
    track_cpu_usage: bool,
    config: &QueryConfig,
) -> Option<ExprPtr> {
    global_slot()
        .get()
        .and_then(|registry| registry.construct(name, data_type, children, track_cpu_usage, config))
}
