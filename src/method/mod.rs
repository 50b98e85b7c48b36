//! Remote methods: name → handler registry and the call outcome type.
//!
//! Handlers are registered explicitly at startup and looked up by exact
//! name when a client sends a `method` request.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Result of a method invocation as seen by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutcome {
    /// Sent back in a `Success` envelope.
    Success(Value),
    /// Sent back in an `Error` envelope.
    Failure(Value),
}

impl MethodOutcome {
    /// Classifies a bare return value: falsy values fail, everything else
    /// succeeds. Both carry the value unchanged.
    ///
    /// A handler using this adapter cannot report an empty success; return
    /// [`MethodOutcome::Success`] directly for that.
    #[must_use]
    pub fn from_truthiness(value: Value) -> Self {
        if is_truthy(&value) {
            Self::Success(value)
        } else {
            Self::Failure(value)
        }
    }

    /// Returns `true` for [`MethodOutcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Returns `false` for `null`, `false`, zero, and empty strings, arrays and
/// objects.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// A named server-side procedure callable from the client.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Runs the procedure with the caller-supplied argument.
    async fn call(&self, params: Value) -> MethodOutcome;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> MethodHandler for FnHandler<F>
where
    F: Fn(Value) -> MethodOutcome + Send + Sync,
{
    async fn call(&self, params: Value) -> MethodOutcome {
        (self.0)(params)
    }
}

/// Registered methods, keyed by exact name.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    handlers: BTreeMap<String, Arc<dyn MethodHandler>>,
}

impl MethodRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn MethodHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Registers a synchronous closure under `name`.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value) -> MethodOutcome + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnHandler(f)));
    }

    /// Looks up a handler by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn MethodHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Returns the registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
