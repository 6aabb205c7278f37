use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use stepgraph_core::error::{Result, StepGraphError};
use stepgraph_core::traits::Handler;
use stepgraph_core::types::State;

/// Registry of handlers nodes can invoke, keyed by name.
///
/// Built by the caller and handed to the executor; there is no global
/// instance.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous one with the same name.
    pub fn register(&mut self, handler: impl Handler) {
        let name = handler.name().to_string();
        self.handlers.insert(name, Arc::new(handler));
    }

    /// Register a synchronous closure as a handler.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(State) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register(FnHandler {
            name: name.into(),
            func,
        });
    }

    /// Unregister a handler by name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    /// Get a handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered handler names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Get a handler by name, or `ToolNotFound`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Handler>> {
        self.get(name)
            .ok_or_else(|| StepGraphError::ToolNotFound(name.to_string()))
    }

    /// Create a registry with the built-in handlers registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(crate::builtin::NoopHandler);
        registry.register(crate::builtin::TickHandler);
        registry
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapter turning a plain closure into a `Handler`.
struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(State) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, state: State) -> BoxFuture<'_, anyhow::Result<Value>> {
        let result = (self.func)(state);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_fn_and_call() {
        let mut registry = HandlerRegistry::new();
        registry.register_fn("double", |state| {
            let x = state.get("x").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(json!({ "x": x * 2 }))
        });

        let handler = registry.resolve("double").unwrap();
        assert_eq!(handler.name(), "double");

        let mut state = State::new();
        state.insert("x".into(), json!(21));
        assert_eq!(handler.call(state).await.unwrap(), json!({"x": 42}));
    }

    #[test]
    fn test_resolve_missing() {
        let registry = HandlerRegistry::new();
        let err = registry.resolve("nope").err().unwrap();
        assert!(matches!(err, StepGraphError::ToolNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = HandlerRegistry::new();
        registry.register_fn("h", |_| Ok(json!(1)));
        registry.register_fn("h", |_| Ok(json!(2)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_and_list() {
        let mut registry = HandlerRegistry::with_builtins();
        assert_eq!(registry.list(), vec!["noop", "tick"]);
        assert!(registry.unregister("noop"));
        assert!(!registry.unregister("noop"));
        assert!(!registry.has("noop"));
        assert!(registry.has("tick"));
    }

    #[test]
    fn test_instances_are_independent() {
        let mut a = HandlerRegistry::new();
        let b = HandlerRegistry::new();
        a.register_fn("only_in_a", |_| Ok(Value::Null));
        assert!(a.has("only_in_a"));
        assert!(!b.has("only_in_a"));
        assert!(b.is_empty());
    }
}
