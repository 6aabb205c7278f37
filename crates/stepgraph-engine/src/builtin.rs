//! Generic handlers available in every `HandlerRegistry::with_builtins()`.

use futures::future::BoxFuture;
use serde_json::{json, Value};

use stepgraph_core::traits::Handler;
use stepgraph_core::types::State;

/// Does nothing; the state passes through unchanged.
pub struct NoopHandler;

impl Handler for NoopHandler {
    fn name(&self) -> &str {
        "noop"
    }

    fn call(&self, _state: State) -> BoxFuture<'_, anyhow::Result<Value>> {
        Box::pin(async { Ok(Value::Null) })
    }
}

/// Increments the integer `ticks` key (missing counts as 0).
///
/// Pairs with a loop policy such as `ticks lt 5` to run a node a fixed
/// number of times.
pub struct TickHandler;

impl Handler for TickHandler {
    fn name(&self) -> &str {
        "tick"
    }

    fn call(&self, state: State) -> BoxFuture<'_, anyhow::Result<Value>> {
        let result = match state.get("ticks") {
            None | Some(Value::Null) => Ok(json!({ "ticks": 1 })),
            Some(v) => v
                .as_i64()
                .map(|ticks| json!({ "ticks": ticks + 1 }))
                .ok_or_else(|| anyhow::anyhow!("'ticks' must be an integer, got {}", v)),
        };
        Box::pin(async move { result })
    }
}
