//! Scripted handlers and fixture graphs shared by the stepgraph test suites.
//!
//! Handlers here implement `stepgraph_core::traits::Handler` directly so any
//! registry can take them via `register(...)`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::{json, Value};

use stepgraph_core::traits::Handler;
use stepgraph_core::types::State;
use stepgraph_core::{Condition, Edge, GraphDefinition, LoopPolicy, Node, Operator};

/// Build a `State` from a `json!({...})` literal. Non-objects give an empty state.
pub fn state(value: Value) -> State {
    value.as_object().cloned().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Always returns the same value.
pub struct ConstHandler {
    name: String,
    value: Value,
}

impl ConstHandler {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl Handler for ConstHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, _state: State) -> BoxFuture<'_, anyhow::Result<Value>> {
        let value = self.value.clone();
        Box::pin(async move { Ok(value) })
    }
}

/// Adds `step` to an integer key on every call (missing counts as 0).
pub struct CounterHandler {
    name: String,
    key: String,
    step: i64,
}

impl CounterHandler {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            step: 1,
        }
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }
}

impl Handler for CounterHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, state: State) -> BoxFuture<'_, anyhow::Result<Value>> {
        let current = state.get(&self.key).and_then(Value::as_i64).unwrap_or(0);
        let mut update = State::new();
        update.insert(self.key.clone(), json!(current + self.step));
        Box::pin(async move { Ok(Value::Object(update)) })
    }
}

/// Returns the scripted values in order, repeating the last one once exhausted.
pub struct SequenceHandler {
    name: String,
    values: Vec<Value>,
    cursor: AtomicUsize,
}

impl SequenceHandler {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Handler for SequenceHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, _state: State) -> BoxFuture<'_, anyhow::Result<Value>> {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        let value = self
            .values
            .get(idx)
            .or_else(|| self.values.last())
            .cloned()
            .unwrap_or(Value::Null);
        Box::pin(async move { Ok(value) })
    }
}

/// Always fails with `message`.
pub struct FailingHandler {
    name: String,
    message: String,
}

impl FailingHandler {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl Handler for FailingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, _state: State) -> BoxFuture<'_, anyhow::Result<Value>> {
        let message = self.message.clone();
        Box::pin(async move { Err(anyhow::anyhow!(message)) })
    }
}

/// Panics when called.
pub struct PanickingHandler {
    name: String,
}

impl PanickingHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Handler for PanickingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, _state: State) -> BoxFuture<'_, anyhow::Result<Value>> {
        Box::pin(async { panic!("scripted panic") })
    }
}

/// Records a copy of every state it receives, then mutates its own copy.
///
/// The mutation lets tests check that nothing a handler does to its input
/// leaks back into the run.
pub struct RecordingHandler {
    name: String,
    seen: Arc<Mutex<Vec<State>>>,
}

impl RecordingHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared view of the recorded inputs, usable after the handler moves
    /// into a registry.
    pub fn seen(&self) -> Arc<Mutex<Vec<State>>> {
        self.seen.clone()
    }
}

impl Handler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, mut state: State) -> BoxFuture<'_, anyhow::Result<Value>> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(state.clone());
        }
        state.insert("scribbled".into(), json!(true));
        state.clear();
        Box::pin(async { Ok(Value::Null) })
    }
}

// ---------------------------------------------------------------------------
// Fixture graphs
// ---------------------------------------------------------------------------

/// `first -> second`, both bound to `handler`.
pub fn two_node_graph(handler: &str) -> GraphDefinition {
    GraphDefinition::new("two_node", "first")
        .with_node(Node::new("first", handler))
        .with_node(Node::new("second", handler))
        .with_edge(Edge::always("first", "second"))
}

/// `start` routes on `x`: `< 5` to `low`, `< 10` to `mid`, otherwise `high`.
pub fn branching_graph() -> GraphDefinition {
    GraphDefinition::new("branching", "start")
        .with_node(Node::new("start", "noop"))
        .with_node(Node::new("low", "mark_low"))
        .with_node(Node::new("mid", "mark_mid"))
        .with_node(Node::new("high", "mark_high"))
        .with_edge(Edge::when("start", "low", Condition::new("x", Operator::Lt, 5)))
        .with_edge(Edge::when("start", "mid", Condition::new("x", Operator::Lt, 10)))
        .with_edge(Edge::always("start", "high"))
}

/// A single node re-run by its loop policy while `ticks < until`.
pub fn tick_loop_graph(until: i64, max_iterations: u32) -> GraphDefinition {
    GraphDefinition::new("tick_loop", "count")
        .with_node(Node::new("count", "tick"))
        .with_loop(
            "count",
            LoopPolicy::new(Condition::new("ticks", Operator::Lt, until))
                .with_max_iterations(max_iterations),
        )
}

/// Node `spin` with an unconditional edge to itself and no loop policy.
pub fn self_edge_graph(handler: &str) -> GraphDefinition {
    GraphDefinition::new("self_edge", "spin")
        .with_node(Node::new("spin", handler))
        .with_edge(Edge::always("spin", "spin"))
}

/// Four-stage review pipeline whose last stage loops while
/// `quality_score < threshold`, at most 5 times.
///
/// Handlers: `extract_functions`, `check_complexity`, `detect_issues`,
/// `suggest_improvements`.
pub fn review_loop_graph(threshold: f64) -> GraphDefinition {
    let below = Condition::new("quality_score", Operator::Lt, threshold);
    GraphDefinition::new("code_review", "extract")
        .with_node(
            Node::new("extract", "extract_functions")
                .with_description("Extract function definitions from code"),
        )
        .with_node(
            Node::new("complexity", "check_complexity")
                .with_description("Calculate code complexity score"),
        )
        .with_node(Node::new("issues", "detect_issues").with_description("Detect code issues"))
        .with_node(
            Node::new("improve", "suggest_improvements")
                .with_description("Generate improvement suggestions"),
        )
        .with_edge(Edge::always("extract", "complexity"))
        .with_edge(Edge::always("complexity", "issues"))
        .with_edge(Edge::always("issues", "improve"))
        .with_edge(Edge::when("improve", "complexity", below.clone()))
        .with_loop("improve", LoopPolicy::new(below).with_max_iterations(5))
}

/// Write `graph` as JSON into a fresh temp dir. Keep the dir alive while the
/// path is in use.
pub fn write_graph_file(graph: &GraphDefinition) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("graph.json");
    let body = serde_json::to_string_pretty(graph).expect("serialize graph");
    std::fs::write(&path, body).expect("write graph file");
    (dir, path)
}
