use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::graph::GraphDefinition;
use crate::types::{GraphId, RunId, RunState, State};

/// The unit of work a node invokes.
///
/// Receives its own copy of the run state. Returning a JSON object merges it
/// into the run state (shallow, last write wins); any other value leaves the
/// state untouched. An error fails the run.
pub trait Handler: Send + Sync + 'static {
    /// Name nodes use to reference this handler.
    fn name(&self) -> &str;

    fn call(&self, state: State) -> BoxFuture<'_, anyhow::Result<serde_json::Value>>;
}

/// Graph definitions and run records keyed by opaque id.
///
/// Last write wins; no versioning. Implementations serialize access per key
/// so unrelated runs never block one another.
pub trait Storage: Send + Sync + 'static {
    /// Persist a graph definition (overwrites).
    fn save_graph(&self, id: &GraphId, definition: GraphDefinition) -> Result<()>;

    /// Fetch a graph definition, or `GraphNotFound`.
    fn load_graph(&self, id: &GraphId) -> Result<Arc<GraphDefinition>>;

    fn has_graph(&self, id: &GraphId) -> bool;

    /// Persist a run record (overwrites).
    fn save_run(&self, id: &RunId, run: RunState) -> Result<()>;

    /// Fetch a copy of a run record, or `RunNotFound`.
    fn load_run(&self, id: &RunId) -> Result<RunState>;

    /// Mutate a run record in place while holding its lock. Returns a copy of
    /// the record after the mutation.
    fn update_run(&self, id: &RunId, apply: &mut dyn FnMut(&mut RunState)) -> Result<RunState>;
}
