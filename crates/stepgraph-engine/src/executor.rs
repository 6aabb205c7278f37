use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use stepgraph_core::config::EngineConfig;
use stepgraph_core::error::{Result, StepGraphError};
use stepgraph_core::types::{
    ExecutionRecord, GraphId, Outcome, RunId, RunOutcome, RunState, RunStatus, State,
};
use stepgraph_core::GraphDefinition;

use crate::condition::evaluate;
use crate::graphs::GraphManager;
use crate::registry::HandlerRegistry;
use crate::state::StateManager;

/// Walks a graph from its entry node to termination.
///
/// One node runs at a time per run. After each node the executor first
/// consults the node's loop policy (if any), and only falls through to edge
/// selection when the loop does not continue. Edges are tried in declaration
/// order and the first whose condition holds wins; when none match the run
/// completes.
///
/// Cycles formed by plain edges are not limited here. Only loop policies,
/// the optional `max_steps` ceiling, and the cancellation token bound a run.
pub struct WorkflowExecutor {
    graphs: Arc<GraphManager>,
    states: Arc<StateManager>,
    registry: Arc<HandlerRegistry>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl WorkflowExecutor {
    pub fn new(
        graphs: Arc<GraphManager>,
        states: Arc<StateManager>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            graphs,
            states,
            registry,
            config: EngineConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an externally owned token, e.g. the process shutdown token.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token checked before every node execution. Cancelling it fails every
    /// run of this executor that is still in flight, and every later one.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `graph_id` to completion from `initial_state`.
    ///
    /// Only an unknown graph (or a storage failure) is an `Err`. Anything
    /// that goes wrong while traversing is reported inside the outcome with
    /// `status = Failed`, the state as of the failure, and the trace so far.
    pub async fn execute(&self, graph_id: &GraphId, initial_state: State) -> Result<RunOutcome> {
        let graph = self.graphs.get_graph(graph_id)?;
        let run_id = RunId::new();
        self.states.create(&run_id, graph_id, initial_state)?;

        info!(run_id = %run_id, graph_id = %graph_id, graph = %graph.name, "Run started");
        let start = Instant::now();

        let run = match self.traverse(&run_id, &graph).await {
            Ok(()) => self.states.finalize(&run_id, RunStatus::Completed, None)?,
            Err(e) => {
                if e.is_run_failure() {
                    warn!(run_id = %run_id, kind = e.kind(), error = %e, "Run failed");
                } else {
                    error!(run_id = %run_id, kind = e.kind(), error = %e, "Run aborted");
                }
                self.states
                    .finalize(&run_id, RunStatus::Failed, Some(e.to_string()))?
            }
        };

        info!(
            run_id = %run_id,
            status = %run.status,
            steps = run.trace.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Run finished"
        );

        Ok(outcome(run))
    }

    /// Copy of a run record, or `RunNotFound`.
    pub fn run_state(&self, run_id: &RunId) -> Result<RunState> {
        self.states.get_run(run_id)
    }

    async fn traverse(&self, run_id: &RunId, graph: &GraphDefinition) -> Result<()> {
        let mut current = Some(graph.entry_node.clone());
        let mut loop_counts: HashMap<String, u32> = HashMap::new();
        let mut steps = 0usize;

        while let Some(node_name) = current.take() {
            if self.cancel.is_cancelled() {
                return Err(StepGraphError::Cancelled);
            }
            if let Some(max_steps) = self.config.max_steps {
                if steps >= max_steps {
                    return Err(StepGraphError::StepLimitExceeded(max_steps));
                }
            }
            steps += 1;

            let state = self.execute_node(run_id, graph, &node_name).await?;

            if let Some(policy) = graph.loop_policy(&node_name) {
                let count = loop_counts.entry(node_name.clone()).or_insert(0);
                *count += 1;
                let count = *count;

                let repeat = evaluate(&policy.condition, &state);
                // Another pass would run the node more than the ceiling allows.
                if count > policy.max_iterations || (repeat && count >= policy.max_iterations) {
                    return Err(StepGraphError::LoopLimitExceeded {
                        node: node_name,
                        max_iterations: policy.max_iterations,
                    });
                }

                if repeat {
                    debug!(run_id = %run_id, node = %node_name, iteration = count, "Loop continues");
                    current = Some(node_name);
                    continue;
                }
                debug!(run_id = %run_id, node = %node_name, iterations = count, "Loop exited");
            }

            current = next_node(graph, &node_name, &state);
            match &current {
                Some(next) => debug!(run_id = %run_id, from = %node_name, to = %next, "Following edge"),
                None => debug!(run_id = %run_id, node = %node_name, "No edge matched, run complete"),
            }
        }

        Ok(())
    }

    /// Run one node and record it. Returns the run state afterwards.
    async fn execute_node(
        &self,
        run_id: &RunId,
        graph: &GraphDefinition,
        node_name: &str,
    ) -> Result<State> {
        let node = graph
            .node(node_name)
            .ok_or_else(|| StepGraphError::NodeExecution {
                node: node_name.to_string(),
                message: "node is not defined in the graph".to_string(),
            })?;
        let handler = self.registry.resolve(&node.handler)?;

        let state_before = self.states.get_state(run_id)?;
        let timestamp = Utc::now();
        let started = Instant::now();

        debug!(run_id = %run_id, node = %node.name, handler = %node.handler, "Executing node");

        let input = state_before.clone();
        let result = match AssertUnwindSafe(async { handler.call(input).await })
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                error!(run_id = %run_id, node = %node.name, error = %e, "Node handler failed");
                return Err(StepGraphError::NodeExecution {
                    node: node.name.clone(),
                    message: format!("{:#}", e),
                });
            }
            Err(_) => {
                error!(run_id = %run_id, node = %node.name, "Node handler panicked");
                return Err(StepGraphError::NodeExecution {
                    node: node.name.clone(),
                    message: "handler panicked".to_string(),
                });
            }
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let state_after = match result {
            Value::Object(updates) => self.states.merge_state(run_id, updates)?,
            _ => self.states.get_state(run_id)?,
        };

        debug!(run_id = %run_id, node = %node.name, duration_ms, "Node complete");

        self.states.append_record(
            run_id,
            ExecutionRecord {
                node: node.name.clone(),
                timestamp,
                duration_ms,
                state_before,
                state_after: state_after.clone(),
                outcome: Outcome::Success,
            },
        )?;

        Ok(state_after)
    }
}

/// Target of the first edge out of `node` whose condition is absent or holds.
fn next_node(graph: &GraphDefinition, node: &str, state: &State) -> Option<String> {
    graph
        .outgoing(node)
        .find(|edge| {
            edge.condition
                .as_ref()
                .map_or(true, |condition| evaluate(condition, state))
        })
        .map(|edge| edge.target.clone())
}

fn outcome(run: RunState) -> RunOutcome {
    RunOutcome {
        run_id: run.run_id,
        graph_id: run.graph_id,
        status: run.status,
        final_state: run.current_state,
        trace: run.trace,
        error: run.error,
    }
}
