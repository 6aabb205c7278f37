use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use stepgraph_core::error::{Result, StepGraphError};
use stepgraph_core::traits::Storage;
use stepgraph_core::types::{ExecutionRecord, GraphId, RunId, RunState, RunStatus, State};

/// Per-run state access on top of a `Storage` backend.
///
/// Every read hands out a copy; callers never hold a live reference into a
/// stored run.
pub struct StateManager {
    storage: Arc<dyn Storage>,
}

impl StateManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Start a new run in `Running` status.
    pub fn create(&self, run_id: &RunId, graph_id: &GraphId, initial_state: State) -> Result<RunState> {
        let run = RunState::new(run_id.clone(), graph_id.clone(), initial_state);
        self.storage.save_run(run_id, run.clone())?;
        debug!(run_id = %run_id, graph_id = %graph_id, "Run created");
        Ok(run)
    }

    /// Copy of the run's current state.
    pub fn get_state(&self, run_id: &RunId) -> Result<State> {
        Ok(self.storage.load_run(run_id)?.current_state)
    }

    /// Copy of the full run record.
    pub fn get_run(&self, run_id: &RunId) -> Result<RunState> {
        self.storage.load_run(run_id)
    }

    /// Shallow-merge `updates` into the run state; returns the merged state.
    pub fn merge_state(&self, run_id: &RunId, updates: State) -> Result<State> {
        let mut updates = Some(updates);
        let run = self.storage.update_run(run_id, &mut |run| {
            if let Some(updates) = updates.take() {
                run.current_state.extend(updates);
            }
        })?;
        Ok(run.current_state)
    }

    /// Replace the run state wholesale.
    pub fn replace_state(&self, run_id: &RunId, state: State) -> Result<()> {
        let mut state = Some(state);
        self.storage.update_run(run_id, &mut |run| {
            if let Some(state) = state.take() {
                run.current_state = state;
            }
        })?;
        Ok(())
    }

    /// Append one entry to the run's trace.
    pub fn append_record(&self, run_id: &RunId, record: ExecutionRecord) -> Result<()> {
        let mut record = Some(record);
        self.storage.update_run(run_id, &mut |run| {
            if let Some(record) = record.take() {
                run.trace.push(record);
            }
        })?;
        Ok(())
    }

    /// Move a running run to its terminal status and stamp completion.
    ///
    /// Allowed exactly once, and only to `Completed` or `Failed`.
    pub fn finalize(&self, run_id: &RunId, status: RunStatus, error: Option<String>) -> Result<RunState> {
        let mut rejected_from = None;
        let mut error = error;
        let run = self.storage.update_run(run_id, &mut |run| {
            if run.status.is_terminal() || !status.is_terminal() {
                rejected_from = Some(run.status);
                return;
            }
            run.status = status;
            run.completed_at = Some(Utc::now());
            run.error = error.take();
        })?;

        if let Some(from) = rejected_from {
            warn!(run_id = %run_id, %from, to = %status, "Rejected run status transition");
            return Err(StepGraphError::InvalidTransition {
                run_id: run_id.to_string(),
                from: from.to_string(),
                to: status.to_string(),
            });
        }
        Ok(run)
    }
}
