use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use stepgraph_core::error::{Result, StepGraphError};
use stepgraph_core::traits::Storage;
use stepgraph_core::types::{GraphId, RunId, RunState};
use stepgraph_core::GraphDefinition;

/// Process-local storage for graphs and runs.
///
/// Graphs are immutable once saved and shared as `Arc`s. Each run lives
/// behind its own mutex; the index lock is only held long enough to find or
/// insert an entry, so runs never wait on each other while being mutated.
pub struct MemoryStore {
    graphs: RwLock<HashMap<String, Arc<GraphDefinition>>>,
    runs: RwLock<HashMap<String, Arc<Mutex<RunState>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            graphs: RwLock::new(HashMap::new()),
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every graph and run.
    pub fn clear(&self) {
        write_lock(&self.graphs).clear();
        write_lock(&self.runs).clear();
    }

    pub fn graph_count(&self) -> usize {
        read_lock(&self.graphs).len()
    }

    pub fn run_count(&self) -> usize {
        read_lock(&self.runs).len()
    }

    fn run_slot(&self, id: &RunId) -> Result<Arc<Mutex<RunState>>> {
        read_lock(&self.runs)
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StepGraphError::RunNotFound(id.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStore {
    fn save_graph(&self, id: &GraphId, definition: GraphDefinition) -> Result<()> {
        write_lock(&self.graphs).insert(id.to_string(), Arc::new(definition));
        debug!(graph_id = %id, "Graph saved");
        Ok(())
    }

    fn load_graph(&self, id: &GraphId) -> Result<Arc<GraphDefinition>> {
        read_lock(&self.graphs)
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StepGraphError::GraphNotFound(id.to_string()))
    }

    fn has_graph(&self, id: &GraphId) -> bool {
        read_lock(&self.graphs).contains_key(id.as_str())
    }

    fn save_run(&self, id: &RunId, run: RunState) -> Result<()> {
        if let Ok(slot) = self.run_slot(id) {
            *lock(&slot) = run;
            return Ok(());
        }
        write_lock(&self.runs)
            .entry(id.to_string())
            .and_modify(|slot| *lock(slot) = run.clone())
            .or_insert_with(|| Arc::new(Mutex::new(run.clone())));
        Ok(())
    }

    fn load_run(&self, id: &RunId) -> Result<RunState> {
        let slot = self.run_slot(id)?;
        let run = lock(&slot).clone();
        Ok(run)
    }

    fn update_run(&self, id: &RunId, apply: &mut dyn FnMut(&mut RunState)) -> Result<RunState> {
        let slot = self.run_slot(id)?;
        let mut run = lock(&slot);
        apply(&mut *run);
        Ok(run.clone())
    }
}

// A poisoned lock only means another thread panicked mid-write; the map
// itself is still usable.
fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepgraph_core::types::{RunStatus, State};
    use stepgraph_core::Node;

    fn graph() -> GraphDefinition {
        GraphDefinition::new("g", "a").with_node(Node::new("a", "noop"))
    }

    #[test]
    fn test_graph_roundtrip() {
        let store = MemoryStore::new();
        let id = GraphId::new();
        assert!(!store.has_graph(&id));

        store.save_graph(&id, graph()).unwrap();
        assert!(store.has_graph(&id));
        assert_eq!(store.load_graph(&id).unwrap().name, "g");
        assert_eq!(store.graph_count(), 1);
    }

    #[test]
    fn test_missing_graph() {
        let store = MemoryStore::new();
        let err = store.load_graph(&GraphId::from_string("nope")).unwrap_err();
        assert!(matches!(err, StepGraphError::GraphNotFound(id) if id == "nope"));
    }

    #[test]
    fn test_missing_run() {
        let store = MemoryStore::new();
        let id = RunId::from_string("nope");
        assert!(matches!(store.load_run(&id), Err(StepGraphError::RunNotFound(_))));
        assert!(matches!(
            store.update_run(&id, &mut |_| {}),
            Err(StepGraphError::RunNotFound(_))
        ));
    }

    #[test]
    fn test_save_run_overwrites() {
        let store = MemoryStore::new();
        let id = RunId::new();
        let run = RunState::new(id.clone(), GraphId::from_string("g"), State::new());
        store.save_run(&id, run.clone()).unwrap();

        let mut finished = run;
        finished.status = RunStatus::Completed;
        store.save_run(&id, finished).unwrap();

        assert_eq!(store.load_run(&id).unwrap().status, RunStatus::Completed);
        assert_eq!(store.run_count(), 1);
    }

    #[test]
    fn test_update_run_in_place() {
        let store = MemoryStore::new();
        let id = RunId::new();
        store
            .save_run(&id, RunState::new(id.clone(), GraphId::from_string("g"), State::new()))
            .unwrap();

        let after = store
            .update_run(&id, &mut |run| {
                run.current_state.insert("x".into(), serde_json::json!(1));
            })
            .unwrap();
        assert_eq!(after.current_state["x"], 1);
        assert_eq!(store.load_run(&id).unwrap().current_state["x"], 1);
    }

    #[test]
    fn test_loaded_run_is_a_copy() {
        let store = MemoryStore::new();
        let id = RunId::new();
        store
            .save_run(&id, RunState::new(id.clone(), GraphId::from_string("g"), State::new()))
            .unwrap();

        let mut copy = store.load_run(&id).unwrap();
        copy.current_state.insert("leak".into(), serde_json::json!(true));
        assert!(store.load_run(&id).unwrap().current_state.is_empty());
    }

    #[test]
    fn test_clear() {
        let store = MemoryStore::new();
        store.save_graph(&GraphId::new(), graph()).unwrap();
        let id = RunId::new();
        store
            .save_run(&id, RunState::new(id.clone(), GraphId::new(), State::new()))
            .unwrap();
        store.clear();
        assert_eq!(store.graph_count(), 0);
        assert_eq!(store.run_count(), 0);
    }

    #[test]
    fn test_concurrent_runs_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let ids: Vec<RunId> = (0..8).map(|_| RunId::new()).collect();
        for id in &ids {
            store
                .save_run(id, RunState::new(id.clone(), GraphId::new(), State::new()))
                .unwrap();
        }

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store
                            .update_run(&id, &mut |run| {
                                run.current_state.insert("n".into(), serde_json::json!(i));
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for id in &ids {
            assert_eq!(store.load_run(id).unwrap().current_state["n"], 99);
        }
    }
}
