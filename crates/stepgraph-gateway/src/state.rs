use std::sync::Arc;

use stepgraph_core::config::{EngineConfig, GatewayConfig};
use stepgraph_engine::{GraphManager, HandlerRegistry, StateManager, WorkflowExecutor};
use stepgraph_store::MemoryStore;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub graphs: Arc<GraphManager>,
    pub executor: Arc<WorkflowExecutor>,
}

impl AppState {
    /// Wire managers and an executor over one fresh `MemoryStore`.
    pub fn in_memory(
        config: GatewayConfig,
        engine: EngineConfig,
        registry: HandlerRegistry,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let graphs = Arc::new(GraphManager::new(store.clone()));
        let states = Arc::new(StateManager::new(store));
        let executor =
            WorkflowExecutor::new(graphs.clone(), states, Arc::new(registry)).with_config(engine);
        Self {
            config,
            graphs,
            executor: Arc::new(executor),
        }
    }
}
