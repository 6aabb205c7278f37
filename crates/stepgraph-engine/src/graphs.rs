use std::sync::Arc;

use tracing::{info, warn};

use stepgraph_core::error::{Result, StepGraphError};
use stepgraph_core::traits::Storage;
use stepgraph_core::types::GraphId;
use stepgraph_core::GraphDefinition;

use crate::validator;

/// Accepts, stores, and serves graph definitions.
pub struct GraphManager {
    storage: Arc<dyn Storage>,
}

impl GraphManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Validate and store a definition under a fresh identifier.
    ///
    /// A definition with any violation is rejected as a whole and nothing is
    /// stored.
    pub fn create_graph(&self, definition: GraphDefinition) -> Result<GraphId> {
        if let Err(e) = validator::validate(&definition) {
            if let StepGraphError::Validation { errors } = &e {
                warn!(graph = %definition.name, errors = errors.len(), "Graph rejected");
            }
            return Err(e);
        }

        let graph_id = GraphId::new();
        info!(
            graph_id = %graph_id,
            graph = %definition.name,
            nodes = definition.nodes.len(),
            edges = definition.edges.len(),
            loops = definition.loops.len(),
            "Graph created"
        );
        self.storage.save_graph(&graph_id, definition)?;
        Ok(graph_id)
    }

    /// Fetch a stored definition, or `GraphNotFound`.
    pub fn get_graph(&self, graph_id: &GraphId) -> Result<Arc<GraphDefinition>> {
        self.storage.load_graph(graph_id)
    }

    pub fn has_graph(&self, graph_id: &GraphId) -> bool {
        self.storage.has_graph(graph_id)
    }
}
