use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepGraphError {
    // Lookup errors
    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    // Definition errors
    #[error("Graph validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },

    // Execution errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Loop limit exceeded at node '{node}': max {max_iterations} iterations")]
    LoopLimitExceeded { node: String, max_iterations: u32 },

    #[error("Node execution failed at '{node}': {message}")]
    NodeExecution { node: String, message: String },

    #[error("Step limit exceeded: more than {0} node executions")]
    StepLimitExceeded(usize),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Invalid status transition for run {run_id}: {from} -> {to}")]
    InvalidTransition {
        run_id: String,
        from: String,
        to: String,
    },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StepGraphError {
    /// Stable error kind name, as reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GraphNotFound(_) => "GraphNotFoundError",
            Self::RunNotFound(_) => "RunNotFoundError",
            Self::Validation { .. } => "ValidationError",
            Self::ToolNotFound(_) => "ToolNotFoundError",
            Self::LoopLimitExceeded { .. } => "LoopLimitError",
            Self::NodeExecution { .. } => "NodeExecutionError",
            Self::StepLimitExceeded(_) => "StepLimitError",
            Self::Cancelled => "CancelledError",
            Self::InvalidTransition { .. } => "InvalidTransitionError",
            Self::Config(_) | Self::ConfigNotFound(_) => "ConfigError",
            Self::Serialization(_) | Self::Json(_) => "SerializationError",
            Self::Io(_) => "IoError",
        }
    }

    /// Whether this error ends a run (as opposed to failing the request).
    pub fn is_run_failure(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound(_)
                | Self::LoopLimitExceeded { .. }
                | Self::NodeExecution { .. }
                | Self::StepLimitExceeded(_)
                | Self::Cancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, StepGraphError>;
