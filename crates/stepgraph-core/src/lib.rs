pub mod config;
pub mod error;
pub mod graph;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, StepGraphError};
pub use graph::{Condition, Edge, GraphDefinition, LoopPolicy, Node, Operator};
pub use types::*;
