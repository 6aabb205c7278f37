pub mod builtin;
pub mod condition;
pub mod executor;
pub mod graphs;
pub mod registry;
pub mod state;
pub mod validator;

pub use builtin::{NoopHandler, TickHandler};
pub use condition::evaluate;
pub use executor::WorkflowExecutor;
pub use graphs::GraphManager;
pub use registry::HandlerRegistry;
pub use state::StateManager;
pub use validator::validate;
