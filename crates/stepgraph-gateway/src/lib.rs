mod protocol;
mod routes;
mod server;
mod state;

pub use protocol::{CreateGraphResponse, ErrorBody, StateResponse};
pub use server::{router, GatewayServer};
pub use state::AppState;
