pub mod error;
pub mod gateway;
pub mod middleware;
pub mod profiles;
pub mod routes;
pub mod state;
pub mod stories;

pub use routes::router;
pub use state::{AppState, AppStateInner};
