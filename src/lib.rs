pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod registry;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use core::*;
pub use errors::{ProxyError, ProxyResult};
pub use registry::{ClientConnection, ConnectionRegistry, LivenessSweeper};
pub use state::AppState;
