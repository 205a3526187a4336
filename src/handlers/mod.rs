//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `live` - Live chat WebSocket proxy to the Vertex AI streaming API

pub mod api;
pub mod live;

// Re-export commonly used handlers for convenient access
pub use live::live_handler;
