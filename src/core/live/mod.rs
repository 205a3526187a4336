//! Vertex AI Live API session support.
//!
//! - `config`: session settings and endpoint constants
//! - `messages`: outbound wire messages and inbound frame classification
//! - `connector`: authenticated session establishment

pub mod config;
pub mod connector;
pub mod messages;

pub use config::{LiveSessionConfig, ResponseModality};
pub use connector::{UpstreamConnector, UpstreamSocket};
pub use messages::{UpstreamEvent, UpstreamMessage};
