//! MCP Any trace inspector
//!
//! Consumes the gateway's live traffic feed (WebSocket or polling), keeps a
//! bounded, searchable buffer of recent events and resolves full detail for
//! the selected one on demand.

pub mod client;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod transport;

pub use pipeline::{Pipeline, PipelineOptions, PipelineUpdate};
