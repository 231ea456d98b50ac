//! Hookcatch - webhook capture, inspection and forwarding.
//!
//! The `hookcatch-server` binary serves:
//! - a public ingestion endpoint that records every inbound call and
//!   forwards it to the owner's configured target
//! - a bearer-token protected API for managing webhooks and inspecting
//!   captured requests
//!
//! ## Architecture
//!
//! ```text
//! Sender → /webhook/:id → Ingestor → Store (Postgres)
//!                                  ↘ Forwarder → forward target
//! Owner  → Bearer JWT → ownership guard → Store
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod util;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use error::ApiError;
pub use pipeline::{Ack, ForwardJob, ForwardOutcome, Forwarder, Ingestor};
pub use store::{PgStore, Store, StoreError};
pub use web::{router, AppState};
