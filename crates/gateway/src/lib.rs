//! REST client for the check-in server.
//!
//! Thin typed wrapper over the server's HTTP API: registration, check-ins,
//! sleep/emergency toggles, status polling, and alarm acknowledgment. All
//! requests authenticate with an `x-api-key` header and are idempotent from
//! the client's point of view.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ApiConfig, CheckinClient};
pub use error::{ApiRetryClass, GatewayError, Result};
pub use types::*;
