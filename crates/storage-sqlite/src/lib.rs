//! SQLite-backed local state store for the check-in client.
//!
//! Two tables: a `settings` key-value table for identity, contract
//! parameters, and notification bookkeeping, and a `liveness` table caching
//! one serialized row per watched checker so alarms survive restarts.

pub mod store;

pub use store::SettingsStore;
