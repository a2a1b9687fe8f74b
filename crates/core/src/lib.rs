//! Core library for the check-in liveness companion.
//!
//! Owns the liveness state machine and everything that feeds it: push event
//! normalization, status polling, alert presentation, and the acknowledgment
//! protocol. Platform and transport concerns live behind traits so the HTTP
//! gateway and the SQLite store plug in from their own crates.

pub mod errors;
pub mod liveness;
