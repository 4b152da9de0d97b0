//! Diagnosis service library crate.
//!
//! # Purpose
//! Exposes the HTTP API surface, configuration, observability, and storage
//! backends for use by the binary and the integration tests.
pub mod api;
pub mod app;
pub mod config;
pub mod observability;
pub mod runtime;
pub mod store;
