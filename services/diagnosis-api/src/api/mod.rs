//! Diagnosis HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules, the validating extractors they share, and
//! the error envelope helpers.
pub mod diagnoses;
pub mod error;
pub mod extract;
pub mod openapi;
pub mod system;
