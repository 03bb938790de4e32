//! # mesito Library
//!
//! This library exposes the mesito modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;

// Re-export mesito_core for convenience
pub use mesito_core;
