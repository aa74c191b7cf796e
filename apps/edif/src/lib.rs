//! # EDIF Library
//!
//! This library exposes the EDIF server modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod identity;
pub mod live;
pub mod objects;
pub mod seed;
pub mod site;

// Re-export edif_core for convenience
pub use edif_core;
