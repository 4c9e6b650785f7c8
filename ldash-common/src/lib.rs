//! # Log Dashboard Common Library
//!
//! Shared code for the dashboard client crates:
//! - Bootstrap configuration (TOML + environment resolution)
//! - Event types (DashboardEvent enum) and the EventBus
//! - SSE stream helpers
//! - Human-readable time formatting for presentation adapters

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod sse;

pub use error::{Error, Result};
