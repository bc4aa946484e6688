//! # Credo Common Library
//!
//! Shared code for the Credo gateway services including:
//! - Error types
//! - Gateway event types (GatewayEvent enum) and the EventBus
//! - Configuration loading

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
