//! # Fieldops Common Library
//!
//! Shared code for the fieldops client subsystem:
//! - Domain entities (Account, Assignment) and status enums
//! - Common error type
//! - Event types (FieldEvent enum) and EventBus
//! - Configuration loading
//! - Logging initialization

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod types;

pub use error::{Error, Result};
