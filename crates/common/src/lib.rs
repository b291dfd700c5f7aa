//! Shared configuration and error types for slotgate.

pub mod config;
pub mod error;

pub use config::*;
pub use error::*;
