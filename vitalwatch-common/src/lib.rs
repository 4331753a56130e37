//! # VitalWatch Common Library
//!
//! Shared code for VitalWatch services including:
//! - Common error and result types
//! - Root data folder resolution and TOML configuration
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
