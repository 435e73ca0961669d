//! # convoy Common Library
//!
//! Shared code for the convoy migration tools:
//! - Error type
//! - Bootstrap configuration loading (TOML) and atomic writes
//! - Tracing initialization
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
