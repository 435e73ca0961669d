//! convoy-import library interface
//!
//! Replays exported support conversations into a chat platform, one
//! conversation at a time, with resumable checkpoints.

pub mod adapters;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::adapters::{Adapter, AdapterCapabilities, AdapterError, AdapterRegistry};
pub use crate::config::{CliOverrides, ImportConfig};
pub use crate::error::{ConversationError, ImportError, ImportResult};
pub use crate::services::{ConversationImporter, ImporterSettings, Pipeline};
