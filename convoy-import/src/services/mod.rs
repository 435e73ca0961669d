//! Import services
//!
//! - Record source (streaming JSON input)
//! - Status registry (checkpoints)
//! - Chat API client
//! - Message send, conversation importer, pipeline driver

pub mod chat_client;
pub mod conversation_importer;
pub mod message_sender;
pub mod pipeline;
pub mod record_source;
pub mod status_registry;

pub use chat_client::{ChatApi, ChatApiError, ChatClientConfig, HttpChatClient};
pub use conversation_importer::{ConversationImporter, ImporterSettings};
pub use message_sender::{MessageSender, SendDisposition, SendLimits};
pub use pipeline::Pipeline;
pub use record_source::{RecordSource, SourceError, SourceEvent};
pub use status_registry::StatusRegistry;
