//! Outbound service clients

pub mod chat_relay;

pub use chat_relay::{ChatChunk, ChatMessage, ChatRelay, ChatRelayError, ChatRole};
