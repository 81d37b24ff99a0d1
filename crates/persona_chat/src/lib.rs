//! Character chat glue.
//!
//! Everything here sits on top of hosted services: the identity provider
//! supplies [`Session`]s, a managed database backs [`MessageStore`], and a
//! completion endpoint produces replies. [`ChatService`] strings one turn
//! together.

pub mod characters;
pub mod client;
pub mod error;
pub mod service;
pub mod session;
pub mod store;

pub use characters::{Character, CHARACTERS};
pub use client::{ChatClient, ChatMessage, CompletionApi, CompletionRequest};
pub use error::ChatError;
pub use service::{ChatReply, ChatService};
pub use session::{ChatGate, Session};
pub use store::{InMemoryMessageStore, MessageStore, Role, StoredMessage};
