//! # hirelink-client
//!
//! Headless client core for Hirelink conversations.
//!
//! The crate merges three sources of truth into one consistent timeline per
//! conversation: persisted REST history, the synthesized proposal
//! pseudo-message derived from the application record, and live gateway
//! pushes. Shape drift between the sources is absorbed at a single
//! normalization boundary and duplicate arrivals (the REST and relay paths
//! may both deliver the same message) are dropped by id.
//!
//! A UI layer drives [`controller::ChatController`]; everything underneath
//! is plain state it can render.

pub mod api;
pub mod controller;
pub mod conversation;
pub mod gateway;

mod error;

pub use controller::ChatController;
pub use conversation::{Application, ChatEntry, ChatMessage, Conversation};
pub use error::ClientError;
pub use gateway::GatewayClient;
