//! Core dialogue engine components
//!
//! This module contains the intake state machine, the session store, and the
//! orchestration logic that turns one inbound message into one reply.

pub mod intake;

mod chat;
mod store;

pub use chat::{ChatEngine, ChatError, ChatRequest, ChatResponse};
pub use store::{Session, SessionStore, SqliteSessionStore, StoreError};
