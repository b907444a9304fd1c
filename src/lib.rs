//! Inbox Agent: mailbox polling, LLM reply drafting and gated auto-reply.

pub mod api;
pub mod config;
pub mod error;
pub mod inbox;
pub mod llm;
pub mod mailbox;
pub mod pipeline;
