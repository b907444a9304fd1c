//! Mailbox collaborator: listing inbound mail, sending replies and marking
//! originals as replied.

pub mod email;
pub(crate) mod imap;
pub mod parse;
pub mod types;

pub use email::{EmailConfig, ImapMailbox};
pub use types::{Message, OutgoingReply};

use async_trait::async_trait;

use crate::error::MailboxError;

/// Transport behind the inbox. Pure I/O, no reply policy.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Transport name for logs.
    fn name(&self) -> &str;

    /// Current inbound messages, newest first, at most `limit`.
    async fn list_messages(&self, limit: usize) -> Result<Vec<Message>, MailboxError>;

    /// Deliver one reply.
    async fn send_reply(&self, reply: &OutgoingReply) -> Result<(), MailboxError>;

    /// Record that the message with this `Message::id` has been answered.
    async fn mark_as_replied(&self, message_id: &str) -> Result<(), MailboxError>;
}
