//! Mailbox snapshot, orchestration context and background polling.

pub mod context;
pub mod poller;

pub use context::{InboxContext, MailboxSnapshot};
pub use poller::{MailboxPoller, spawn_mailbox_poller};
