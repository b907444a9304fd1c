//! Mailbox data types shared by the transport, the pipeline and the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One inbound email available for reply.
///
/// Produced by the mailbox on each poll and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Opaque handle used by the API and by `mark_as_replied` (an IMAP UID).
    pub id: String,
    /// Conversation grouping key.
    pub thread_id: String,
    /// RFC 5322 `Message-ID`, angle brackets included.
    pub message_id: String,
    #[serde(default)]
    pub subject: Option<String>,
    /// `Display Name <address>` form.
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub body_html: Option<String>,
}

impl Message {
    /// Body handed to the drafter: the text part, or the snippet when the
    /// text part is empty.
    pub fn effective_body(&self) -> &str {
        if self.body_text.trim().is_empty() {
            &self.snippet
        } else {
            &self.body_text
        }
    }
}

/// A reply ready to hand to the send transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingReply {
    /// Bare recipient address.
    pub to: String,
    pub body: String,
    pub thread_id: String,
    pub subject: String,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
}
