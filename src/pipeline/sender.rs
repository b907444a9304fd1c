//! Reply sender: threading metadata, send, then mark-as-replied.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::mailbox::{Mailbox, Message, OutgoingReply};
use crate::pipeline::address::extract_email_address;
use crate::pipeline::subject::build_reply_subject;

/// A reply to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    /// Recipient, bare or `Display Name <address>`.
    pub to: String,
    pub body: String,
    pub thread_id: String,
    /// Mailbox handle of the original; marked as replied after a send.
    pub message_id: Option<String>,
    /// Protocol `Message-ID` of the original.
    pub in_reply_to: Option<String>,
    /// Original or already composed subject.
    pub subject: Option<String>,
}

/// What happened to the mark-as-replied step after a send.
#[derive(Debug)]
pub enum MarkOutcome {
    Marked,
    /// No message handle was supplied.
    NotRequested,
    /// Always `PipelineError::MarkAsRepliedFailed`.
    Failed(PipelineError),
}

/// Result of a delivered reply.
#[derive(Debug)]
pub struct SendReport {
    /// Bare recipient address.
    pub to: String,
    pub subject: String,
    pub marked: MarkOutcome,
}

impl SendReport {
    pub fn marked_as_replied(&self) -> bool {
        matches!(self.marked, MarkOutcome::Marked)
    }

    pub fn mark_failed(&self) -> bool {
        matches!(self.marked, MarkOutcome::Failed(_))
    }
}

/// Sends replies through the mailbox collaborator.
pub struct ReplySender {
    mailbox: Arc<dyn Mailbox>,
}

impl ReplySender {
    pub fn new(mailbox: Arc<dyn Mailbox>) -> Self {
        Self { mailbox }
    }

    /// Reply to `message` with single-hop threading on its `Message-ID`.
    pub async fn reply_to(
        &self,
        message: &Message,
        body: &str,
        subject: &str,
    ) -> Result<SendReport, PipelineError> {
        self.send(SendRequest {
            to: message.from.clone(),
            body: body.to_string(),
            thread_id: message.thread_id.clone(),
            message_id: Some(message.id.clone()),
            in_reply_to: Some(message.message_id.clone()),
            subject: Some(subject.to_string()),
        })
        .await
    }

    /// Send a reply, then mark the original as replied when a handle is given.
    ///
    /// A send rejection is `SendFailed` and nothing is marked. A marking
    /// failure after a delivered send is reported in the returned
    /// [`SendReport`], not as an error.
    pub async fn send(&self, request: SendRequest) -> Result<SendReport, PipelineError> {
        let to = extract_email_address(&request.to).to_string();
        let in_reply_to = request.in_reply_to.filter(|id| !id.trim().is_empty());
        let reply = OutgoingReply {
            to: to.clone(),
            body: request.body,
            thread_id: request.thread_id,
            subject: build_reply_subject(request.subject.as_deref()),
            references: in_reply_to.clone(),
            in_reply_to,
        };

        if let Err(e) = self.mailbox.send_reply(&reply).await {
            error!(to = %to, thread_id = %reply.thread_id, error = %e, "Send failed");
            return Err(PipelineError::SendFailed {
                to,
                reason: e.to_string(),
            });
        }
        info!(to = %to, thread_id = %reply.thread_id, "Reply sent");

        let marked = match request.message_id.filter(|id| !id.trim().is_empty()) {
            None => MarkOutcome::NotRequested,
            Some(message_id) => match self.mailbox.mark_as_replied(&message_id).await {
                Ok(()) => MarkOutcome::Marked,
                Err(e) => {
                    let err = PipelineError::MarkAsRepliedFailed {
                        message_id,
                        reason: e.to_string(),
                    };
                    warn!(error = %err, "Reply delivered but original left unmarked");
                    MarkOutcome::Failed(err)
                }
            },
        };

        Ok(SendReport {
            to,
            subject: reply.subject,
            marked,
        })
    }
}
