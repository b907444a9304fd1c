//! Orchestration context shared by the poller and the HTTP routes.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};

use crate::error::{MailboxError, PipelineError};
use crate::mailbox::{Mailbox, Message};
use crate::pipeline::{
    AutoReplier, BatchOutcome, BatchResult, Draft, DraftRequester, Drafter, ReplySender, SendReport, SendRequest,
};

/// Last known mailbox state. Replaced wholesale by every refresh.
#[derive(Debug, Clone, Default)]
pub struct MailboxSnapshot {
    pub messages: Vec<Message>,
    /// When `messages` was last fetched successfully.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Error of the most recent refresh, cleared by the next success.
    pub last_error: Option<String>,
}

/// Owns the pipeline, the last snapshot and the cancellation signal.
pub struct InboxContext {
    mailbox: Arc<dyn Mailbox>,
    requester: Arc<DraftRequester>,
    sender: Arc<ReplySender>,
    replier: AutoReplier,
    mailbox_limit: usize,
    snapshot: RwLock<MailboxSnapshot>,
    /// Handles auto-reply already sent or failed on. Pruned to the listed
    /// messages on every refresh.
    attempted: Mutex<HashSet<String>>,
    cancel: watch::Sender<bool>,
}

impl InboxContext {
    /// `sender_email` is our own address; `mailbox_limit` caps each listing.
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        drafter: Arc<dyn Drafter>,
        sender_email: impl Into<String>,
        mailbox_limit: usize,
    ) -> Self {
        let requester = Arc::new(DraftRequester::new(drafter, sender_email));
        let sender = Arc::new(ReplySender::new(Arc::clone(&mailbox)));
        let replier = AutoReplier::new(Arc::clone(&requester), Arc::clone(&sender));
        let (cancel, _) = watch::channel(false);

        Self {
            mailbox,
            requester,
            sender,
            replier,
            mailbox_limit,
            snapshot: RwLock::new(MailboxSnapshot::default()),
            attempted: Mutex::new(HashSet::new()),
            cancel,
        }
    }

    // ── Mailbox snapshot ────────────────────────────────────────────

    /// List the mailbox and replace the snapshot.
    ///
    /// On failure the previous messages are kept and the error is recorded.
    pub async fn refresh(&self) -> Result<Vec<Message>, MailboxError> {
        match self.mailbox.list_messages(self.mailbox_limit).await {
            Ok(messages) => {
                debug!(mailbox = self.mailbox.name(), count = messages.len(), "Mailbox refreshed");
                *self.snapshot.write().await = MailboxSnapshot {
                    messages: messages.clone(),
                    fetched_at: Some(Utc::now()),
                    last_error: None,
                };
                self.attempted
                    .lock()
                    .await
                    .retain(|id| messages.iter().any(|m| &m.id == id));
                Ok(messages)
            }
            Err(e) => {
                self.snapshot.write().await.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn snapshot(&self) -> MailboxSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn find_message(&self, id: &str) -> Option<Message> {
        self.snapshot
            .read()
            .await
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    // ── Manual path ─────────────────────────────────────────────────

    /// Draft a reply for human review. The recommendation in the result is
    /// informational only.
    pub async fn draft(
        &self,
        message_id: &str,
        subject: Option<&str>,
        from: &str,
        body: &str,
    ) -> Result<Draft, PipelineError> {
        self.requester.request(message_id, subject, from, body).await
    }

    /// Draft a reply for a message in the current snapshot.
    pub async fn draft_for(&self, id: &str) -> Result<Draft, PipelineError> {
        let message = self
            .find_message(id)
            .await
            .ok_or_else(|| PipelineError::DraftUnavailable {
                message_id: id.to_string(),
                reason: "not in the current mailbox snapshot".into(),
            })?;
        self.requester.request_for_message(&message).await
    }

    /// Send a human-approved reply. Bypasses the send gate; a blank body is
    /// rejected before any I/O.
    pub async fn send_manual(&self, request: SendRequest) -> Result<SendReport, PipelineError> {
        if request.body.trim().is_empty() {
            return Err(PipelineError::SendFailed {
                to: request.to,
                reason: "reply body is empty".into(),
            });
        }
        self.sender.send(request).await
    }

    // ── Auto-reply ──────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.replier.is_running()
    }

    /// Run the batch over the current snapshot, then refresh unless the
    /// context was cancelled meanwhile.
    ///
    /// Messages an earlier run already sent or failed on are left out, so a
    /// message that stays unread after a failed mark is not answered twice.
    pub async fn run_auto_reply(&self) -> Result<BatchResult, PipelineError> {
        let listed = self.snapshot.read().await.messages.clone();
        let pending: Vec<Message> = {
            let attempted = self.attempted.lock().await;
            listed
                .iter()
                .filter(|m| !attempted.contains(&m.id))
                .cloned()
                .collect()
        };
        if pending.is_empty() && !listed.is_empty() {
            debug!(listed = listed.len(), "Every listed message was already attempted");
            return Ok(BatchResult::empty());
        }

        let result = self.replier.run(&pending).await?;
        info!(summary = %result.summary(), "Auto reply finished");

        self.attempted.lock().await.extend(
            result
                .outcomes
                .iter()
                .filter(|o| matches!(o.outcome, BatchOutcome::Sent | BatchOutcome::Failed))
                .map(|o| o.message_id.clone()),
        );

        if self.is_cancelled() {
            debug!("Context cancelled, skipping post-run refresh");
        } else if let Err(e) = self.refresh().await {
            warn!(error = %e, "Post-run mailbox refresh failed");
        }
        Ok(result)
    }

    // ── Cancellation ────────────────────────────────────────────────

    /// Signal teardown. Idempotent.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.subscribe();
        // The sender lives in `self`, so this cannot fail while we're borrowed.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
