//! Batch orchestrator: draft, gate and send each message of a snapshot in
//! order, isolating per-message failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::mailbox::Message;
use crate::pipeline::draft::DraftRequester;
use crate::pipeline::gate::{self, SendDecision};
use crate::pipeline::sender::ReplySender;

/// Per-message outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOutcome {
    Sent,
    Skipped,
    Failed,
}

impl BatchOutcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageOutcome {
    pub message_id: String,
    pub outcome: BatchOutcome,
    /// The reply went out but the original could not be marked as replied.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub mark_replied_failed: bool,
}

/// Aggregate of one run. `sent_count + skipped_count` always equals the
/// number of recorded outcomes; failures count as skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub sent_count: usize,
    pub skipped_count: usize,
    #[serde(rename = "perMessageOutcome")]
    pub outcomes: Vec<MessageOutcome>,
}

impl BatchResult {
    /// A run that touched nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    fn record(&mut self, outcome: MessageOutcome) {
        match outcome.outcome {
            BatchOutcome::Sent => self.sent_count += 1,
            BatchOutcome::Skipped | BatchOutcome::Failed => self.skipped_count += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == BatchOutcome::Failed)
            .count()
    }

    /// Operator-facing one-line summary.
    pub fn summary(&self) -> String {
        if self.sent_count > 0 {
            format!(
                "Auto reply complete: {} sent, {} held for review.",
                self.sent_count, self.skipped_count
            )
        } else {
            "Auto reply complete: no messages qualified for auto-send.".to_string()
        }
    }
}

/// Runs the auto-reply pipeline over a snapshot. At most one run at a time.
pub struct AutoReplier {
    requester: Arc<DraftRequester>,
    sender: Arc<ReplySender>,
    running: AtomicBool,
}

/// Clears the running flag when a run ends, including on panic.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AutoReplier {
    pub fn new(requester: Arc<DraftRequester>, sender: Arc<ReplySender>) -> Self {
        Self {
            requester,
            sender,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Process `messages` strictly in order.
    ///
    /// Only errors with [`PipelineError::BatchInProgress`] when another run
    /// holds the flag. An empty input is logged and yields an empty result.
    pub async fn run(&self, messages: &[Message]) -> Result<BatchResult, PipelineError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PipelineError::BatchInProgress);
        }
        let _guard = RunGuard(&self.running);

        if messages.is_empty() {
            let err = PipelineError::InvalidBatch("no messages to process".into());
            warn!(error = %err, "Auto-reply run skipped");
            return Ok(BatchResult::empty());
        }

        let span = info_span!("auto_reply", batch_id = %Uuid::new_v4());
        let result = self.process_all(messages).instrument(span).await;
        Ok(result)
    }

    async fn process_all(&self, messages: &[Message]) -> BatchResult {
        info!(count = messages.len(), "Auto-reply run started");

        let mut result = BatchResult::empty();
        for message in messages {
            let outcome = self.process_one(message).await;
            debug!(
                message_id = %outcome.message_id,
                outcome = outcome.outcome.label(),
                "Message processed"
            );
            result.record(outcome);
        }

        info!(
            sent = result.sent_count,
            skipped = result.skipped_count,
            failed = result.failed_count(),
            "Auto-reply run complete"
        );
        result
    }

    async fn process_one(&self, message: &Message) -> MessageOutcome {
        let outcome = |outcome, mark_replied_failed| MessageOutcome {
            message_id: message.id.clone(),
            outcome,
            mark_replied_failed,
        };

        let draft = match self.requester.request_for_message(message).await {
            Ok(draft) => draft,
            Err(_) => return outcome(BatchOutcome::Failed, false),
        };

        match gate::evaluate(&draft) {
            SendDecision::Hold => {
                debug!(message_id = %message.id, reasoning = %draft.reasoning, "Draft held for review");
                outcome(BatchOutcome::Skipped, false)
            }
            SendDecision::Send => {
                match self
                    .sender
                    .reply_to(message, &draft.reply, &draft.subject)
                    .await
                {
                    Ok(report) => outcome(BatchOutcome::Sent, report.mark_failed()),
                    Err(_) => outcome(BatchOutcome::Failed, false),
                }
            }
        }
    }
}
