//! Recurring mailbox poll tied to the context's cancellation signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::inbox::context::InboxContext;

/// Handle to a running poller.
pub struct MailboxPoller {
    ctx: Arc<InboxContext>,
    handle: JoinHandle<()>,
}

impl MailboxPoller {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the context and wait for the task. A poll in flight completes
    /// first.
    pub async fn shutdown(self) {
        self.ctx.cancel();
        if let Err(e) = self.handle.await {
            error!("Mailbox poller task failed: {e}");
        }
    }
}

/// Spawn the poller. The first poll runs immediately, then every `interval`.
///
/// With `auto_reply` set, each successful non-empty poll is followed by an
/// auto-reply run; a run already in flight is skipped, not queued.
pub fn spawn_mailbox_poller(
    ctx: Arc<InboxContext>,
    interval: Duration,
    auto_reply: bool,
) -> MailboxPoller {
    let task_ctx = Arc::clone(&ctx);

    let handle = tokio::spawn(async move {
        info!(
            "Mailbox poller started, polling every {}s, auto-reply {}",
            interval.as_secs(),
            if auto_reply { "on" } else { "off" }
        );

        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = task_ctx.cancelled() => break,
                _ = tick.tick() => {}
            }

            poll_once(&task_ctx, auto_reply).await;
        }

        info!("Mailbox poller shutting down");
    });

    MailboxPoller { ctx, handle }
}

async fn poll_once(ctx: &InboxContext, auto_reply: bool) {
    let messages = match ctx.refresh().await {
        Ok(messages) => messages,
        Err(e) => {
            error!("Mailbox poll failed: {e}");
            return;
        }
    };
    debug!(count = messages.len(), "Mailbox polled");

    if !auto_reply || messages.is_empty() || ctx.is_cancelled() {
        return;
    }

    match ctx.run_auto_reply().await {
        Ok(result) => debug!(
            sent = result.sent_count,
            skipped = result.skipped_count,
            "Poll-triggered auto reply done"
        ),
        Err(PipelineError::BatchInProgress) => {
            debug!("Auto reply already running, skipping this poll");
        }
        Err(e) => warn!(error = %e, "Poll-triggered auto reply failed"),
    }
}
