//! Hand-written collaborator stubs for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{LlmError, MailboxError};
use crate::mailbox::{Mailbox, Message, OutgoingReply};
use crate::pipeline::draft::{DraftReply, DraftRequest, Drafter};

/// A message with id `id`, subject `Subject {id}` and body `body {id}`.
pub(crate) fn message(id: &str, from: &str) -> Message {
    Message {
        id: id.to_string(),
        thread_id: format!("<thread-{id}@example.com>"),
        message_id: format!("<msg-{id}@example.com>"),
        subject: Some(format!("Subject {id}")),
        from: from.to_string(),
        to: "me@example.com".to_string(),
        snippet: format!("snippet {id}"),
        date: None,
        body_text: format!("body {id}"),
        body_html: None,
    }
}

/// Mailbox that records sends and marks and can be told to fail.
#[derive(Default)]
pub(crate) struct StubMailbox {
    messages: Mutex<Vec<Message>>,
    fail_list: bool,
    fail_send_to: Option<String>,
    fail_mark: Option<String>,
    sent: Mutex<Vec<OutgoingReply>>,
    marked: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
}

impl StubMailbox {
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Mutex::new(messages),
            ..Self::default()
        }
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_send_to(mut self, address: &str) -> Self {
        self.fail_send_to = Some(address.to_string());
        self
    }

    pub fn failing_mark(mut self, message_id: &str) -> Self {
        self.fail_mark = Some(message_id.to_string());
        self
    }

    pub fn set_messages(&self, messages: Vec<Message>) {
        *self.messages.lock().unwrap() = messages;
    }

    pub fn sent(&self) -> Vec<OutgoingReply> {
        self.sent.lock().unwrap().clone()
    }

    pub fn marked(&self) -> Vec<String> {
        self.marked.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailbox for StubMailbox {
    fn name(&self) -> &str {
        "stub"
    }

    async fn list_messages(&self, limit: usize) -> Result<Vec<Message>, MailboxError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err(MailboxError::Protocol("SEARCH failed".into()));
        }
        Ok(self.messages.lock().unwrap().iter().take(limit).cloned().collect())
    }

    async fn send_reply(&self, reply: &OutgoingReply) -> Result<(), MailboxError> {
        if self.fail_send_to.as_deref() == Some(reply.to.as_str()) {
            return Err(MailboxError::Smtp("550 mailbox unavailable".into()));
        }
        self.sent.lock().unwrap().push(reply.clone());
        Ok(())
    }

    async fn mark_as_replied(&self, message_id: &str) -> Result<(), MailboxError> {
        if self.fail_mark.as_deref() == Some(message_id) {
            return Err(MailboxError::Protocol("STORE failed".into()));
        }
        self.marked.lock().unwrap().push(message_id.to_string());
        Ok(())
    }
}

/// Drafter scripted per message id (matched on the `body {id}` body).
/// Unscripted messages get a held draft.
#[derive(Default)]
pub(crate) struct ScriptedDrafter {
    script: HashMap<String, Result<DraftReply, String>>,
    calls: Mutex<Vec<DraftRequest>>,
}

impl ScriptedDrafter {
    pub fn reply(mut self, id: &str, reply: &str, auto_send: bool) -> Self {
        self.script.insert(
            format!("body {id}"),
            Ok(DraftReply {
                reply: reply.to_string(),
                auto_send,
                reasoning: format!("scripted for {id}"),
            }),
        );
        self
    }

    pub fn fail(mut self, id: &str) -> Self {
        self.script
            .insert(format!("body {id}"), Err("model unavailable".to_string()));
        self
    }

    pub fn calls(&self) -> Vec<DraftRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Drafter for ScriptedDrafter {
    async fn draft(&self, request: &DraftRequest) -> Result<DraftReply, LlmError> {
        self.calls.lock().unwrap().push(request.clone());
        match self.script.get(&request.body) {
            Some(Ok(reply)) => Ok(reply.clone()),
            Some(Err(reason)) => Err(LlmError::RequestFailed {
                provider: "scripted".into(),
                reason: reason.clone(),
            }),
            None => Ok(DraftReply {
                reply: "Needs a human.".into(),
                auto_send: false,
                reasoning: "unscripted".into(),
            }),
        }
    }
}
