//! Draft requester and the LLM-backed drafting collaborator.
//!
//! The requester normalizes a message into a [`DraftRequest`], hands it to a
//! [`Drafter`] and attaches the composed reply subject. Any collaborator
//! failure, including a payload with no `reply`, surfaces as
//! [`PipelineError::DraftUnavailable`]; it is never turned into an empty draft.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LlmError, PipelineError};
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::mailbox::Message;
use crate::pipeline::subject::build_reply_subject;

/// Max characters of the inbound body included in the prompt.
const BODY_PROMPT_CHARS: usize = 4000;

/// Max tokens for a drafted reply.
const DRAFT_MAX_TOKENS: u32 = 1024;

/// Temperature for drafting.
const DRAFT_TEMPERATURE: f32 = 0.3;

// ── Types ───────────────────────────────────────────────────────────

/// What the drafting collaborator is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRequest {
    pub subject: Option<String>,
    /// Original sender, `Display Name <address>` form.
    pub from: String,
    /// Our own address.
    pub to: String,
    /// Effective body (text part, or snippet when the text part is empty).
    pub body: String,
}

/// Raw answer from the drafting collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftReply {
    pub reply: String,
    #[serde(default, alias = "auto_send")]
    pub auto_send: bool,
    #[serde(default)]
    pub reasoning: String,
}

/// A proposed reply for one message.
///
/// `auto_send` is only the collaborator's recommendation; whether a reply
/// goes out unattended is decided by [`crate::pipeline::gate::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub reply: String,
    pub auto_send: bool,
    pub reasoning: String,
    pub subject: String,
}

impl Draft {
    fn from_reply(reply: DraftReply, subject: String) -> Self {
        Self {
            reply: reply.reply,
            auto_send: reply.auto_send,
            reasoning: reply.reasoning,
            subject,
        }
    }
}

/// The drafting collaborator: turns a request into reply text plus an
/// auto-send recommendation.
#[async_trait]
pub trait Drafter: Send + Sync {
    async fn draft(&self, request: &DraftRequest) -> Result<DraftReply, LlmError>;
}

// ── Draft requester ─────────────────────────────────────────────────

/// Calls the drafter for one message and returns a normalized [`Draft`].
pub struct DraftRequester {
    drafter: Arc<dyn Drafter>,
    sender_email: String,
}

impl DraftRequester {
    /// `sender_email` is our own address, passed to the drafter as `to`.
    pub fn new(drafter: Arc<dyn Drafter>, sender_email: impl Into<String>) -> Self {
        Self {
            drafter,
            sender_email: sender_email.into(),
        }
    }

    /// Draft a reply to a message in the current snapshot.
    pub async fn request_for_message(&self, message: &Message) -> Result<Draft, PipelineError> {
        self.request(
            &message.id,
            message.subject.as_deref(),
            &message.from,
            message.effective_body(),
        )
        .await
    }

    /// Draft a reply from loose fields (the HTTP draft route).
    pub async fn request(
        &self,
        message_id: &str,
        subject: Option<&str>,
        from: &str,
        body: &str,
    ) -> Result<Draft, PipelineError> {
        let request = DraftRequest {
            subject: subject.map(str::to_string),
            from: from.to_string(),
            to: self.sender_email.clone(),
            body: body.to_string(),
        };

        let reply = self.drafter.draft(&request).await.map_err(|e| {
            warn!(message_id, error = %e, "Drafting failed");
            PipelineError::DraftUnavailable {
                message_id: message_id.to_string(),
                reason: e.to_string(),
            }
        })?;

        debug!(
            message_id,
            auto_send = reply.auto_send,
            reply_chars = reply.reply.chars().count(),
            "Draft received"
        );
        Ok(Draft::from_reply(reply, build_reply_subject(subject)))
    }
}

// ── LLM drafter ─────────────────────────────────────────────────────

/// [`Drafter`] backed by an [`LlmProvider`].
pub struct LlmDrafter {
    llm: Arc<dyn LlmProvider>,
}

impl LlmDrafter {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Drafter for LlmDrafter {
    async fn draft(&self, request: &DraftRequest) -> Result<DraftReply, LlmError> {
        let completion = CompletionRequest::new(vec![
            ChatMessage::system(build_draft_system_prompt()),
            ChatMessage::user(build_draft_user_prompt(request)),
        ])
        .with_temperature(DRAFT_TEMPERATURE)
        .with_max_tokens(DRAFT_MAX_TOKENS);

        let response = self.llm.complete(completion).await?;
        let cost = self.llm.estimate_cost(&response);
        info!(
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost_usd = %cost,
            "Draft completion finished"
        );

        parse_draft_response(&response.content).map_err(|reason| {
            warn!(raw_response = %response.content, %reason, "Unusable draft response");
            LlmError::InvalidResponse {
                provider: self.llm.model_name().to_string(),
                reason,
            }
        })
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_draft_system_prompt() -> String {
    "You write email replies on behalf of the mailbox owner.\n\n\
     Respond with ONLY a JSON object:\n\
     {\"reply\": \"...\", \"autoSend\": false, \"reasoning\": \"...\"}\n\n\
     Rules:\n\
     - \"reply\" is the plain-text body only: no subject line, no quoted original\n\
     - Sound natural and match the sender's register\n\
     - Set \"autoSend\" to true only when the reply is routine, factual and safe to send \
     without the owner reading it first\n\
     - Commitments, money, scheduling conflicts, sensitive topics or anything uncertain \
     mean \"autoSend\": false\n\
     - \"reasoning\" is one sentence explaining the autoSend decision"
        .to_string()
}

fn build_draft_user_prompt(request: &DraftRequest) -> String {
    let mut prompt = String::with_capacity(512);

    prompt.push_str(&format!("From: {}\n", request.from));
    prompt.push_str(&format!("To: {}\n", request.to));
    let subject = request.subject.as_deref().unwrap_or_default();
    if subject.trim().is_empty() {
        prompt.push_str("Subject: (none)\n");
    } else {
        prompt.push_str(&format!("Subject: {subject}\n"));
    }

    let body: String = request.body.chars().take(BODY_PROMPT_CHARS).collect();
    prompt.push_str(&format!("\nMessage:\n{body}"));

    prompt
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse the model output into a [`DraftReply`].
fn parse_draft_response(raw: &str) -> Result<DraftReply, String> {
    serde_json::from_str(json_object(raw)).map_err(|e| format!("JSON parse error: {e}"))
}

/// The outermost `{...}` of a model reply, looking inside a markdown fence
/// first when there is one.
fn json_object(text: &str) -> &str {
    let text = text.trim();
    let body = fenced_body(text).unwrap_or(text);
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if end > start => &body[start..=end],
        _ => body,
    }
}

/// Contents of the first ```` ``` ```` fence, minus its language tag line.
fn fenced_body(text: &str) -> Option<&str> {
    let (_, after_open) = text.split_once("```")?;
    let (inner, _) = after_open.split_once("```")?;
    let inner = match inner.split_once('\n') {
        Some((tag, rest)) if !tag.contains('{') => rest,
        _ => inner,
    };
    Some(inner.trim())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rust_decimal::Decimal;

    use super::*;
    use crate::llm::provider::CompletionResponse;

    // ── Stubs ───────────────────────────────────────────────────────

    struct StubLlm {
        content: String,
        fail: bool,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl StubLlm {
        fn replying(content: &str) -> Self {
            Self {
                content: content.to_string(),
                fail: false,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                content: String::new(),
                fail: true,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub-model"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().unwrap().push(request);
            if self.fail {
                return Err(LlmError::RequestFailed {
                    provider: "stub".into(),
                    reason: "connection refused".into(),
                });
            }
            Ok(CompletionResponse {
                content: self.content.clone(),
                input_tokens: 120,
                output_tokens: 40,
            })
        }
    }

    struct RecordingDrafter {
        result: Result<DraftReply, String>,
        seen: Mutex<Vec<DraftRequest>>,
    }

    #[async_trait]
    impl Drafter for RecordingDrafter {
        async fn draft(&self, request: &DraftRequest) -> Result<DraftReply, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            self.result.clone().map_err(|reason| LlmError::InvalidResponse {
                provider: "stub".into(),
                reason,
            })
        }
    }

    fn message(body_text: &str, snippet: &str) -> Message {
        Message {
            id: "42".into(),
            thread_id: "<root@example.com>".into(),
            message_id: "<m42@example.com>".into(),
            subject: Some("RE: Lunch?".into()),
            from: "Alice <alice@example.com>".into(),
            to: "me@example.com".into(),
            snippet: snippet.into(),
            date: None,
            body_text: body_text.into(),
            body_html: None,
        }
    }

    fn sample_request() -> DraftRequest {
        DraftRequest {
            subject: Some("Lunch?".into()),
            from: "Alice <alice@example.com>".into(),
            to: "me@example.com".into(),
            body: "Are we still on for noon?".into(),
        }
    }

    // ── Parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_plain_json() {
        let reply = parse_draft_response(
            r#"{"reply": "See you then!", "autoSend": true, "reasoning": "Simple confirmation"}"#,
        )
        .unwrap();
        assert_eq!(reply.reply, "See you then!");
        assert!(reply.auto_send);
        assert_eq!(reply.reasoning, "Simple confirmation");
    }

    #[test]
    fn parse_markdown_wrapped_json() {
        let raw = "Here you go:\n```json\n{\"reply\": \"Sure.\", \"autoSend\": false}\n```";
        let reply = parse_draft_response(raw).unwrap();
        assert_eq!(reply.reply, "Sure.");
        assert!(!reply.auto_send);
        assert_eq!(reply.reasoning, "");
    }

    #[test]
    fn parse_accepts_snake_case_auto_send() {
        let reply = parse_draft_response(r#"{"reply": "Ok", "auto_send": true}"#).unwrap();
        assert!(reply.auto_send);
    }

    #[test]
    fn parse_json_surrounded_by_prose() {
        let raw = "Sure! {\"reply\": \"Thanks!\", \"autoSend\": true} Hope that helps.";
        assert_eq!(parse_draft_response(raw).unwrap().reply, "Thanks!");
    }

    #[test]
    fn fenced_body_without_language_tag() {
        let raw = "Here you go:\n```\n{\"reply\": \"Hi\", \"autoSend\": false}\n```\nDone.";
        assert_eq!(json_object(raw), r#"{"reply": "Hi", "autoSend": false}"#);
    }

    #[test]
    fn fenced_body_on_one_line() {
        assert_eq!(json_object(r#"```{"reply": "Hi"}```"#), r#"{"reply": "Hi"}"#);
    }

    #[test]
    fn braces_inside_reply_text_survive() {
        let raw = r#"{"reply": "Use {name} here", "autoSend": false}"#;
        assert_eq!(parse_draft_response(raw).unwrap().reply, "Use {name} here");
    }

    #[test]
    fn parse_rejects_missing_reply() {
        let err = parse_draft_response(r#"{"autoSend": true, "reasoning": "x"}"#).unwrap_err();
        assert!(err.contains("reply"), "{err}");
    }

    #[test]
    fn parse_rejects_non_string_reply() {
        assert!(parse_draft_response(r#"{"reply": 7, "autoSend": true}"#).is_err());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_draft_response("I cannot help with that.").is_err());
    }

    // ── Prompt construction ─────────────────────────────────────────

    #[test]
    fn system_prompt_names_the_json_fields() {
        let prompt = build_draft_system_prompt();
        assert!(prompt.contains("\"reply\""));
        assert!(prompt.contains("\"autoSend\""));
        assert!(prompt.contains("\"reasoning\""));
    }

    #[test]
    fn user_prompt_includes_context() {
        let prompt = build_draft_user_prompt(&sample_request());
        assert!(prompt.contains("From: Alice <alice@example.com>"));
        assert!(prompt.contains("To: me@example.com"));
        assert!(prompt.contains("Subject: Lunch?"));
        assert!(prompt.contains("still on for noon"));
    }

    #[test]
    fn user_prompt_marks_missing_subject() {
        let mut request = sample_request();
        request.subject = None;
        assert!(build_draft_user_prompt(&request).contains("Subject: (none)"));
    }

    #[test]
    fn user_prompt_truncates_body() {
        let mut request = sample_request();
        request.body = "x".repeat(BODY_PROMPT_CHARS + 500);
        let prompt = build_draft_user_prompt(&request);
        let body = prompt.split("Message:\n").nth(1).unwrap();
        assert_eq!(body.chars().count(), BODY_PROMPT_CHARS);
    }

    // ── LlmDrafter ──────────────────────────────────────────────────

    #[tokio::test]
    async fn llm_drafter_parses_completion() {
        let llm = Arc::new(StubLlm::replying(
            r#"{"reply": "Thanks!", "autoSend": true, "reasoning": "ack"}"#,
        ));
        let drafter = LlmDrafter::new(llm.clone());

        let reply = drafter.draft(&sample_request()).await.unwrap();
        assert_eq!(reply.reply, "Thanks!");
        assert!(reply.auto_send);

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].messages.len(), 2);
        assert_eq!(seen[0].max_tokens, Some(DRAFT_MAX_TOKENS));
    }

    #[tokio::test]
    async fn llm_drafter_reports_malformed_payload() {
        let drafter = LlmDrafter::new(Arc::new(StubLlm::replying(r#"{"autoSend": true}"#)));
        let err = drafter.draft(&sample_request()).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn llm_drafter_propagates_request_failure() {
        let drafter = LlmDrafter::new(Arc::new(StubLlm::failing()));
        let err = drafter.draft(&sample_request()).await.unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed { .. }));
    }

    // ── DraftRequester ──────────────────────────────────────────────

    #[tokio::test]
    async fn requester_normalizes_message() {
        let drafter = Arc::new(RecordingDrafter {
            result: Ok(DraftReply {
                reply: "Yes, noon works.".into(),
                auto_send: false,
                reasoning: "Scheduling".into(),
            }),
            seen: Mutex::new(Vec::new()),
        });
        let requester = DraftRequester::new(drafter.clone(), "me@example.com");

        let draft = requester
            .request_for_message(&message("full body", "snip"))
            .await
            .unwrap();
        assert_eq!(draft.reply, "Yes, noon works.");
        assert_eq!(draft.subject, "Re: Lunch?");
        assert!(!draft.auto_send);

        let seen = drafter.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].body, "full body");
        assert_eq!(seen[0].to, "me@example.com");
        assert_eq!(seen[0].from, "Alice <alice@example.com>");
    }

    #[tokio::test]
    async fn requester_falls_back_to_snippet() {
        let drafter = Arc::new(RecordingDrafter {
            result: Ok(DraftReply {
                reply: "Ok".into(),
                auto_send: true,
                reasoning: String::new(),
            }),
            seen: Mutex::new(Vec::new()),
        });
        let requester = DraftRequester::new(drafter.clone(), "me@example.com");

        requester
            .request_for_message(&message("", "the snippet"))
            .await
            .unwrap();
        assert_eq!(drafter.seen.lock().unwrap()[0].body, "the snippet");
    }

    #[tokio::test]
    async fn requester_surfaces_failure_as_draft_unavailable() {
        let drafter = Arc::new(RecordingDrafter {
            result: Err("missing field `reply`".into()),
            seen: Mutex::new(Vec::new()),
        });
        let requester = DraftRequester::new(drafter, "me@example.com");

        let err = requester
            .request_for_message(&message("body", ""))
            .await
            .unwrap_err();
        match err {
            PipelineError::DraftUnavailable { message_id, reason } => {
                assert_eq!(message_id, "42");
                assert!(reason.contains("reply"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn draft_reply_serializes_camel_case() {
        let json = serde_json::to_value(DraftReply {
            reply: "r".into(),
            auto_send: true,
            reasoning: "why".into(),
        })
        .unwrap();
        assert_eq!(json["autoSend"], true);
        assert!(json.get("auto_send").is_none());
    }
}
