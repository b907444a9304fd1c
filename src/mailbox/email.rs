//! IMAP + SMTP mailbox. IMAP over rustls for listing and flags, lettre for
//! outbound replies.

use async_trait::async_trait;
use lettre::message::Mailbox as Address;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::config::parse_value;
use crate::error::{ConfigError, MailboxError};
use crate::pipeline::address::extract_email_address;

use super::Mailbox;
use super::imap::ImapSession;
use super::parse::parse_message;
use super::types::{Message, OutgoingReply};

/// Flags set on the original message once a reply went out.
const REPLIED_FLAGS: &str = "\\Answered \\Seen";

// ── Configuration ───────────────────────────────────────────────────

/// Mailbox configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl EmailConfig {
    /// Build config from environment variables.
    /// Returns `Ok(None)` if `EMAIL_IMAP_HOST` is not set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let Some(imap_host) = var("EMAIL_IMAP_HOST") else {
            return Ok(None);
        };
        let port = |key: &str, default: u16| match var(key) {
            Some(raw) => parse_value::<u16>(key, &raw),
            None => Ok(default),
        };

        let imap_port = port("EMAIL_IMAP_PORT", 993)?;
        let smtp_host =
            var("EMAIL_SMTP_HOST").unwrap_or_else(|| imap_host.replace("imap", "smtp"));
        let smtp_port = port("EMAIL_SMTP_PORT", 587)?;

        let username = var("EMAIL_USERNAME").unwrap_or_default();
        let password = var("EMAIL_PASSWORD").unwrap_or_default();
        let from_address = var("EMAIL_FROM_ADDRESS").unwrap_or_else(|| username.clone());

        Ok(Some(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password: SecretString::from(password),
            from_address,
        }))
    }
}

// ── Mailbox ─────────────────────────────────────────────────────────

/// IMAP/SMTP-backed mailbox.
pub struct ImapMailbox {
    config: EmailConfig,
}

impl ImapMailbox {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    fn name(&self) -> &str {
        "imap"
    }

    async fn list_messages(&self, limit: usize) -> Result<Vec<Message>, MailboxError> {
        let config = self.config.clone();
        let messages = tokio::task::spawn_blocking(move || fetch_unseen(&config, limit))
            .await
            .map_err(|e| MailboxError::TaskFailed(e.to_string()))??;

        tracing::debug!(count = messages.len(), "Listed mailbox");
        Ok(messages)
    }

    async fn send_reply(&self, reply: &OutgoingReply) -> Result<(), MailboxError> {
        let config = self.config.clone();
        let reply = reply.clone();
        tokio::task::spawn_blocking(move || send_smtp(&config, &reply))
            .await
            .map_err(|e| MailboxError::TaskFailed(e.to_string()))?
    }

    async fn mark_as_replied(&self, message_id: &str) -> Result<(), MailboxError> {
        let uid: u32 = message_id.parse().map_err(|_| {
            MailboxError::Protocol(format!("'{message_id}' is not an IMAP UID"))
        })?;

        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = ImapSession::open(&config)?;
            session.add_flags(uid, REPLIED_FLAGS)?;
            session.logout();
            Ok::<(), MailboxError>(())
        })
        .await
        .map_err(|e| MailboxError::TaskFailed(e.to_string()))?
    }
}

/// Fetch the newest `limit` unseen messages, newest first (blocking).
fn fetch_unseen(config: &EmailConfig, limit: usize) -> Result<Vec<Message>, MailboxError> {
    let mut session = ImapSession::open(config)?;
    let uids = session.search_unseen()?;
    let own_address = extract_email_address(&config.from_address).to_ascii_lowercase();

    let mut messages = Vec::with_capacity(limit.min(uids.len()));
    for uid in uids.iter().rev().take(limit) {
        let Some(raw) = session.fetch_raw(*uid)? else {
            tracing::warn!(uid, "FETCH returned no body");
            continue;
        };
        let Some(message) = parse_message(&uid.to_string(), &raw) else {
            tracing::warn!(uid, "Skipping unparseable message");
            continue;
        };
        // Self-loop prevention
        if extract_email_address(&message.from).eq_ignore_ascii_case(&own_address) {
            tracing::debug!(uid, "Skipping self-sent message");
            continue;
        }
        messages.push(message);
    }

    session.logout();
    Ok(messages)
}

/// Build the RFC 5322 reply.
fn build_reply(from: &str, reply: &OutgoingReply) -> Result<lettre::Message, MailboxError> {
    let from: Address = from.parse().map_err(|e| MailboxError::InvalidAddress {
        address: from.to_string(),
        reason: format!("{e}"),
    })?;
    let to: Address = reply.to.parse().map_err(|e| MailboxError::InvalidAddress {
        address: reply.to.clone(),
        reason: format!("{e}"),
    })?;

    let mut builder = lettre::Message::builder()
        .from(from)
        .to(to)
        .subject(reply.subject.clone());

    if let Some(in_reply_to) = reply.in_reply_to.as_deref().filter(|s| !s.is_empty()) {
        builder = builder.in_reply_to(in_reply_to.to_string());
    }
    if let Some(references) = reply.references.as_deref().filter(|s| !s.is_empty()) {
        builder = builder.references(references.to_string());
    }

    builder
        .body(reply.body.clone())
        .map_err(|e| MailboxError::Smtp(format!("Failed to build email: {e}")))
}

/// Send via SMTP (blocking). Port 465 = implicit TLS, otherwise STARTTLS.
fn send_smtp(config: &EmailConfig, reply: &OutgoingReply) -> Result<(), MailboxError> {
    let email = build_reply(&config.from_address, reply)?;

    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    let relay = if config.smtp_port == 465 {
        SmtpTransport::relay(&config.smtp_host)
    } else {
        SmtpTransport::starttls_relay(&config.smtp_host)
    };
    let builder = relay.map_err(|e| MailboxError::Smtp(format!("SMTP relay error: {e}")))?;

    let transport = builder.port(config.smtp_port).credentials(creds).build();

    transport
        .send(&email)
        .map_err(|e| MailboxError::Smtp(format!("SMTP send failed: {e}")))?;

    tracing::info!(to = %reply.to, thread_id = %reply.thread_id, "Email sent");
    Ok(())
}
