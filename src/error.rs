//! Error types for the inbox agent.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Mailbox transport errors (IMAP listing, SMTP sending, flag updates).
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Mailbox task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Auto-reply pipeline errors.
///
/// Single-message failures never escape the batch orchestrator; they are
/// converted into per-message outcomes there.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Draft unavailable for message {message_id}: {reason}")]
    DraftUnavailable { message_id: String, reason: String },

    #[error("Send to {to} failed: {reason}")]
    SendFailed { to: String, reason: String },

    #[error("Reply sent but message {message_id} could not be marked as replied: {reason}")]
    MarkAsRepliedFailed { message_id: String, reason: String },

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("An auto-reply run is already in progress")]
    BatchInProgress,
}
