//! Auto-reply pipeline.
//!
//! `AutoReplier` → `DraftRequester` → `gate::evaluate` → `ReplySender` →
//! `Mailbox`. The manual path (HTTP draft/send) uses the same requester and
//! sender but skips the gate: a human pressing send is the authorization.

pub mod address;
pub mod batch;
pub mod draft;
pub mod gate;
pub mod sender;
pub mod subject;

#[cfg(test)]
pub(crate) mod testing;

pub use address::extract_email_address;
pub use batch::{AutoReplier, BatchOutcome, BatchResult, MessageOutcome};
pub use draft::{Draft, DraftReply, DraftRequest, DraftRequester, Drafter, LlmDrafter};
pub use gate::SendDecision;
pub use sender::{MarkOutcome, ReplySender, SendReport, SendRequest};
pub use subject::build_reply_subject;
