//! Send gate: the only place that authorizes unattended sending.

use crate::pipeline::draft::Draft;

/// Gate verdict for one draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDecision {
    Send,
    Hold,
}

/// `Send` iff the drafter recommended auto-send and the reply has content
/// after trimming whitespace.
pub fn evaluate(draft: &Draft) -> SendDecision {
    if draft.auto_send && !draft.reply.trim().is_empty() {
        SendDecision::Send
    } else {
        SendDecision::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(auto_send: bool, reply: &str) -> Draft {
        Draft {
            reply: reply.into(),
            auto_send,
            reasoning: String::new(),
            subject: "Re: x".into(),
        }
    }

    #[test]
    fn auto_send_with_content_sends() {
        assert_eq!(evaluate(&draft(true, "Thanks!")), SendDecision::Send);
    }

    #[test]
    fn auto_send_with_blank_reply_holds() {
        assert_eq!(evaluate(&draft(true, "")), SendDecision::Hold);
        assert_eq!(evaluate(&draft(true, " \n\t ")), SendDecision::Hold);
    }

    #[test]
    fn no_auto_send_with_content_holds() {
        assert_eq!(evaluate(&draft(false, "Thanks!")), SendDecision::Hold);
    }

    #[test]
    fn no_auto_send_with_blank_reply_holds() {
        assert_eq!(evaluate(&draft(false, "  ")), SendDecision::Hold);
    }
}
