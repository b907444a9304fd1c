//! RFC 5322 → `Message` conversion on top of mail-parser.

use mail_parser::{Address, HeaderValue, MessageParser, PartType};
use uuid::Uuid;

use super::types::Message;

/// Snippet length in characters.
const SNIPPET_CHARS: usize = 200;

/// Parse a raw RFC 5322 message fetched under `uid`.
///
/// Returns `None` when the bytes are not a parseable message.
pub fn parse_message(uid: &str, raw: &[u8]) -> Option<Message> {
    let parsed = MessageParser::default().parse(raw)?;

    let message_id = parsed
        .message_id()
        .map(bracketed)
        .unwrap_or_else(|| format!("<gen-{}@inbox-agent>", Uuid::new_v4()));

    let thread_id = first_message_id(parsed.references())
        .or_else(|| first_message_id(parsed.in_reply_to()))
        .unwrap_or_else(|| message_id.clone());

    // body_text/body_html convert between formats, so look at the parts
    // themselves.
    let body_html = parsed.html_part(0).and_then(|part| match &part.body {
        PartType::Html(html) => Some(html.to_string()),
        _ => None,
    });
    let body_text = match parsed.text_part(0).map(|part| &part.body) {
        Some(PartType::Text(text)) => text.to_string(),
        _ => body_html.as_deref().map(strip_html).unwrap_or_default(),
    };

    let date = parsed
        .date()
        .and_then(|d| chrono::DateTime::from_timestamp(d.to_timestamp(), 0));

    Some(Message {
        id: uid.to_string(),
        thread_id,
        message_id,
        subject: parsed.subject().map(str::to_string),
        from: display_sender(parsed.from()),
        to: extract_addresses(parsed.to()).join(", "),
        snippet: snippet(&body_text),
        date,
        body_text,
        body_html,
    })
}

/// Wrap a bare message id in angle brackets.
fn bracketed(id: &str) -> String {
    let id = id.trim().trim_start_matches('<').trim_end_matches('>');
    format!("<{id}>")
}

/// First message id in a `References`/`In-Reply-To` header value.
fn first_message_id(value: &HeaderValue) -> Option<String> {
    let first = match value {
        HeaderValue::Text(text) => text.split_whitespace().next().map(str::to_string),
        HeaderValue::TextList(list) => list.first().map(|s| s.to_string()),
        _ => None,
    }?;
    if first.trim().is_empty() {
        None
    } else {
        Some(bracketed(&first))
    }
}

/// First sender as `Name <address>`, or the bare address when unnamed.
fn display_sender(addr: Option<&Address>) -> String {
    let Some(first) = addr.and_then(|a| a.first()) else {
        return "unknown".to_string();
    };
    match (first.name(), first.address()) {
        (Some(name), Some(address)) if !name.trim().is_empty() => {
            format!("{} <{}>", name.trim(), address)
        }
        (_, Some(address)) => address.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Extract email addresses from an optional mail_parser Address field.
///
/// Returns an empty vec if the address is None.
pub fn extract_addresses(addr: Option<&Address>) -> Vec<String> {
    let Some(addr) = addr else {
        return Vec::new();
    };
    match addr {
        Address::List(addrs) => addrs
            .iter()
            .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            .collect(),
        Address::Group(groups) => groups
            .iter()
            .flat_map(|g| {
                g.addresses
                    .iter()
                    .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            })
            .collect(),
    }
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    // Normalize whitespace
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-normalized prefix of the body.
pub fn snippet(body: &str) -> String {
    let normalized = body.split_whitespace().collect::<Vec<_>>().join(" ");
    normalized.chars().take(SNIPPET_CHARS).collect()
}
