//! Reply subject composition.

const REPLY_PREFIX: &str = "Re:";

/// Canonical reply subject for `original`.
///
/// Every leading `Re:` (any case, repeated, with surrounding whitespace) is
/// collapsed into a single `Re: `. An absent or blank subject, or one that is
/// nothing but prefixes, yields a bare `Re:`. Other prefixes such as `Fwd:`
/// are kept as part of the subject text.
pub fn build_reply_subject(original: Option<&str>) -> String {
    let rest = strip_reply_prefixes(original.unwrap_or_default());
    if rest.is_empty() {
        REPLY_PREFIX.to_string()
    } else {
        format!("{REPLY_PREFIX} {rest}")
    }
}

fn strip_reply_prefixes(subject: &str) -> &str {
    let mut rest = subject.trim();
    while rest.len() >= REPLY_PREFIX.len()
        && rest.is_char_boundary(REPLY_PREFIX.len())
        && rest[..REPLY_PREFIX.len()].eq_ignore_ascii_case(REPLY_PREFIX)
    {
        rest = rest[REPLY_PREFIX.len()..].trim_start();
    }
    rest
}
