//! Address resolution for `Display Name <address>` strings.

use std::sync::LazyLock;

use regex::Regex;

static ANGLE_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("static regex is valid"));

/// Bare address from `Display Name <address>`; the trimmed input when there
/// is no angle-bracket part.
pub fn extract_email_address(input: &str) -> &str {
    match ANGLE_ADDRESS.captures(input).and_then(|c| c.get(1)) {
        Some(address) => address.as_str(),
        None => input.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_form() {
        assert_eq!(
            extract_email_address("Alice Example <alice@example.com>"),
            "alice@example.com"
        );
    }

    #[test]
    fn quoted_display_name_with_comma() {
        assert_eq!(
            extract_email_address(r#""Example, Alice" <alice@example.com>"#),
            "alice@example.com"
        );
    }

    #[test]
    fn bare_address_is_trimmed() {
        assert_eq!(extract_email_address("  bob@example.com \n"), "bob@example.com");
    }

    #[test]
    fn angle_only() {
        assert_eq!(extract_email_address("<carol@example.com>"), "carol@example.com");
    }

    #[test]
    fn first_bracket_pair_wins() {
        assert_eq!(
            extract_email_address("A <a@example.com>, B <b@example.com>"),
            "a@example.com"
        );
    }

    #[test]
    fn empty_brackets_fall_back_to_trimmed_input() {
        assert_eq!(extract_email_address(" Nobody <> "), "Nobody <>");
    }

    #[test]
    fn resolving_twice_is_stable() {
        let once = extract_email_address("Dan <dan@example.com>");
        assert_eq!(extract_email_address(once), once);
    }
}
