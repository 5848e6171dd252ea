//! Usage: Redaction for tokens that reach logs, and the callback `state` comparison.

use subtle::ConstantTimeEq;

const VISIBLE_PREFIX: usize = 6;
const VISIBLE_SUFFIX: usize = 4;
const MAX_STARS: usize = 8;

/// Keeps enough of a token to tell two apart in a log line (`ya29.a...7890`).
/// Short or non-ASCII values are starred out entirely.
pub(crate) fn mask_token(token: &str) -> String {
    let token = token.trim();
    let len = token.len();
    if len == 0 {
        return String::new();
    }
    if len <= VISIBLE_PREFIX + VISIBLE_SUFFIX || !token.is_ascii() {
        return "*".repeat(len.min(MAX_STARS));
    }
    format!("{}...{}", &token[..VISIBLE_PREFIX], &token[len - VISIBLE_SUFFIX..])
}

pub(crate) fn state_matches(expected: &str, received: &str) -> bool {
    expected.as_bytes().ct_eq(received.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::{mask_token, state_matches};

    #[test]
    fn access_tokens_keep_their_prefix_and_tail() {
        assert_eq!(mask_token("ya29.abcdef1234567890"), "ya29.a...7890");
        assert_eq!(mask_token("  1//refresh-token-value  "), "1//ref...alue");
    }

    #[test]
    fn short_or_blank_values_reveal_nothing() {
        assert_eq!(mask_token("abcd"), "****");
        assert_eq!(mask_token("   "), "");
        assert_eq!(mask_token("ééééééééééééé"), "********");
    }

    #[test]
    fn state_comparison_is_exact() {
        assert!(state_matches("s1-abc", "s1-abc"));
        assert!(!state_matches("s1-abc", "s1-abd"));
        assert!(!state_matches("s1-abc", "s1-ab"));
    }
}
