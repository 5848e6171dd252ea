//! Usage: Scope normalization (shorthand -> fully-qualified URIs) and canonical cache form.

use crate::shared::error::AppResult;
use std::collections::BTreeSet;

pub const SCOPE_PREFIX: &str = "https://www.googleapis.com/auth/";

/// OpenID Connect scopes that never carry the authorization-server prefix.
const PREFIXLESS_SCOPES: [&str; 3] = ["profile", "email", "openid"];

const SECURE_SCHEME: &str = "https://";

pub fn expand_scope(raw: &str) -> String {
    let scope = raw.trim();
    if scope.starts_with(SECURE_SCHEME) || PREFIXLESS_SCOPES.contains(&scope) {
        return scope.to_string();
    }
    format!("{SCOPE_PREFIX}{scope}")
}

/// Expands every raw scope, keeping caller order. Blank entries are dropped.
pub fn expand_scopes<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.trim().is_empty())
        .map(expand_scope)
        .collect()
}

/// Sorted, de-duplicated, space-joined form used for cache keys and `scope` parameters.
pub fn canonical_scope_string<S: AsRef<str>>(scopes: &[S]) -> String {
    scopes
        .iter()
        .map(AsRef::as_ref)
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn require_scopes(scopes: &[String]) -> AppResult<()> {
    if scopes.is_empty() {
        return Err("INVALID_INPUT: No scopes provided".to_string().into());
    }
    Ok(())
}

/// True when every requested scope is contained in `allowed`.
pub(crate) fn is_subset_of(scopes: &[String], allowed: &[&str]) -> bool {
    scopes.iter().all(|s| allowed.contains(&s.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::ErrorKind;

    #[test]
    fn shorthand_scopes_get_prefixed() {
        let expanded = expand_scopes(&["userinfo.email", "bigquery"]);
        assert_eq!(
            expanded,
            vec![
                "https://www.googleapis.com/auth/userinfo.email".to_string(),
                "https://www.googleapis.com/auth/bigquery".to_string(),
            ]
        );
    }

    #[test]
    fn full_uris_and_oidc_scopes_pass_through() {
        let expanded = expand_scopes(&[
            "https://example.com/custom",
            "profile",
            "email",
            "openid",
        ]);
        assert_eq!(
            expanded,
            vec!["https://example.com/custom", "profile", "email", "openid"]
        );
    }

    #[test]
    fn plain_http_is_not_treated_as_a_uri() {
        assert_eq!(
            expand_scope("http://example.com/x"),
            "https://www.googleapis.com/auth/http://example.com/x"
        );
    }

    #[test]
    fn expansion_is_idempotent() {
        let raw = ["compute", "openid", "https://www.googleapis.com/auth/drive", "email"];
        let once = expand_scopes(&raw);
        let twice = expand_scopes(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn blank_entries_are_dropped() {
        assert!(expand_scopes(&["", "   "]).is_empty());
    }

    #[test]
    fn canonical_string_ignores_order_and_duplicates() {
        let a = expand_scopes(&["bigquery", "userinfo.email", "bigquery"]);
        let b = expand_scopes(&["userinfo.email", "bigquery"]);
        assert_eq!(canonical_scope_string(&a), canonical_scope_string(&b));
        assert_eq!(
            canonical_scope_string(&b),
            "https://www.googleapis.com/auth/bigquery https://www.googleapis.com/auth/userinfo.email"
        );
    }

    #[test]
    fn require_scopes_rejects_empty_list() {
        let err = require_scopes(&[]).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(require_scopes(&["openid".to_string()]).is_ok());
    }

    #[test]
    fn subset_check_is_strict() {
        let allowed = ["a", "b"];
        assert!(is_subset_of(&["a".to_string()], &allowed));
        assert!(is_subset_of(&[], &allowed));
        assert!(!is_subset_of(&["a".to_string(), "c".to_string()], &allowed));
    }
}
