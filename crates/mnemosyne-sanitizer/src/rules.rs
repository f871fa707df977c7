//! Pattern-based redaction rules.

use std::borrow::Cow;

use regex::Regex;

use crate::error::{Result, SanitizeError};

/// Marker written over values whose key looks sensitive.
pub const REDACTED: &str = "***REDACTED***";

/// Marker written over every email address.
pub const EMAIL_REDACTED: &str = "***EMAIL_REDACTED***";

/// Map keys whose values are redacted wholesale (case-insensitive substring match).
pub const SENSITIVE_KEYS: [&str; 7] = [
    "password",
    "pwd",
    "secret",
    "token",
    "api_key",
    "credit_card",
    "ssn",
];

pub(crate) const EMAIL_PATTERN: &str = r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b";

/// Built-in rules as `(name, pattern, replacement)`, applied in order.
pub(crate) const BUILTIN_RULES: [(&str, &str, &str); 4] = [
    (
        "password",
        r#"(?i)(password|pwd|passwd)["\s]*[=:]["\s]*([^\s,}"]+)"#,
        "${1}=***REDACTED***",
    ),
    (
        "credit_card",
        r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b",
        "****-****-****-XXXX",
    ),
    ("ssn", r"\b\d{3}-\d{2}-\d{4}\b", "***-**-XXXX"),
    (
        "api_key",
        r"(?i)(api[_-]?key|token|secret)\s*[=:]\s*([a-zA-Z0-9_-]{20,})",
        "${1}=***REDACTED***",
    ),
];

/// Returns true if `key` contains any of [`SENSITIVE_KEYS`], ignoring case.
#[must_use]
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|sensitive| lower.contains(sensitive))
}

/// A named regex substitution.
///
/// Replacements use `regex` syntax for capture groups (`$1`, `${name}`).
#[derive(Debug, Clone)]
pub struct SanitizationRule {
    name: String,
    pattern: Regex,
    replacement: String,
}

impl SanitizationRule {
    /// Compiles a rule.
    ///
    /// # Errors
    ///
    /// Returns [`SanitizeError::EmptyPattern`] for an empty pattern and
    /// [`SanitizeError::InvalidPattern`] when the pattern does not compile.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        if pattern.is_empty() {
            return Err(SanitizeError::EmptyPattern { name });
        }
        let compiled = Regex::new(pattern).map_err(|source| SanitizeError::InvalidPattern {
            name: name.clone(),
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            name,
            pattern: compiled,
            replacement: replacement.into(),
        })
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Substitutes every match in `text`.
    #[must_use]
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.pattern.replace_all(text, self.replacement.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin(name: &str) -> SanitizationRule {
        let (n, p, r) = BUILTIN_RULES
            .iter()
            .find(|(n, _, _)| *n == name)
            .copied()
            .unwrap();
        SanitizationRule::new(n, p, r).unwrap()
    }

    #[test]
    fn test_builtin_rules_compile() {
        for (name, pattern, replacement) in BUILTIN_RULES {
            assert!(SanitizationRule::new(name, pattern, replacement).is_ok(), "{name}");
        }
        assert!(Regex::new(EMAIL_PATTERN).is_ok());
    }

    #[test]
    fn test_password_rule_forms() {
        let rule = builtin("password");
        assert_eq!(rule.apply("password=hunter2"), "password=***REDACTED***");
        assert_eq!(rule.apply("PWD: hunter2"), "PWD=***REDACTED***");
        assert_eq!(
            rule.apply(r#"{"password":"hunter2"}"#),
            r#"{"password=***REDACTED***"}"#
        );
    }

    #[test]
    fn test_credit_card_rule_separators() {
        let rule = builtin("credit_card");
        for card in ["4111111111111111", "4111-1111-1111-1111", "4111 1111 1111 1111"] {
            assert_eq!(rule.apply(&format!("card {card} ok")), "card ****-****-****-XXXX ok");
        }
        assert_eq!(rule.apply("411111111111"), "411111111111");
    }

    #[test]
    fn test_ssn_rule() {
        let rule = builtin("ssn");
        assert_eq!(rule.apply("ssn 123-45-6789."), "ssn ***-**-XXXX.");
        assert_eq!(rule.apply("12-345-6789"), "12-345-6789");
    }

    #[test]
    fn test_api_key_rule_needs_twenty_chars() {
        let rule = builtin("api_key");
        assert_eq!(
            rule.apply("api_key=abcdefghij_klmnopqrst-uv"),
            "api_key=***REDACTED***"
        );
        assert_eq!(rule.apply("token: short"), "token: short");
    }

    #[test]
    fn test_sensitive_key_matching() {
        assert!(is_sensitive_key("password"));
        assert!(is_sensitive_key("DB_PASSWORD"));
        assert!(is_sensitive_key("accessToken"));
        assert!(is_sensitive_key("user_ssn"));
        assert!(!is_sensitive_key("username"));
        assert!(!is_sensitive_key("session_id"));
    }

    #[test]
    fn test_rule_rejects_empty_and_invalid() {
        assert!(matches!(
            SanitizationRule::new("empty", "", "x"),
            Err(SanitizeError::EmptyPattern { .. })
        ));
        assert!(matches!(
            SanitizationRule::new("bad", "(unclosed", "x"),
            Err(SanitizeError::InvalidPattern { .. })
        ));
    }
}
