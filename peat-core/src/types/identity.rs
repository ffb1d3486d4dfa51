//! Scan identities and the cache keys derived from them.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_EMAIL_LEN, MAX_EMAIL_LOCAL_LEN, MAX_USERNAMES, MAX_USERNAME_LEN, MIN_EMAIL_LEN,
};
use crate::error::{PeatError, Result};

/// Kind of scan being performed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanKind {
    /// Breach, registration and presence lookups for an email.
    #[default]
    Email,
    /// Presence lookups only.
    Username,
}

impl ScanKind {
    /// Returns the wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanKind::Email => "email",
            ScanKind::Username => "username",
        }
    }
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subject of a scan: an email address or a set of usernames.
///
/// Use [`Identity::email`] / [`Identity::usernames`] to build a validated
/// identity. The variants stay public so [`Identity::validate`] can act as a
/// last check on values built elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Identity {
    /// Normalized (trimmed, lowercased) email address.
    Email(String),
    /// Ordered, deduplicated usernames (1 to 5).
    Usernames(Vec<String>),
}

impl Identity {
    /// Creates a validated, normalized email identity.
    pub fn email(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        validate_email(&normalized)?;
        Ok(Identity::Email(normalized))
    }

    /// Creates a validated username identity.
    ///
    /// Blank entries are dropped and duplicates removed, keeping the first
    /// occurrence.
    pub fn usernames<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in raw {
            let trimmed = name.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }
            validate_username(trimmed)?;
            if !names.iter().any(|n| n == trimmed) {
                names.push(trimmed.to_string());
            }
        }

        if names.is_empty() {
            return Err(PeatError::ValidationError(
                "at least one username is required".into(),
            ));
        }
        if names.len() > MAX_USERNAMES {
            return Err(PeatError::ValidationError(format!(
                "at most {} usernames may be scanned at once, got {}",
                MAX_USERNAMES,
                names.len()
            )));
        }

        Ok(Identity::Usernames(names))
    }

    /// Builds an identity from optional request parameters.
    ///
    /// Exactly one of `email` or `usernames` must be present.
    pub fn parse(email: Option<&str>, usernames: &[String]) -> Result<Self> {
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        let has_usernames = usernames.iter().any(|u| !u.trim().is_empty());

        match (email, has_usernames) {
            (Some(_), true) => Err(PeatError::ValidationError(
                "cannot specify both email and usernames".into(),
            )),
            (Some(email), false) => Self::email(email),
            (None, true) => Self::usernames(usernames),
            (None, false) => Err(PeatError::ValidationError(
                "either an email or at least one username is required".into(),
            )),
        }
    }

    /// Re-checks the identity shape.
    ///
    /// Cheaper than full validation: a non-empty email with an `@`, or 1 to 5
    /// non-blank usernames.
    pub fn validate(&self) -> Result<()> {
        match self {
            Identity::Email(email) => {
                let email = email.trim();
                if email.is_empty() || !email.contains('@') {
                    return Err(PeatError::InvalidEmail(email.to_string()));
                }
                Ok(())
            }
            Identity::Usernames(names) => {
                if names.is_empty() || names.iter().any(|n| n.trim().is_empty()) {
                    return Err(PeatError::ValidationError(
                        "username list must contain only non-blank usernames".into(),
                    ));
                }
                if names.len() > MAX_USERNAMES {
                    return Err(PeatError::ValidationError(format!(
                        "at most {} usernames may be scanned at once",
                        MAX_USERNAMES
                    )));
                }
                Ok(())
            }
        }
    }

    /// Returns the scan kind for this identity.
    pub fn kind(&self) -> ScanKind {
        match self {
            Identity::Email(_) => ScanKind::Email,
            Identity::Usernames(_) => ScanKind::Username,
        }
    }

    /// Returns the email, if this is an email identity.
    pub fn as_email(&self) -> Option<&str> {
        match self {
            Identity::Email(email) => Some(email),
            Identity::Usernames(_) => None,
        }
    }

    /// Returns the usernames, if this is a username identity.
    pub fn as_usernames(&self) -> Option<&[String]> {
        match self {
            Identity::Email(_) => None,
            Identity::Usernames(names) => Some(names),
        }
    }

    /// Usernames to probe for presence.
    ///
    /// Email identities fall back to the local part of the address.
    pub fn presence_usernames(&self) -> Vec<String> {
        match self {
            Identity::Email(email) => email
                .split('@')
                .next()
                .filter(|local| !local.is_empty())
                .map(|local| vec![local.to_string()])
                .unwrap_or_default(),
            Identity::Usernames(names) => names.clone(),
        }
    }

    /// Human-readable label (the email, or the usernames joined by ", ").
    pub fn label(&self) -> String {
        match self {
            Identity::Email(email) => email.clone(),
            Identity::Usernames(names) => names.join(", "),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Email(email) => write!(f, "email:{}", email),
            Identity::Usernames(names) => write!(f, "usernames:{}", names.join(",")),
        }
    }
}

/// Deterministic cache key derived from an [`Identity`].
///
/// `email:<lowercased email>` or `usernames:<sorted,comma-joined>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanKey(String);

impl ScanKey {
    /// Derives the key for an identity.
    ///
    /// Returns `None` for an empty email or an empty username set.
    pub fn derive(identity: &Identity) -> Option<Self> {
        match identity {
            Identity::Email(email) => {
                let normalized = email.trim().to_lowercase();
                if normalized.is_empty() {
                    None
                } else {
                    Some(ScanKey(format!("email:{}", normalized)))
                }
            }
            Identity::Usernames(names) => {
                let mut sorted: Vec<&str> = names
                    .iter()
                    .map(|n| n.trim())
                    .filter(|n| !n.is_empty())
                    .collect();
                if sorted.is_empty() {
                    return None;
                }
                sorted.sort_unstable();
                sorted.dedup();
                Some(ScanKey(format!("usernames:{}", sorted.join(","))))
            }
        }
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(
            r"^[a-z0-9.!#$%&*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)+$",
        )
        .expect("email pattern is valid")
    })
}

fn username_regex() -> &'static Regex {
    static USERNAME_RE: OnceLock<Regex> = OnceLock::new();
    USERNAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("username pattern is valid"))
}

/// Validates an already trimmed and lowercased email address.
fn validate_email(email: &str) -> Result<()> {
    let invalid = || PeatError::InvalidEmail(email.to_string());

    if email.len() < MIN_EMAIL_LEN || email.len() > MAX_EMAIL_LEN {
        return Err(invalid());
    }
    if !email_regex().is_match(email) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.len() > MAX_EMAIL_LOCAL_LEN || domain.len() < 3 || domain.len() > 253 {
        return Err(invalid());
    }
    if email.contains("..") || email.starts_with('.') || email.ends_with('.') || local.ends_with('.') {
        return Err(invalid());
    }

    Ok(())
}

/// Validates a single trimmed username.
fn validate_username(name: &str) -> Result<()> {
    let invalid = || PeatError::InvalidUsername(name.to_string());

    if name.is_empty() || name.len() > MAX_USERNAME_LEN {
        return Err(invalid());
    }
    if !username_regex().is_match(name) {
        return Err(invalid());
    }
    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(invalid());
    }
    if name.contains("..") || name.contains("--") || name.contains("__") {
        return Err(invalid());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("alice@example.com" ; "plain")]
    #[test_case("  Alice@Example.COM " ; "mixed case and padding")]
    #[test_case("first.last+tag@mail.example.org" ; "dots and plus")]
    fn test_valid_emails(raw: &str) {
        let identity = Identity::email(raw).unwrap();
        assert_eq!(identity.as_email().unwrap(), raw.trim().to_lowercase());
    }

    #[test_case("" ; "empty")]
    #[test_case("a@b" ; "too short")]
    #[test_case("no-at-sign.example.com" ; "missing at")]
    #[test_case("alice..bob@example.com" ; "double dot")]
    #[test_case(".alice@example.com" ; "leading dot")]
    #[test_case("alice@example" ; "no tld")]
    #[test_case("<script>@example.com" ; "angle brackets")]
    fn test_invalid_emails(raw: &str) {
        assert!(Identity::email(raw).is_err());
    }

    #[test_case("alice" ; "simple")]
    #[test_case("alice_b.c-d" ; "separators")]
    #[test_case("A1" ; "short")]
    fn test_valid_usernames(name: &str) {
        assert!(Identity::usernames([name]).is_ok());
    }

    #[test_case("-alice" ; "leading dash")]
    #[test_case("alice." ; "trailing dot")]
    #[test_case("al..ice" ; "double dot")]
    #[test_case("al__ice" ; "double underscore")]
    #[test_case("al ice" ; "space")]
    #[test_case("al;ice" ; "semicolon")]
    fn test_invalid_usernames(name: &str) {
        assert!(matches!(
            Identity::usernames([name]),
            Err(PeatError::InvalidUsername(_))
        ));
    }

    #[test]
    fn test_usernames_dedup_and_bounds() {
        let identity = Identity::usernames(["bob", " alice ", "bob", ""]).unwrap();
        assert_eq!(identity.as_usernames().unwrap(), &["bob".to_string(), "alice".to_string()]);

        assert!(Identity::usernames(Vec::<String>::new()).is_err());
        assert!(Identity::usernames(["a1", "a2", "a3", "a4", "a5", "a6"]).is_err());
        assert!(Identity::usernames(["a1", "a2", "a3", "a4", "a5"]).is_ok());
    }

    #[test]
    fn test_parse_rejects_mixing_and_absence() {
        let names = vec!["alice".to_string()];
        assert!(Identity::parse(Some("alice@example.com"), &names).is_err());
        assert!(Identity::parse(None, &[]).is_err());
        assert!(Identity::parse(Some("   "), &[]).is_err());

        let email = Identity::parse(Some("alice@example.com"), &[]).unwrap();
        assert_eq!(email.kind(), ScanKind::Email);
        let users = Identity::parse(None, &names).unwrap();
        assert_eq!(users.kind(), ScanKind::Username);
    }

    #[test]
    fn test_validate_shape() {
        assert!(Identity::Email("alice@example.com".into()).validate().is_ok());
        assert!(Identity::Email("".into()).validate().is_err());
        assert!(Identity::Usernames(vec![]).validate().is_err());
        assert!(Identity::Usernames(vec!["  ".into()]).validate().is_err());
        assert!(Identity::Usernames(vec!["x".into(); 6]).validate().is_err());
    }

    #[test]
    fn test_presence_usernames_defaults_to_local_part() {
        let identity = Identity::email("Alice.Smith@example.com").unwrap();
        assert_eq!(identity.presence_usernames(), vec!["alice.smith".to_string()]);

        let identity = Identity::usernames(["bob", "carol"]).unwrap();
        assert_eq!(identity.presence_usernames().len(), 2);
    }

    #[test]
    fn test_scan_key_format() {
        let email = Identity::Email("Alice@Example.com".into());
        assert_eq!(ScanKey::derive(&email).unwrap().as_str(), "email:alice@example.com");

        let users = Identity::Usernames(vec!["zed".into(), "amy".into()]);
        assert_eq!(ScanKey::derive(&users).unwrap().as_str(), "usernames:amy,zed");
    }

    #[test]
    fn test_scan_key_absent_for_empty_identity() {
        assert!(ScanKey::derive(&Identity::Email(String::new())).is_none());
        assert!(ScanKey::derive(&Identity::Usernames(vec![])).is_none());
    }

    proptest! {
        #[test]
        fn prop_email_key_is_case_insensitive(local in "[a-z0-9]{1,12}", domain in "[a-z]{2,10}") {
            let lower = format!("{}@{}.com", local, domain);
            let upper = lower.to_uppercase();
            let a = ScanKey::derive(&Identity::Email(lower.clone()));
            let b = ScanKey::derive(&Identity::Email(upper));
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a, ScanKey::derive(&Identity::Email(lower)));
        }

        #[test]
        fn prop_username_key_is_order_independent(
            names in proptest::collection::vec("[a-z0-9]{1,10}", 1..=5),
        ) {
            let mut reversed = names.clone();
            reversed.reverse();
            let mut rotated = names.clone();
            rotated.rotate_left(1);

            let key = ScanKey::derive(&Identity::Usernames(names));
            prop_assert_eq!(&key, &ScanKey::derive(&Identity::Usernames(reversed)));
            prop_assert_eq!(&key, &ScanKey::derive(&Identity::Usernames(rotated)));
        }
    }
}
