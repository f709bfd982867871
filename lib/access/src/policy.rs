//! Email access policy.
//!
//! A policy is built per rule from two lists:
//! - `whitelist`: exact email addresses (case-sensitive)
//! - `domains`: email domains; subdomains match too (case-insensitive)
//!
//! An empty list places no constraint. With both lists empty, any
//! authenticated email is permitted.

use plex_forward_auth_core::Email;
use serde::{Deserialize, Serialize};

/// How the whitelist and domain checks combine when both are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every configured list must match: with both lists set, a
    /// whitelisted address outside the configured domains is refused.
    /// Use [`MatchMode::Any`] to admit it.
    #[default]
    All,
    /// Any configured list may match.
    Any,
}

impl MatchMode {
    /// Maps the `match_whitelist_or_domain` setting to a mode.
    #[must_use]
    pub fn from_whitelist_or_domain(enabled: bool) -> Self {
        if enabled { Self::Any } else { Self::All }
    }
}

/// The raw whitelist and domain lists, as configured globally or on a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLists {
    /// Exact email addresses.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Email domains.
    #[serde(default)]
    pub domains: Vec<String>,
}

impl AccessLists {
    /// Creates lists from whitelist and domain entries.
    #[must_use]
    pub fn new(whitelist: Vec<String>, domains: Vec<String>) -> Self {
        Self { whitelist, domains }
    }

    /// Returns true if neither list has entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.whitelist.is_empty() && self.domains.is_empty()
    }
}

/// A resolved policy ready to evaluate emails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    whitelist: Vec<String>,
    domains: Vec<String>,
    mode: MatchMode,
}

impl AccessPolicy {
    /// Creates a policy from a single set of lists.
    #[must_use]
    pub fn new(lists: &AccessLists, mode: MatchMode) -> Self {
        let whitelist = lists
            .whitelist
            .iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect();
        let domains = lists
            .domains
            .iter()
            .map(|entry| normalize_domain(entry))
            .filter(|entry| !entry.is_empty())
            .collect();
        Self {
            whitelist,
            domains,
            mode,
        }
    }

    /// Resolves the policy for a rule.
    ///
    /// Rule lists take precedence as a pair: if the rule sets either a
    /// whitelist or domains, the global lists are ignored entirely.
    #[must_use]
    pub fn resolve(rule: &AccessLists, global: &AccessLists, mode: MatchMode) -> Self {
        if rule.is_empty() {
            Self::new(global, mode)
        } else {
            Self::new(rule, mode)
        }
    }

    /// Returns true if `email` satisfies the policy.
    #[must_use]
    pub fn permit(&self, email: &Email) -> bool {
        let whitelist = (!self.whitelist.is_empty()).then(|| self.in_whitelist(email));
        let domains = (!self.domains.is_empty()).then(|| self.in_domains(email));

        match (whitelist, domains) {
            (None, None) => true,
            (Some(matched), None) | (None, Some(matched)) => matched,
            (Some(w), Some(d)) => match self.mode {
                MatchMode::All => w && d,
                MatchMode::Any => w || d,
            },
        }
    }

    /// Returns true if the policy admits every authenticated email.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.whitelist.is_empty() && self.domains.is_empty()
    }

    /// Returns the combination mode.
    #[must_use]
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    fn in_whitelist(&self, email: &Email) -> bool {
        self.whitelist.iter().any(|entry| entry == email.as_str())
    }

    fn in_domains(&self, email: &Email) -> bool {
        let domain = email.domain().to_ascii_lowercase();
        let domain = domain.trim_end_matches('.');
        self.domains.iter().any(|allowed| {
            domain == allowed
                || domain
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

/// Lowercases and strips a leading `@` or `.` and a trailing `.`.
fn normalize_domain(entry: &str) -> String {
    entry
        .trim()
        .trim_start_matches('@')
        .trim_start_matches('.')
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).expect("valid email")
    }

    fn lists(whitelist: &[&str], domains: &[&str]) -> AccessLists {
        AccessLists::new(
            whitelist.iter().map(ToString::to_string).collect(),
            domains.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn default_mode_is_all() {
        assert_eq!(MatchMode::default(), MatchMode::All);
        assert_eq!(MatchMode::from_whitelist_or_domain(false), MatchMode::All);
        assert_eq!(MatchMode::from_whitelist_or_domain(true), MatchMode::Any);
    }

    #[test]
    fn empty_policy_permits_anyone() {
        let policy = AccessPolicy::new(&AccessLists::default(), MatchMode::All);
        assert!(policy.is_open());
        assert!(policy.permit(&email("anyone@anywhere.test")));
    }

    #[test]
    fn whitelist_is_exact_and_case_sensitive() {
        let policy = AccessPolicy::new(&lists(&["a@x.com"], &[]), MatchMode::All);
        assert!(policy.permit(&email("a@x.com")));
        assert!(!policy.permit(&email("A@x.com")));
        assert!(!policy.permit(&email("aa@x.com")));
        assert!(!policy.permit(&email("b@x.com")));
    }

    #[test]
    fn domains_are_case_insensitive_and_include_subdomains() {
        let policy = AccessPolicy::new(&lists(&[], &["Example.com"]), MatchMode::All);
        assert!(policy.permit(&email("u@example.com")));
        assert!(policy.permit(&email("u@EXAMPLE.COM")));
        assert!(policy.permit(&email("u@mail.example.com")));
        assert!(!policy.permit(&email("u@notexample.com")));
        assert!(!policy.permit(&email("u@example.com.evil.io")));
    }

    #[test]
    fn domain_entries_are_normalized() {
        let policy = AccessPolicy::new(&lists(&[], &["@y.com", " .z.com "]), MatchMode::All);
        assert!(policy.permit(&email("b@y.com")));
        assert!(policy.permit(&email("c@z.com")));
    }

    #[test]
    fn all_mode_requires_every_configured_list() {
        let policy = AccessPolicy::new(&lists(&["a@x.com", "b@y.com"], &["y.com"]), MatchMode::All);
        assert!(policy.permit(&email("b@y.com")));
        assert!(!policy.permit(&email("a@x.com")));
        assert!(!policy.permit(&email("c@y.com")));
        assert!(!policy.permit(&email("c@z.com")));
    }

    #[test]
    fn any_mode_accepts_either_list() {
        let policy = AccessPolicy::new(&lists(&["a@x.com"], &["y.com"]), MatchMode::Any);
        assert!(policy.permit(&email("a@x.com")));
        assert!(policy.permit(&email("b@y.com")));
        assert!(!policy.permit(&email("c@z.com")));
    }

    #[test]
    fn single_list_behaves_the_same_in_both_modes() {
        for mode in [MatchMode::All, MatchMode::Any] {
            let whitelist_only = AccessPolicy::new(&lists(&["a@x.com"], &[]), mode);
            assert!(whitelist_only.permit(&email("a@x.com")));
            assert!(!whitelist_only.permit(&email("c@z.com")));

            let domains_only = AccessPolicy::new(&lists(&[], &["y.com"]), mode);
            assert!(domains_only.permit(&email("b@y.com")));
            assert!(!domains_only.permit(&email("c@z.com")));
        }
    }

    #[test]
    fn rule_lists_replace_global_lists() {
        let global = lists(&["admin@x.com"], &["corp.com"]);
        let rule = lists(&[], &["family.net"]);
        let policy = AccessPolicy::resolve(&rule, &global, MatchMode::All);

        assert!(policy.permit(&email("kid@family.net")));
        assert!(!policy.permit(&email("admin@x.com")));
        assert!(!policy.permit(&email("dev@corp.com")));
    }

    #[test]
    fn empty_rule_falls_back_to_global() {
        let global = lists(&["admin@x.com"], &[]);
        let policy = AccessPolicy::resolve(&AccessLists::default(), &global, MatchMode::All);
        assert!(policy.permit(&email("admin@x.com")));
        assert!(!policy.permit(&email("other@x.com")));
    }

    #[test]
    fn blank_entries_are_ignored() {
        let policy = AccessPolicy::new(&lists(&["", "  "], &[""]), MatchMode::All);
        assert!(policy.is_open());
    }

    #[test]
    fn access_lists_deserialize_with_defaults() {
        let parsed: AccessLists =
            serde_json::from_str(r#"{"domains": ["y.com"]}"#).expect("deserialize");
        assert!(parsed.whitelist.is_empty());
        assert_eq!(parsed.domains, vec!["y.com"]);
    }
}
