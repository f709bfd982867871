//! Rule definitions and compiled rules.

use plex_forward_auth_access::{AccessLists, AccessPolicy, MatchMode};
use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::matcher::Matcher;

/// What happens to a request that matches a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Require a valid session that passes the access policy.
    #[default]
    Auth,
    /// Let the request through without authentication.
    Allow,
}

impl RuleAction {
    /// Returns the lowercase action name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Allow => "allow",
        }
    }
}

impl std::fmt::Display for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule as it appears in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Unique rule name.
    pub name: String,
    /// Action for matching requests.
    #[serde(default)]
    pub action: RuleAction,
    /// Matcher expression.
    pub rule: String,
    /// Explicit priority; defaults to the expression length.
    #[serde(default)]
    pub priority: Option<i64>,
    /// Exact email addresses admitted by this rule.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Email domains admitted by this rule.
    #[serde(default)]
    pub domains: Vec<String>,
}

/// A validated rule with its compiled matcher.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    action: RuleAction,
    expression: String,
    matcher: Matcher,
    priority: i64,
    access: AccessLists,
}

impl Rule {
    /// Compiles a configured rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or expression is empty or the
    /// expression does not compile.
    pub fn compile(definition: RuleDefinition) -> Result<Self, RuleError> {
        let name = definition.name.trim().to_string();
        if name.is_empty() {
            return Err(RuleError::EmptyName);
        }

        let expression = definition.rule.trim().to_string();
        if expression.is_empty() {
            return Err(RuleError::EmptyExpression { rule: name });
        }
        let matcher = Matcher::parse(&expression)?;

        // Longer expressions are treated as more specific.
        let priority = definition
            .priority
            .unwrap_or_else(|| i64::try_from(expression.chars().count()).unwrap_or(i64::MAX));

        Ok(Self {
            name,
            action: definition.action,
            expression,
            matcher,
            priority,
            access: AccessLists::new(definition.whitelist, definition.domains),
        })
    }

    /// Compiles every definition, rejecting duplicate names.
    ///
    /// # Errors
    ///
    /// Returns the first compile error, or [`RuleError::DuplicateName`].
    pub fn compile_all(
        definitions: impl IntoIterator<Item = RuleDefinition>,
    ) -> Result<Vec<Self>, RuleError> {
        let mut rules: Vec<Self> = Vec::new();
        for definition in definitions {
            let rule = Self::compile(definition)?;
            if rules.iter().any(|existing| existing.name == rule.name) {
                return Err(RuleError::DuplicateName { name: rule.name });
            }
            rules.push(rule);
        }
        Ok(rules)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn action(&self) -> RuleAction {
        self.action
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    #[must_use]
    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Returns the rule's own whitelist and domains.
    #[must_use]
    pub fn access(&self) -> &AccessLists {
        &self.access
    }

    /// Resolves the access policy for this rule against the global lists.
    #[must_use]
    pub fn policy(&self, global: &AccessLists, mode: MatchMode) -> AccessPolicy {
        AccessPolicy::resolve(&self.access, global, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::RouteRequest;
    use plex_forward_auth_core::Email;

    fn definition(name: &str, rule: &str) -> RuleDefinition {
        RuleDefinition {
            name: name.to_string(),
            rule: rule.to_string(),
            ..RuleDefinition::default()
        }
    }

    #[test]
    fn action_defaults_to_auth() {
        assert_eq!(RuleAction::default(), RuleAction::Auth);
        assert_eq!(RuleAction::Allow.to_string(), "allow");
    }

    #[test]
    fn deserializes_from_config_shape() {
        let parsed: RuleDefinition = serde_json::from_str(
            r#"{"name": "public", "action": "allow", "rule": "PathPrefix(`/public`)"}"#,
        )
        .expect("deserialize");
        assert_eq!(parsed.action, RuleAction::Allow);
        assert_eq!(parsed.priority, None);
        assert!(parsed.whitelist.is_empty());
    }

    #[test]
    fn unknown_action_is_rejected() {
        let parsed = serde_json::from_str::<RuleDefinition>(
            r#"{"name": "x", "action": "deny", "rule": "Path(`/`)"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn default_priority_is_expression_length() {
        let rule = Rule::compile(definition("a", "Host(`foo.com`)")).expect("compile");
        assert_eq!(rule.priority(), 15);

        let explicit = Rule::compile(RuleDefinition {
            priority: Some(-3),
            ..definition("b", "Host(`foo.com`)")
        })
        .expect("compile");
        assert_eq!(explicit.priority(), -3);
    }

    #[test]
    fn compiled_rule_matches() {
        let rule = Rule::compile(definition("two", "Host(`two.com`) && Path(`/two`)"))
            .expect("compile");
        assert!(rule.matcher().matches(&RouteRequest::from_uri("GET", "two.com", "/two")));
        assert_eq!(rule.expression(), "Host(`two.com`) && Path(`/two`)");
    }

    #[test]
    fn empty_name_and_expression_are_rejected() {
        assert_eq!(
            Rule::compile(definition("  ", "Path(`/`)")).unwrap_err(),
            RuleError::EmptyName
        );
        assert_eq!(
            Rule::compile(definition("x", " ")).unwrap_err(),
            RuleError::EmptyExpression {
                rule: "x".to_string()
            }
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Rule::compile_all([
            definition("dup", "Path(`/a`)"),
            definition("dup", "Path(`/b`)"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            RuleError::DuplicateName {
                name: "dup".to_string()
            }
        );
    }

    #[test]
    fn rule_policy_overrides_global() {
        let rule = Rule::compile(RuleDefinition {
            domains: vec!["family.net".to_string()],
            ..definition("family", "Host(`photos.example.com`)")
        })
        .expect("compile");
        let global = AccessLists::new(vec!["admin@x.com".to_string()], vec![]);
        let policy = rule.policy(&global, MatchMode::All);

        assert!(policy.permit(&Email::parse("kid@family.net").expect("email")));
        assert!(!policy.permit(&Email::parse("admin@x.com").expect("email")));
    }
}
