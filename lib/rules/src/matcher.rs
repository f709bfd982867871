//! Matcher expressions.
//!
//! Rules use the Traefik rule syntax:
//!
//! ```text
//! Host(`media.example.com`) && (PathPrefix(`/api`) || Method(`POST`))
//! HostRegexp(`{sub:[a-z]+}.example.com`) && !Path(`/health`)
//! ```
//!
//! Supported matchers: `Host`, `HostHeader`, `HostRegexp`, `Path`,
//! `PathPrefix`, `PathRegexp`, `Method`, `Query`. Each takes one or more
//! string arguments (backticks or double quotes) and matches if any argument
//! matches. Host and path arguments are templates: `{name}` matches one
//! label/segment, `{name:regex}` matches the given regex. Hosts compare
//! case-insensitively and ignore the request port unless the template
//! names one.
//!
//! Expressions are compiled once, when the route table is built.

use regex::Regex;

use crate::error::RuleError;

/// The request attributes a matcher can look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRequest<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Host, possibly with a port.
    pub host: &'a str,
    /// Path, without the query string.
    pub path: &'a str,
    /// Raw query string, without the leading `?`.
    pub query: &'a str,
}

impl<'a> RouteRequest<'a> {
    /// Builds a request from an origin-form URI such as `/a/b?c=d`.
    #[must_use]
    pub fn from_uri(method: &'a str, host: &'a str, uri: &'a str) -> Self {
        let uri = uri.split_once('#').map_or(uri, |(before, _)| before);
        let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
        Self {
            method,
            host,
            path,
            query,
        }
    }
}

/// A compiled matcher expression.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Any of the host templates matches.
    Host(Vec<HostPattern>),
    /// Any of the path templates matches the whole path.
    Path(Vec<Regex>),
    /// Any of the path templates matches a prefix of the path.
    PathPrefix(Vec<Regex>),
    /// Any of the regexes matches somewhere in the path.
    PathRegexp(Vec<Regex>),
    /// The method is one of these (case-insensitive).
    Method(Vec<String>),
    /// Any of the query conditions holds.
    Query(Vec<QueryPattern>),
    /// Both sides match.
    And(Box<Matcher>, Box<Matcher>),
    /// Either side matches.
    Or(Box<Matcher>, Box<Matcher>),
    /// The inner matcher does not match.
    Not(Box<Matcher>),
}

/// A compiled host template.
#[derive(Debug, Clone)]
pub struct HostPattern {
    regex: Regex,
    with_port: bool,
}

impl HostPattern {
    fn matches(&self, host: &str) -> bool {
        if self.with_port {
            self.regex.is_match(host)
        } else {
            self.regex.is_match(strip_port(host))
        }
    }
}

/// A `Query` condition: a key, optionally with a required value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPattern {
    key: String,
    value: Option<String>,
}

impl QueryPattern {
    fn matches(&self, query: &str) -> bool {
        url::form_urlencoded::parse(query.as_bytes()).any(|(key, value)| {
            key == self.key.as_str() && self.value.as_deref().is_none_or(|v| value == v)
        })
    }
}

impl Matcher {
    /// Parses and compiles a matcher expression.
    ///
    /// # Errors
    ///
    /// Returns an error for syntax errors, unknown matchers, matchers
    /// without arguments and templates that do not compile.
    pub fn parse(expression: &str) -> Result<Self, RuleError> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(RuleError::syntax(expression, 0, "empty expression"));
        }
        let mut parser = Parser {
            expression,
            tokens,
            pos: 0,
        };
        let matcher = parser.parse_or()?;
        if parser.pos < parser.tokens.len() {
            return Err(RuleError::syntax(
                expression,
                parser.offset(),
                "unexpected trailing input",
            ));
        }
        Ok(matcher)
    }

    /// Returns true if the request satisfies the expression.
    #[must_use]
    pub fn matches(&self, request: &RouteRequest<'_>) -> bool {
        match self {
            Self::Host(patterns) => patterns.iter().any(|p| p.matches(request.host)),
            Self::Path(patterns) | Self::PathPrefix(patterns) | Self::PathRegexp(patterns) => {
                patterns.iter().any(|p| p.is_match(request.path))
            }
            Self::Method(methods) => methods.iter().any(|m| m.eq_ignore_ascii_case(request.method)),
            Self::Query(patterns) => patterns.iter().any(|p| p.matches(request.query)),
            Self::And(left, right) => left.matches(request) && right.matches(request),
            Self::Or(left, right) => left.matches(request) || right.matches(request),
            Self::Not(inner) => !inner.matches(request),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    And,
    Or,
    Not,
}

fn tokenize(expression: &str) -> Result<Vec<(usize, Token)>, RuleError> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | ',' | '!' => {
                chars.next();
                let token = match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    _ => Token::Not,
                };
                tokens.push((pos, token));
            }
            '&' | '|' => {
                chars.next();
                match chars.next() {
                    Some((_, next)) if next == c => {
                        let token = if c == '&' { Token::And } else { Token::Or };
                        tokens.push((pos, token));
                    }
                    _ => {
                        return Err(RuleError::syntax(
                            expression,
                            pos,
                            format!("expected '{c}{c}'"),
                        ));
                    }
                }
            }
            '`' | '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                for (_, ch) in chars.by_ref() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    value.push(ch);
                }
                if !closed {
                    return Err(RuleError::syntax(expression, pos, "unterminated string"));
                }
                tokens.push((pos, Token::Str(value)));
            }
            c if c.is_ascii_alphabetic() => {
                let mut ident = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((pos, Token::Ident(ident)));
            }
            other => {
                return Err(RuleError::syntax(
                    expression,
                    pos,
                    format!("unexpected character '{other}'"),
                ));
            }
        }
    }

    Ok(tokens)
}

/// Recursive descent over the token list. `&&` binds tighter than `||`.
struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser<'_> {
    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.expression.len(), |(offset, _)| *offset)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, token)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, reason: impl Into<String>) -> RuleError {
        RuleError::syntax(self.expression, self.offset(), reason)
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), RuleError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn parse_or(&mut self) -> Result<Matcher, RuleError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Matcher::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Matcher, RuleError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Matcher::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Matcher, RuleError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Not) => Ok(Matcher::Not(Box::new(self.parse_unary()?))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                self.expect(&Token::LParen, "'(' after matcher name")?;
                let args = self.parse_args()?;
                build_matcher(&name, &args)
            }
            Some(_) => Err(RuleError::syntax(
                self.expression,
                offset,
                "expected matcher, '!' or '('",
            )),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<String>, RuleError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            match self.next() {
                Some(Token::Str(value)) => args.push(value),
                _ => return Err(self.error("expected quoted argument")),
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
    }
}

fn build_matcher(name: &str, args: &[String]) -> Result<Matcher, RuleError> {
    let known = matches!(
        name,
        "Host" | "HostHeader" | "HostRegexp" | "Path" | "PathPrefix" | "PathRegexp" | "Method"
            | "Query"
    );
    if !known {
        return Err(RuleError::UnknownMatcher {
            name: name.to_string(),
        });
    }
    if args.is_empty() {
        return Err(RuleError::MissingArguments {
            matcher: name.to_string(),
        });
    }

    let matcher = match name {
        "Host" | "HostHeader" | "HostRegexp" => Matcher::Host(
            args.iter()
                .map(|host| {
                    Ok(HostPattern {
                        regex: compile_template(host, "[^.]+", Anchor::Full, true)?,
                        with_port: literal_contains(host, ':'),
                    })
                })
                .collect::<Result<_, RuleError>>()?,
        ),
        "Path" => Matcher::Path(
            args.iter()
                .map(|path| compile_template(path, "[^/]+", Anchor::Full, false))
                .collect::<Result<_, _>>()?,
        ),
        "PathPrefix" => Matcher::PathPrefix(
            args.iter()
                .map(|path| compile_template(path, "[^/]+", Anchor::Prefix, false))
                .collect::<Result<_, _>>()?,
        ),
        "PathRegexp" => Matcher::PathRegexp(
            args.iter()
                .map(|pattern| compile_regex(pattern))
                .collect::<Result<_, _>>()?,
        ),
        "Method" => Matcher::Method(args.iter().map(|m| m.to_ascii_uppercase()).collect()),
        _ => Matcher::Query(
            args.iter()
                .map(|arg| match arg.split_once('=') {
                    Some((key, value)) => QueryPattern {
                        key: key.to_string(),
                        value: Some(value.to_string()),
                    },
                    None => QueryPattern {
                        key: arg.clone(),
                        value: None,
                    },
                })
                .collect(),
        ),
    };
    Ok(matcher)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Full,
    Prefix,
}

/// Compiles a mux-style template (`/users/{id:[0-9]+}`) into a regex.
fn compile_template(
    template: &str,
    default_pattern: &str,
    anchor: Anchor,
    case_insensitive: bool,
) -> Result<Regex, RuleError> {
    let invalid = |reason: &str| RuleError::InvalidPattern {
        pattern: template.to_string(),
        reason: reason.to_string(),
    };

    let mut pattern = String::from(if case_insensitive { "(?i)^" } else { "^" });
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        pattern.push_str(&regex::escape(&rest[..start]));
        let after = &rest[start + 1..];

        let mut depth = 1;
        let mut end = None;
        for (i, c) in after.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let end = end.ok_or_else(|| invalid("unbalanced braces"))?;

        let variable = &after[..end];
        let (name, variable_pattern) = variable
            .split_once(':')
            .unwrap_or((variable, default_pattern));
        if name.is_empty() {
            return Err(invalid("missing variable name"));
        }
        pattern.push_str("(?:");
        pattern.push_str(variable_pattern);
        pattern.push(')');
        rest = &after[end + 1..];
    }
    if rest.contains('}') {
        return Err(invalid("unbalanced braces"));
    }
    pattern.push_str(&regex::escape(rest));
    if anchor == Anchor::Full {
        pattern.push('$');
    }

    Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))
}

fn compile_regex(pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|e| RuleError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// True if `needle` appears in the template outside `{...}` variables.
fn literal_contains(template: &str, needle: char) -> bool {
    let mut depth = 0usize;
    template.chars().any(|c| {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => return depth == 0 && c == needle,
        }
        false
    })
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(host: &'static str, uri: &'static str) -> RouteRequest<'static> {
        RouteRequest::from_uri("GET", host, uri)
    }

    fn matches(expression: &str, request: RouteRequest<'_>) -> bool {
        Matcher::parse(expression)
            .expect("expression compiles")
            .matches(&request)
    }

    #[test]
    fn splits_uri() {
        let request = get("a.com", "/x/y?k=v&z=1");
        assert_eq!(request.path, "/x/y");
        assert_eq!(request.query, "k=v&z=1");

        let request = get("a.com", "/plain");
        assert_eq!(request.path, "/plain");
        assert_eq!(request.query, "");
    }

    #[test]
    fn host_equality_ignores_case_and_port() {
        assert!(matches("Host(`foo.com`)", get("foo.com", "/")));
        assert!(matches("Host(`foo.com`)", get("FOO.com:8080", "/")));
        assert!(!matches("Host(`foo.com`)", get("bar.foo.com", "/")));
        assert!(!matches("Host(`foo.com`)", get("foo.com.evil", "/")));
    }

    #[test]
    fn host_with_port_requires_port() {
        assert!(matches("Host(`foo.com:8080`)", get("foo.com:8080", "/")));
        assert!(!matches("Host(`foo.com:8080`)", get("foo.com", "/")));
    }

    #[test]
    fn host_templates() {
        let expr = "HostRegexp(`{sub:[a-z]+}.example.com`)";
        assert!(matches(expr, get("media.example.com", "/")));
        assert!(!matches(expr, get("m3dia.example.com", "/")));
        assert!(!matches(expr, get("example.com", "/")));

        assert!(matches("Host(`{sub}.example.com`)", get("a.example.com", "/")));
        assert!(!matches("Host(`{sub}.example.com`)", get("a.b.example.com", "/")));
    }

    #[test]
    fn host_literal_dots_are_escaped() {
        assert!(!matches("Host(`foo.com`)", get("fooxcom", "/")));
    }

    #[test]
    fn multiple_arguments_are_alternatives() {
        let expr = "Host(`a.com`, `b.com`)";
        assert!(matches(expr, get("a.com", "/")));
        assert!(matches(expr, get("b.com", "/")));
        assert!(!matches(expr, get("c.com", "/")));
    }

    #[test]
    fn path_exact_and_prefix() {
        assert!(matches("Path(`/admin`)", get("a.com", "/admin")));
        assert!(matches("Path(`/admin`)", get("a.com", "/admin?x=1")));
        assert!(!matches("Path(`/admin`)", get("a.com", "/admin/users")));

        assert!(matches("PathPrefix(`/api`)", get("a.com", "/api/v1")));
        assert!(matches("PathPrefix(`/api`)", get("a.com", "/api")));
        assert!(!matches("PathPrefix(`/api`)", get("a.com", "/v1/api")));
    }

    #[test]
    fn path_templates_and_regexp() {
        let expr = "Path(`/users/{id:[0-9]+}`)";
        assert!(matches(expr, get("a.com", "/users/42")));
        assert!(!matches(expr, get("a.com", "/users/bob")));

        assert!(matches("PathRegexp(`\\.(jpg|png)$`)", get("a.com", "/img/cat.png")));
        assert!(!matches("PathRegexp(`\\.(jpg|png)$`)", get("a.com", "/img/cat.gif")));
    }

    #[test]
    fn method_and_query() {
        assert!(matches("Method(`post`, `PUT`)", RouteRequest::from_uri("POST", "a", "/")));
        assert!(!matches("Method(`POST`)", get("a", "/")));

        assert!(matches("Query(`token=abc`)", get("a", "/x?token=abc")));
        assert!(!matches("Query(`token=abc`)", get("a", "/x?token=abd")));
        assert!(matches("Query(`debug`)", get("a", "/x?debug=1")));
        assert!(!matches("Query(`debug`)", get("a", "/x")));
    }

    #[test]
    fn boolean_composition() {
        let expr = "Host(`two.com`) && Path(`/two`)";
        assert!(matches(expr, get("two.com", "/two")));
        assert!(!matches(expr, get("two.com", "/one")));

        let expr = "PathPrefix(`/public`) || Host(`open.com`)";
        assert!(matches(expr, get("closed.com", "/public/x")));
        assert!(matches(expr, get("open.com", "/private")));
        assert!(!matches(expr, get("closed.com", "/private")));

        let expr = "Host(`a.com`) && !PathPrefix(`/private`)";
        assert!(matches(expr, get("a.com", "/x")));
        assert!(!matches(expr, get("a.com", "/private/x")));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // A || (B && C)
        let expr = "Host(`a.com`) || Host(`b.com`) && Path(`/only`)";
        assert!(matches(expr, get("a.com", "/anything")));
        assert!(!matches(expr, get("b.com", "/anything")));
        assert!(matches(expr, get("b.com", "/only")));

        let grouped = "(Host(`a.com`) || Host(`b.com`)) && Path(`/only`)";
        assert!(!matches(grouped, get("a.com", "/anything")));
    }

    #[test]
    fn double_quoted_arguments() {
        assert!(matches("Host(\"a.com\")", get("a.com", "/")));
    }

    #[test]
    fn syntax_errors() {
        for expr in [
            "",
            "   ",
            "Host(`a.com`",
            "Host(`a.com`) &&",
            "Host(`a.com`) & Path(`/`)",
            "Host(a.com)",
            "Host(`a.com`) Path(`/`)",
            "Host(`unterminated)",
            "(Host(`a.com`)",
            "Host(`a.com`) $",
        ] {
            assert!(
                matches!(Matcher::parse(expr), Err(RuleError::Syntax { .. })),
                "{expr:?} should be a syntax error"
            );
        }
    }

    #[test]
    fn unknown_matcher() {
        assert_eq!(
            Matcher::parse("Header(`x`)").unwrap_err(),
            RuleError::UnknownMatcher {
                name: "Header".to_string()
            }
        );
    }

    #[test]
    fn missing_arguments() {
        assert_eq!(
            Matcher::parse("Host()").unwrap_err(),
            RuleError::MissingArguments {
                matcher: "Host".to_string()
            }
        );
    }

    #[test]
    fn invalid_patterns() {
        for expr in [
            "Path(`/users/{id:[0-9+}`)",
            "Path(`/users/{id`)",
            "Path(`/users/}`)",
            "Host(`{:x}.com`)",
            "PathRegexp(`(`)",
        ] {
            assert!(
                matches!(Matcher::parse(expr), Err(RuleError::InvalidPattern { .. })),
                "{expr:?} should be an invalid pattern"
            );
        }
    }

    #[test]
    fn literal_contains_skips_variables() {
        assert!(literal_contains("a.com:80", ':'));
        assert!(!literal_contains("{host:[a-z]+}.com", ':'));
    }
}
