//! Gateway configuration.
//!
//! Loaded once at startup with the `config` crate, from an optional file
//! (path in the `CONFIG` environment variable) overlaid by environment
//! variables. Nested keys use `__` as separator; `whitelist`, `domains` and
//! `cookie_domains` accept comma separated lists. Everything is validated
//! here so the rest of the server only sees a consistent snapshot.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use plex_forward_auth_access::{AccessLists, MatchMode};
use plex_forward_auth_core::Result;
use plex_forward_auth_rules::{Rule, RuleAction, RuleDefinition};
use serde::Deserialize;
use ulid::Ulid;
use url::Url;

use crate::error::ConfigError;

/// Environment variable holding the optional config file path.
pub const CONFIG_PATH_ENV: &str = "CONFIG";

/// Longest accepted session lifetime: ten years.
pub const MAX_LIFETIME_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

const LIST_KEYS: [&str; 5] = ["whitelist", "domains", "domain", "cookie_domains", "cookie_domain"];

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human readable output.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
    /// Multi-line human readable output.
    Pretty,
}

/// Configuration exactly as deserialized, before validation.
#[derive(Deserialize)]
#[serde(default)]
struct RawConfig {
    log_level: String,
    log_format: LogFormat,
    port: u16,
    auth_host: Option<String>,
    #[serde(alias = "cookie_domain")]
    cookie_domains: Vec<String>,
    insecure_cookie: bool,
    cookie_name: String,
    csrf_cookie_name: String,
    default_action: RuleAction,
    #[serde(alias = "domain")]
    domains: Vec<String>,
    whitelist: Vec<String>,
    lifetime: u64,
    logout_redirect: Option<String>,
    match_whitelist_or_domain: bool,
    url_path: String,
    secret: Option<String>,
    product: String,
    client_identifier: Option<String>,
    server_identifier: Option<String>,
    provider_timeout_seconds: u64,
    rules: Vec<RuleDefinition>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_format: LogFormat::Text,
            port: 4181,
            auth_host: None,
            cookie_domains: Vec::new(),
            insecure_cookie: false,
            cookie_name: "_forward_auth".to_string(),
            csrf_cookie_name: "_forward_auth_csrf".to_string(),
            default_action: RuleAction::Auth,
            domains: Vec::new(),
            whitelist: Vec::new(),
            lifetime: 43_200,
            logout_redirect: None,
            match_whitelist_or_domain: false,
            url_path: "/_oauth".to_string(),
            secret: None,
            product: "plex-forward-auth".to_string(),
            client_identifier: None,
            server_identifier: None,
            provider_timeout_seconds: 10,
            rules: Vec::new(),
        }
    }
}

/// Validated, immutable gateway configuration.
#[derive(Clone)]
pub struct GatewayConfig {
    log_level: String,
    log_format: LogFormat,
    port: u16,
    auth_host: Option<String>,
    cookie_domains: Vec<String>,
    insecure_cookie: bool,
    cookie_name: String,
    csrf_cookie_name: String,
    default_action: RuleAction,
    access: AccessLists,
    match_mode: MatchMode,
    lifetime: chrono::Duration,
    logout_redirect: Option<Url>,
    url_path: String,
    logout_path: String,
    secret: Vec<u8>,
    product: String,
    client_identifier: String,
    server_identifier: Option<String>,
    provider_timeout: Duration,
    rules: Vec<Rule>,
}

impl GatewayConfig {
    /// Loads configuration from `$CONFIG` (if set) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var_os(CONFIG_PATH_ENV).filter(|path| !path.is_empty());
        Self::from_sources(file.as_deref().map(Path::new), None)
    }

    /// Loads configuration from an optional file and an environment.
    ///
    /// `env` replaces the process environment when given.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or validation fails.
    pub fn from_sources(
        file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut environment = config::Environment::default()
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .source(env);
        for key in LIST_KEYS {
            environment = environment.with_list_parse_key(key);
        }

        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let raw: RawConfig = builder
            .add_source(environment)
            .build()
            .and_then(|config| config.try_deserialize::<RawConfig>())
            .map_err(|e| ConfigError::Load {
                reason: e.to_string(),
            })?;

        Ok(Self::validate(raw)?)
    }

    fn validate(raw: RawConfig) -> std::result::Result<Self, ConfigError> {
        let secret = raw
            .secret
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::MissingSecret)?
            .into_bytes();

        let lifetime = Some(raw.lifetime)
            .filter(|seconds| (1..=MAX_LIFETIME_SECONDS).contains(seconds))
            .and_then(|seconds| i64::try_from(seconds).ok())
            .and_then(chrono::Duration::try_seconds)
            .ok_or(ConfigError::InvalidLifetime {
                seconds: raw.lifetime,
            })?;

        if raw.provider_timeout_seconds == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let auth_host = match non_empty(raw.auth_host) {
            Some(host) if is_bare_host(&host) => Some(host.to_ascii_lowercase()),
            Some(host) => return Err(ConfigError::InvalidAuthHost { value: host }),
            None => None,
        };

        let mut cookie_domains = Vec::new();
        for entry in raw.cookie_domains {
            let domain = entry
                .trim()
                .trim_start_matches('.')
                .trim_end_matches('.')
                .to_ascii_lowercase();
            if domain.is_empty() {
                continue;
            }
            if !is_bare_host(&domain) || domain.contains(':') {
                return Err(ConfigError::InvalidCookieDomain { value: entry });
            }
            cookie_domains.push(domain);
        }

        let logout_redirect = match non_empty(raw.logout_redirect) {
            Some(value) => Some(parse_logout_redirect(&value)?),
            None => None,
        };

        for name in [&raw.cookie_name, &raw.csrf_cookie_name] {
            if !is_cookie_name(name) {
                return Err(ConfigError::InvalidCookieName {
                    value: name.clone(),
                });
            }
        }

        let url_path = match raw.url_path.trim() {
            "" => "/_oauth".to_string(),
            path if path.starts_with('/') => path.to_string(),
            path => format!("/{path}"),
        };
        let logout_path = format!("{}/logout", url_path.trim_end_matches('/'));

        let rules = Rule::compile_all(raw.rules)?;

        let product = match raw.product.trim() {
            "" => RawConfig::default().product,
            product => product.to_string(),
        };

        Ok(Self {
            log_level: normalize_log_level(&raw.log_level)?,
            log_format: raw.log_format,
            port: raw.port,
            auth_host,
            cookie_domains,
            insecure_cookie: raw.insecure_cookie,
            cookie_name: raw.cookie_name,
            csrf_cookie_name: raw.csrf_cookie_name,
            default_action: raw.default_action,
            access: AccessLists::new(raw.whitelist, raw.domains),
            match_mode: MatchMode::from_whitelist_or_domain(raw.match_whitelist_or_domain),
            lifetime,
            logout_redirect,
            url_path,
            logout_path,
            secret,
            product,
            client_identifier: non_empty(raw.client_identifier)
                .unwrap_or_else(|| Ulid::new().to_string()),
            server_identifier: non_empty(raw.server_identifier),
            provider_timeout: Duration::from_secs(raw.provider_timeout_seconds),
            rules,
        })
    }

    /// Returns the log filter directive (`trace` through `error`).
    #[must_use]
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the single host provider callbacks return to, if configured.
    #[must_use]
    pub fn auth_host(&self) -> Option<&str> {
        self.auth_host.as_deref()
    }

    /// Returns the configured cookie domains, normalized to lowercase.
    #[must_use]
    pub fn cookie_domains(&self) -> &[String] {
        &self.cookie_domains
    }

    /// Returns true if cookies may be sent over plain http.
    #[must_use]
    pub fn insecure_cookie(&self) -> bool {
        self.insecure_cookie
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn csrf_cookie_name(&self) -> &str {
        &self.csrf_cookie_name
    }

    /// Returns the action for requests no rule matches.
    #[must_use]
    pub fn default_action(&self) -> RuleAction {
        self.default_action
    }

    /// Returns the global whitelist and domains.
    #[must_use]
    pub fn access(&self) -> &AccessLists {
        &self.access
    }

    #[must_use]
    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    /// Returns the session lifetime.
    #[must_use]
    pub fn lifetime(&self) -> chrono::Duration {
        self.lifetime
    }

    #[must_use]
    pub fn logout_redirect(&self) -> Option<&Url> {
        self.logout_redirect.as_ref()
    }

    /// Returns the provider callback path.
    #[must_use]
    pub fn url_path(&self) -> &str {
        &self.url_path
    }

    #[must_use]
    pub fn logout_path(&self) -> &str {
        &self.logout_path
    }

    #[must_use]
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Returns the `X-Plex-Product` value.
    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Returns the `X-Plex-Client-Identifier` value.
    #[must_use]
    pub fn client_identifier(&self) -> &str {
        &self.client_identifier
    }

    /// Returns the Plex server users must have access to, if any.
    #[must_use]
    pub fn server_identifier(&self) -> Option<&str> {
        self.server_identifier.as_deref()
    }

    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout
    }

    /// Returns the compiled rules in configuration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("port", &self.port)
            .field("auth_host", &self.auth_host)
            .field("cookie_domains", &self.cookie_domains)
            .field("insecure_cookie", &self.insecure_cookie)
            .field("cookie_name", &self.cookie_name)
            .field("csrf_cookie_name", &self.csrf_cookie_name)
            .field("default_action", &self.default_action)
            .field("access", &self.access)
            .field("match_mode", &self.match_mode)
            .field("lifetime_seconds", &self.lifetime.num_seconds())
            .field("logout_redirect", &self.logout_redirect.as_ref().map(Url::as_str))
            .field("url_path", &self.url_path)
            .field("secret", &"<redacted>")
            .field("product", &self.product)
            .field("client_identifier", &"<redacted>")
            .field("server_identifier", &self.server_identifier)
            .field("provider_timeout", &self.provider_timeout)
            .field(
                "rules",
                &self.rules.iter().map(Rule::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_log_level(value: &str) -> std::result::Result<String, ConfigError> {
    let level = value.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(level),
        "fatal" | "panic" => Ok("error".to_string()),
        _ => Err(ConfigError::InvalidLogLevel {
            value: value.to_string(),
        }),
    }
}

fn parse_logout_redirect(value: &str) -> std::result::Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidLogoutRedirect {
        value: value.to_string(),
        reason,
    };
    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// A host name with an optional port, nothing else.
fn is_bare_host(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']' | '_'))
}

/// An RFC 6265 cookie-name token.
fn is_cookie_name(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')'
                        | b'<'
                        | b'>'
                        | b'@'
                        | b','
                        | b';'
                        | b':'
                        | b'\\'
                        | b'"'
                        | b'/'
                        | b'['
                        | b']'
                        | b'?'
                        | b'='
                        | b'{'
                        | b'}'
                )
        })
}
