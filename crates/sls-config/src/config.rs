// crates/sls-config/src/config.rs
// ============================================================================
// Module: SLS MCP Configuration
// Description: Configuration loading and validation for the SLS MCP server.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: sls-client, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The `[[systems]]` table maps business system names and aliases to an
//! endpoint host and project. Resolution happens per call and is never cached.
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use sls_client::ClientLimits;
use sls_client::Credentials;
use sls_client::EndpointTarget;
use sls_client::TransportConfig;
use sls_client::UrlScheme;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "sls-mcp.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SLS_MCP_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Minimum transport timeout in milliseconds.
pub(crate) const MIN_TIMEOUT_MS: u64 = 100;
/// Maximum transport timeout in milliseconds.
pub(crate) const MAX_TIMEOUT_MS: u64 = 60_000;
/// Maximum number of configured systems.
pub(crate) const MAX_SYSTEMS: usize = 256;
/// Maximum audit history capacity.
pub(crate) const MAX_HISTORY_CAPACITY: usize = 100_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// SLS MCP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SlsConfig {
    /// Access key pair used to sign requests.
    pub credentials: CredentialsConfig,
    /// Business systems and their endpoints.
    #[serde(default)]
    pub systems: Vec<SystemConfig>,
    /// Outbound HTTP settings.
    #[serde(default)]
    pub transport: TransportSection,
    /// Input bounds enforced before requests are sent.
    #[serde(default)]
    pub limits: ClientLimits,
    /// Defaults for omitted tool parameters.
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Server transport settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Service call audit settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl SlsConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credentials.validate()?;
        self.validate_systems()?;
        self.transport.validate()?;
        validate_limits(&self.limits)?;
        self.defaults.validate(&self.limits)?;
        self.server.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Finds a system by name or alias, case-insensitively.
    #[must_use]
    pub fn find_system(&self, name: &str) -> Option<&SystemConfig> {
        let key = name.trim().to_lowercase();
        self.systems.iter().find(|system| system.labels().any(|label| label == key))
    }

    /// Resolves a system name or alias to its endpoint target.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the name is blank or unknown.
    pub fn resolve_system(&self, name: &str) -> Result<EndpointTarget, ConfigError> {
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid("system name must be non-empty".to_string()));
        }
        let system = self
            .find_system(name)
            .ok_or_else(|| ConfigError::Invalid(format!("unsupported system: {}", name.trim())))?;
        EndpointTarget::new(&system.endpoint, &system.project)
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    /// Resolves the signing credentials, reading the secret env var if configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the secret is missing or empty.
    pub fn client_credentials(&self) -> Result<Credentials, ConfigError> {
        let secret = self.credentials.resolve_secret()?;
        Ok(Credentials::new(self.credentials.access_key_id.trim(), secret))
    }

    /// Returns the transport configuration for outbound requests.
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        self.transport.to_transport_config()
    }

    /// Returns secret-free summaries of the configured systems.
    #[must_use]
    pub fn system_list(&self) -> Vec<SystemSummary> {
        self.systems.iter().map(SystemConfig::summary).collect()
    }

    /// Validates the system table.
    fn validate_systems(&self) -> Result<(), ConfigError> {
        if self.systems.is_empty() {
            return Err(ConfigError::Invalid("at least one system must be configured".to_string()));
        }
        if self.systems.len() > MAX_SYSTEMS {
            return Err(ConfigError::Invalid("too many systems configured".to_string()));
        }
        let mut seen = BTreeSet::new();
        for system in &self.systems {
            system.validate()?;
            for label in system.labels() {
                if !seen.insert(label.clone()) {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate system name or alias: {label}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Access key configuration.
#[derive(Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Access key identifier.
    pub access_key_id: String,
    /// Inline access key secret.
    #[serde(default)]
    pub access_key_secret: Option<String>,
    /// Environment variable holding the access key secret.
    #[serde(default)]
    pub access_key_secret_env: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &self.access_key_secret.as_ref().map(|_| "<redacted>"))
            .field("access_key_secret_env", &self.access_key_secret_env)
            .finish()
    }
}

impl CredentialsConfig {
    /// Validates credential configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.access_key_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "credentials.access_key_id must be non-empty".to_string(),
            ));
        }
        match (&self.access_key_secret, &self.access_key_secret_env) {
            (Some(_), Some(_)) => Err(ConfigError::Invalid(
                "credentials must set only one of access_key_secret or access_key_secret_env"
                    .to_string(),
            )),
            (None, None) => Err(ConfigError::Invalid(
                "credentials require access_key_secret or access_key_secret_env".to_string(),
            )),
            (Some(secret), None) if secret.is_empty() => Err(ConfigError::Invalid(
                "credentials.access_key_secret must be non-empty".to_string(),
            )),
            (None, Some(name)) if name.trim().is_empty() => Err(ConfigError::Invalid(
                "credentials.access_key_secret_env must be non-empty".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Returns the secret from config or the environment.
    fn resolve_secret(&self) -> Result<String, ConfigError> {
        if let Some(secret) = &self.access_key_secret {
            return Ok(secret.clone());
        }
        let name = self.access_key_secret_env.as_deref().map(str::trim).unwrap_or_default();
        match env::var(name) {
            Ok(secret) if !secret.is_empty() => Ok(secret),
            _ => Err(ConfigError::Invalid(format!(
                "access key secret env var {name} is unset or empty"
            ))),
        }
    }
}

/// One business system and its endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    /// Canonical system name.
    pub name: String,
    /// Alternative names accepted by resolution.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Endpoint host without scheme.
    pub endpoint: String,
    /// Project (host namespace).
    pub project: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

impl SystemConfig {
    /// Returns the normalized name and aliases.
    fn labels(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(&self.name)
            .chain(&self.aliases)
            .map(|label| label.trim().to_lowercase())
    }

    /// Validates one system entry.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("systems.name must be non-empty".to_string()));
        }
        let field = |suffix: &str| format!("systems[{}].{suffix}", self.name.trim());
        if self.aliases.iter().any(|alias| alias.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("{} must be non-empty", field("aliases"))));
        }
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::Invalid(format!("{} must be non-empty", field("endpoint"))));
        }
        if endpoint.contains("://") || endpoint.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "{} must be a bare host without scheme or path",
                field("endpoint")
            )));
        }
        let project = self.project.trim();
        if project.is_empty() {
            return Err(ConfigError::Invalid(format!("{} must be non-empty", field("project"))));
        }
        if project.contains(['.', '/']) {
            return Err(ConfigError::Invalid(format!(
                "{} must be a single host label",
                field("project")
            )));
        }
        Ok(())
    }

    /// Returns a secret-free summary.
    fn summary(&self) -> SystemSummary {
        SystemSummary {
            name: self.name.clone(),
            aliases: self.aliases.clone(),
            endpoint: self.endpoint.clone(),
            project: self.project.clone(),
            description: self.description.clone(),
        }
    }
}

/// Serializable system listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemSummary {
    /// Canonical system name.
    pub name: String,
    /// Alternative names.
    pub aliases: Vec<String>,
    /// Endpoint host.
    pub endpoint: String,
    /// Project name.
    pub project: String,
    /// Description when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportSection {
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Maximum response size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Use plain HTTP instead of HTTPS (explicit opt-in).
    #[serde(default)]
    pub allow_http: bool,
    /// User agent override.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Host to socket address pins.
    #[serde(default)]
    pub host_overrides: BTreeMap<String, SocketAddr>,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            allow_http: false,
            user_agent: None,
            host_overrides: BTreeMap::new(),
        }
    }
}

impl TransportSection {
    /// Validates transport settings.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("transport.connect_timeout_ms", self.connect_timeout_ms),
            ("transport.read_timeout_ms", self.read_timeout_ms),
        ] {
            if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}"
                )));
            }
        }
        if self.max_response_bytes == 0 {
            return Err(ConfigError::Invalid(
                "transport.max_response_bytes must be greater than zero".to_string(),
            ));
        }
        if let Some(agent) = &self.user_agent
            && agent.trim().is_empty()
        {
            return Err(ConfigError::Invalid("transport.user_agent must be non-empty".to_string()));
        }
        if self.host_overrides.keys().any(|host| host.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "transport.host_overrides keys must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts to the client transport configuration.
    fn to_transport_config(&self) -> TransportConfig {
        let defaults = TransportConfig::default();
        TransportConfig {
            connect_timeout_ms: self.connect_timeout_ms,
            read_timeout_ms: self.read_timeout_ms,
            max_response_bytes: self.max_response_bytes,
            scheme: if self.allow_http { UrlScheme::Http } else { UrlScheme::Https },
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            host_overrides: self.host_overrides.clone(),
        }
    }
}

/// Defaults applied to omitted tool parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Default page size for log searches.
    pub line: u32,
    /// Default page offset.
    pub offset: u64,
    /// Default context lines before the anchor.
    pub back_lines: u32,
    /// Default context lines after the anchor.
    pub forward_lines: u32,
    /// Default listing page size.
    pub page_size: u32,
    /// Default search window in days.
    pub lookback_days: u32,
    /// Default raw-log window in seconds.
    pub raw_logs_window_secs: i64,
    /// UTC offset used to read calendar times.
    pub utc_offset_hours: i8,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            line: 100,
            offset: 0,
            back_lines: 70,
            forward_lines: 30,
            page_size: 10,
            lookback_days: 30,
            raw_logs_window_secs: 86_400,
            utc_offset_hours: 8,
        }
    }
}

impl DefaultsConfig {
    /// Validates defaults against the configured limits.
    fn validate(&self, limits: &ClientLimits) -> Result<(), ConfigError> {
        if self.line == 0 || self.line > limits.max_lines {
            return Err(ConfigError::Invalid(format!(
                "defaults.line must be between 1 and limits.max_lines ({})",
                limits.max_lines
            )));
        }
        if self.back_lines > limits.max_context_lines
            || self.forward_lines > limits.max_context_lines
        {
            return Err(ConfigError::Invalid(
                "defaults context lines exceed limits.max_context_lines".to_string(),
            ));
        }
        if self.page_size == 0 || self.page_size > limits.max_page_size {
            return Err(ConfigError::Invalid(
                "defaults.page_size must be between 1 and limits.max_page_size".to_string(),
            ));
        }
        if self.lookback_days == 0 {
            return Err(ConfigError::Invalid(
                "defaults.lookback_days must be greater than zero".to_string(),
            ));
        }
        if self.raw_logs_window_secs <= 0 {
            return Err(ConfigError::Invalid(
                "defaults.raw_logs_window_secs must be greater than zero".to_string(),
            ));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(ConfigError::Invalid(
                "defaults.utc_offset_hours must be between -12 and 14".to_string(),
            ));
        }
        Ok(())
    }
}

/// Server transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Transport type for the JSON-RPC server.
    #[serde(default)]
    pub transport: ServerTransport,
    /// Bind address for the HTTP transport.
    #[serde(default)]
    pub bind: Option<String>,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: ServerTransport::Stdio,
            bind: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Validates server transport configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.transport == ServerTransport::Http {
            let bind = self.bind.as_deref().map(str::trim).unwrap_or_default();
            if bind.is_empty() {
                return Err(ConfigError::Invalid(
                    "http transport requires bind address".to_string(),
                ));
            }
            bind.parse::<SocketAddr>()
                .map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))?;
        }
        Ok(())
    }

    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the bind address is missing or invalid.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| ConfigError::Invalid("bind address required".to_string()))?
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }
}

/// Supported JSON-RPC transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// Use stdin/stdout transport.
    #[default]
    Stdio,
    /// Use HTTP JSON-RPC transport.
    Http,
}

/// Service call audit settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Where audit events are written.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path for the file sink (JSON lines).
    #[serde(default)]
    pub path: Option<String>,
    /// Number of recent calls kept for `list_service_logs`.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sink: AuditSinkKind::Stderr,
            path: None,
            history_capacity: default_history_capacity(),
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        if self.sink == AuditSinkKind::File && self.path.is_none() {
            return Err(ConfigError::Invalid("audit.sink=file requires audit.path".to_string()));
        }
        if self.history_capacity > MAX_HISTORY_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "audit.history_capacity must be at most {MAX_HISTORY_CAPACITY}"
            )));
        }
        Ok(())
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Discard events; history is still kept.
    None,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates client limits.
fn validate_limits(limits: &ClientLimits) -> Result<(), ConfigError> {
    if limits.max_lines == 0
        || limits.max_query_length == 0
        || limits.max_context_lines == 0
        || limits.max_page_size == 0
        || limits.timestamp_window_secs <= 0
    {
        return Err(ConfigError::Invalid("limits must be greater than zero".to_string()));
    }
    Ok(())
}

/// Default connect timeout in milliseconds.
const fn default_connect_timeout_ms() -> u64 {
    sls_client::transport::DEFAULT_CONNECT_TIMEOUT_MS
}

/// Default read timeout in milliseconds.
const fn default_read_timeout_ms() -> u64 {
    sls_client::transport::DEFAULT_READ_TIMEOUT_MS
}

/// Default maximum response size in bytes.
const fn default_max_response_bytes() -> usize {
    sls_client::transport::DEFAULT_MAX_RESPONSE_BYTES
}

/// Default maximum request body size in bytes.
const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default audit history capacity.
const fn default_history_capacity() -> usize {
    1_000
}
