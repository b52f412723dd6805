//! Configuration for the authentication core
//!
//! [`AuthConfig`] can be built programmatically or loaded from a TOML, YAML or
//! JSON file. Environment variables prefixed with `WARDEN` and using `__` as
//! the nesting separator override file settings, e.g.
//! `WARDEN__LOCKOUT__MAX_CONSECUTIVE_FAILURES=5`.

use std::fmt;
use std::path::Path;

use chrono::Duration;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::jwt::{Algorithm, JwtValidatorOptions};
use crate::models::TokenType;

/// Default environment variable prefix
pub const ENV_PREFIX: &str = "WARDEN";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT validation policy
    pub jwt: JwtConfig,
    /// Failed-login lockout policy
    pub lockout: LockoutPolicy,
    /// Opaque token lifetimes
    pub tokens: TokenLifetimes,
    /// Log output
    pub logging: LoggingConfig,
}

impl AuthConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The format is detected from the extension. `WARDEN__*` environment
    /// variables override file settings.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the file is missing, the format
    /// is unsupported, or the contents do not deserialize.
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// See [`AuthConfig::from_file`].
    pub fn from_file_with_prefix(path: impl AsRef<Path>, env_prefix: &str) -> AuthResult<Self> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();
        if !path.exists() {
            return Err(AuthError::Configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml" | "yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => {
                return Err(AuthError::Configuration(format!(
                    "unsupported configuration format: {}",
                    path.display()
                )));
            }
        };

        let path_str = path.to_str().ok_or_else(|| {
            AuthError::Configuration(format!("non UTF-8 path: {}", path.display()))
        })?;

        let config = Config::builder()
            .add_source(File::new(path_str, format))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// JWT validation policy
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Algorithm names accepted in the `alg` header
    pub allowed_algorithms: Vec<Algorithm>,
    /// Shared HMAC secret; never serialized back out
    #[serde(skip_serializing, deserialize_with = "deserialize_secret")]
    pub hmac_secret: Option<SecretString>,
    /// If set, a present `iss` must equal this value
    pub expected_issuer: Option<String>,
    pub issuer_required: bool,
    pub expire_required: bool,
    pub issued_at_required: bool,
    pub subject_required: bool,
    pub jti_required: bool,
    /// Reserved, not enforced
    pub expected_audience: Option<String>,
    /// Reserved, not enforced
    pub audience_required: bool,
    /// Reserved, not enforced
    pub not_before_required: bool,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            allowed_algorithms: vec![Algorithm::HS256],
            hmac_secret: None,
            expected_issuer: None,
            issuer_required: false,
            expire_required: true,
            issued_at_required: false,
            subject_required: false,
            jti_required: false,
            expected_audience: None,
            audience_required: false,
            not_before_required: false,
        }
    }
}

// Manual Debug impl so the secret never reaches logs
impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "<redacted>"))
            .field("expected_issuer", &self.expected_issuer)
            .field("issuer_required", &self.issuer_required)
            .field("expire_required", &self.expire_required)
            .field("issued_at_required", &self.issued_at_required)
            .field("subject_required", &self.subject_required)
            .field("jti_required", &self.jti_required)
            .finish_non_exhaustive()
    }
}

impl JwtConfig {
    /// Validator options described by this configuration
    pub fn validator_options(&self) -> JwtValidatorOptions {
        JwtValidatorOptions {
            allowed_algorithms: self.allowed_algorithms.clone(),
            hmac_secret: self.hmac_secret.clone(),
            expected_issuer: self.expected_issuer.clone(),
            issuer_required: self.issuer_required,
            expire_required: self.expire_required,
            issued_at_required: self.issued_at_required,
            subject_required: self.subject_required,
            jti_required: self.jti_required,
            expected_audience: self.expected_audience.clone(),
            audience_required: self.audience_required,
            not_before_required: self.not_before_required,
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(s.map(SecretString::new))
}

/// Failed-login lockout policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutPolicy {
    /// Failures that trigger a lockout
    pub max_consecutive_failures: u32,
    /// Length of the lockout window in seconds
    pub lockout_duration_secs: u64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 10,
            lockout_duration_secs: 15 * 60,
        }
    }
}

impl LockoutPolicy {
    /// Lockout window as a duration
    pub fn lockout_duration(&self) -> Duration {
        seconds(self.lockout_duration_secs)
    }
}

/// Lifetimes of issued opaque tokens, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenLifetimes {
    pub csrf_secs: u64,
    pub password_reset_secs: u64,
    pub magic_login_secs: u64,
    pub confirm_contact_secs: u64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            csrf_secs: 60 * 60,
            password_reset_secs: 60 * 60,
            magic_login_secs: 15 * 60,
            confirm_contact_secs: 24 * 60 * 60,
        }
    }
}

impl TokenLifetimes {
    /// Configured lifetime for `token_type`
    ///
    /// Session and invalid tokens have no configured lifetime.
    pub fn for_type(&self, token_type: TokenType) -> Option<Duration> {
        let secs = match token_type {
            TokenType::Csrf => self.csrf_secs,
            TokenType::PasswordReset => self.password_reset_secs,
            TokenType::MagicLogin => self.magic_login_secs,
            TokenType::ConfirmContact => self.confirm_contact_secs,
            TokenType::Session | TokenType::Invalid => return None,
        };
        Some(seconds(secs))
    }
}

fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Log output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of pretty output
    pub json: bool,
    /// Write to stderr instead of stdout
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            stderr: false,
        }
    }
}
