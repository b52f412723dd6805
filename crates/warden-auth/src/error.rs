//! Error types for the authentication core
//!
//! Two layers of failure exist:
//!
//! - [`AuthError`] is returned immediately by any fallible operation. Every
//!   variant carries the metadata a caller needs for logging (ids, principal,
//!   algorithm name).
//! - [`ValidationError`] is a plain code collected into a [`ValidationReport`]
//!   so that a single header or claims check can report every defect at once.

use std::fmt;

use thiserror::Error;

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Message shown to end users for every credential failure kind.
///
/// Distinguishing "no such user" from "wrong password" in user-facing output
/// enables principal enumeration, so all of them render the same text.
pub const AUTHENTICATION_FAILED_MESSAGE: &str = "no account found or incorrect password";

/// Error kind, used for metrics and log routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The component cannot be built; fix configuration before serving traffic
    Config,
    /// A header or claim defect
    Validation,
    /// The configuration references an algorithm the engine cannot execute
    AlgorithmNotImplemented,
    /// A credential check failed
    Authentication,
    /// An opaque token was rejected on creation or redemption
    Token,
    /// A collaborator (repository, hasher, subscriber) failed
    Internal,
}

impl ErrorCategory {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "config",
            ErrorCategory::Validation => "validation",
            ErrorCategory::AlgorithmNotImplemented => "algorithm_not_implemented",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Token => "token",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every failure the authentication core can return
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("JWT validator requires at least one allowed algorithm")]
    NoAlgorithmSpecified,

    #[error("JWT validator allows HMAC algorithm {algorithm} but no HMAC secret was provided")]
    NoHmacSecretProvided { algorithm: String },

    #[error("JWT algorithm not implemented: {algorithm}")]
    AlgorithmNotImplemented { algorithm: String },

    #[error("Signing material {key_id} uses unsupported algorithm family {family}")]
    AlgorithmTypeNotSupported { key_id: String, family: String },

    #[error("No valid JWT signing material found for {query}")]
    NoJwtSigningMaterialFound { query: String },

    #[error("Malformed JWT: {reason}")]
    MalformedJwt { reason: String },

    #[error("JWT rejected: {}", format_codes(.errors))]
    TokenRejected { errors: Vec<ValidationError> },

    #[error("No user found for {principal_type} contact {principal}")]
    NoUserFound {
        principal: String,
        principal_type: String,
    },

    #[error("Contact {contact_id} ({principal_type} {principal}) is not the primary contact")]
    ContactNotPrimary {
        contact_id: String,
        principal: String,
        principal_type: String,
    },

    #[error("Contact {contact_id} ({principal_type} {principal}) is not confirmed")]
    ContactNotConfirmed {
        contact_id: String,
        principal: String,
        principal_type: String,
    },

    #[error("User {user_id} is locked out until {locked_out_until}")]
    UserLockedOut {
        user_id: String,
        locked_out_until: String,
    },

    #[error("Login failed for user {user_id}: wrong password")]
    WrongPassword { user_id: String },

    #[error("Password hash operation failed for user {user_id}: {reason}")]
    PasswordHash { user_id: String, reason: String },

    #[error("Invalid token: {token_type}")]
    InvalidToken { token_type: String },

    #[error("Malformed token: {}", .reasons.join(", "))]
    MalformedToken { reasons: Vec<String> },

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

fn format_codes(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::code)
        .collect::<Vec<_>>()
        .join(", ")
}

impl AuthError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::NoAlgorithmSpecified => "JWTValidatorNoAlgorithmSpecified",
            AuthError::NoHmacSecretProvided { .. } => "JWTValidatorNoHMACSecretProvided",
            AuthError::AlgorithmNotImplemented { .. } => "JWTAlgorithmNotImplemented",
            AuthError::AlgorithmTypeNotSupported { .. } => {
                "JWTSigningMaterialAlgorithmTypeNotSupported"
            }
            AuthError::NoJwtSigningMaterialFound { .. } => "NoJWTSigningMaterialFound",
            AuthError::MalformedJwt { .. } => "MalformedJWT",
            AuthError::TokenRejected { .. } => "JWTRejected",
            AuthError::NoUserFound { .. } => "NoUserFound",
            AuthError::ContactNotPrimary { .. } => "LoginContactNotPrimary",
            AuthError::ContactNotConfirmed { .. } => "ContactNotConfirmed",
            AuthError::UserLockedOut { .. } => "UserLockedOut",
            AuthError::WrongPassword { .. } => "LoginFailedWrongPassword",
            AuthError::PasswordHash { .. } => "BcryptPasswordHashError",
            AuthError::InvalidToken { .. } => "InvalidToken",
            AuthError::MalformedToken { .. } => "MalformedToken",
            AuthError::Repository(_) => "RepositoryError",
            AuthError::Configuration(_) => "ConfigurationError",
            AuthError::Telemetry(_) => "TelemetryError",
        }
    }

    /// Error kind for log routing
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::NoAlgorithmSpecified
            | AuthError::NoHmacSecretProvided { .. }
            | AuthError::AlgorithmTypeNotSupported { .. }
            | AuthError::NoJwtSigningMaterialFound { .. }
            | AuthError::Configuration(_) => ErrorCategory::Config,
            AuthError::AlgorithmNotImplemented { .. } => ErrorCategory::AlgorithmNotImplemented,
            AuthError::MalformedJwt { .. } | AuthError::TokenRejected { .. } => {
                ErrorCategory::Validation
            }
            AuthError::NoUserFound { .. }
            | AuthError::ContactNotPrimary { .. }
            | AuthError::ContactNotConfirmed { .. }
            | AuthError::UserLockedOut { .. }
            | AuthError::WrongPassword { .. } => ErrorCategory::Authentication,
            AuthError::InvalidToken { .. } | AuthError::MalformedToken { .. } => {
                ErrorCategory::Token
            }
            AuthError::PasswordHash { .. }
            | AuthError::Repository(_)
            | AuthError::Telemetry(_) => ErrorCategory::Internal,
        }
    }

    /// True for the credential failures that share one user-facing message
    pub fn is_authentication_failure(&self) -> bool {
        self.category() == ErrorCategory::Authentication
    }

    /// Text safe to show an end user.
    ///
    /// Authentication failures collapse into [`AUTHENTICATION_FAILED_MESSAGE`],
    /// except an unconfirmed contact which the user can act on.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::ContactNotConfirmed { .. } => "contact not confirmed".to_string(),
            e if e.is_authentication_failure() => AUTHENTICATION_FAILED_MESSAGE.to_string(),
            AuthError::InvalidToken { .. } | AuthError::MalformedToken { .. } => {
                "invalid or expired token".to_string()
            }
            AuthError::MalformedJwt { .. } | AuthError::TokenRejected { .. } => {
                "invalid bearer token".to_string()
            }
            _ => "internal error".to_string(),
        }
    }
}

impl From<config::ConfigError> for AuthError {
    fn from(error: config::ConfigError) -> Self {
        AuthError::Configuration(error.to_string())
    }
}

/// A single header or claims defect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationError {
    AlgorithmNotAllowed,
    IssuerMissing,
    IssuerInvalid,
    ExpireMissing,
    Expired,
    IssuedAtMissing,
    IssuedAtInvalid,
    SubjectMissing,
    IdMissing,
    SignatureInvalid,
}

impl ValidationError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::AlgorithmNotAllowed => "JWTAlgorithmNotAllowed",
            ValidationError::IssuerMissing => "JWTIssuerMissing",
            ValidationError::IssuerInvalid => "JWTIssuerInvalid",
            ValidationError::ExpireMissing => "JWTExpireMissing",
            ValidationError::Expired => "JWTExpired",
            ValidationError::IssuedAtMissing => "JWTIssuedAtMissing",
            ValidationError::IssuedAtInvalid => "JWTIssuedAtInvalid",
            ValidationError::SubjectMissing => "JWTSubjectMissing",
            ValidationError::IdMissing => "JWTIDMissing",
            ValidationError::SignatureInvalid => "JWTSignatureInvalid",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Ordered, possibly empty list of defects from one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// Create an empty (valid) report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a defect
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Append every defect from another report
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
    }

    /// True iff no defect was recorded
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Recorded defects in detection order
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Whether a specific defect was recorded
    pub fn contains(&self, error: ValidationError) -> bool {
        self.errors.contains(&error)
    }

    /// Consume the report, failing with [`AuthError::TokenRejected`] if any defect exists
    pub fn into_result(self) -> AuthResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(AuthError::TokenRejected {
                errors: self.errors,
            })
        }
    }
}

impl From<ValidationReport> for Vec<ValidationError> {
    fn from(report: ValidationReport) -> Self {
        report.errors
    }
}
