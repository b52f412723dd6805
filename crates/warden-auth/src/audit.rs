//! Structured audit logging for authentication events
//!
//! Every credential decision and token transition is emitted as a structured
//! `tracing` event on the `audit::auth` target, tagged with a time-ordered
//! audit id. Route that target to durable storage for compliance retention.
//!
//! ```rust
//! use warden_auth::audit::{AuditLogger, AuthEvent};
//!
//! let logger = AuditLogger::new("accounts");
//! logger.log(AuthEvent::LoginSuccess {
//!     user_id: "user-1".to_string(),
//!     contact_type: "email".to_string(),
//! });
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

/// Audit logger for authentication events
#[derive(Debug, Clone)]
pub struct AuditLogger {
    service_name: String,
    hash_identifiers: bool,
}

impl AuditLogger {
    /// Create a logger attributing events to `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            hash_identifiers: false,
        }
    }

    /// Logger that hashes user ids and principals
    pub fn privacy_focused(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            hash_identifiers: true,
        }
    }

    /// Builder method to configure identifier hashing
    pub fn with_identifier_hashing(mut self, hash: bool) -> Self {
        self.hash_identifiers = hash;
        self
    }

    /// Service name attached to every event
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Emit an event, returning the record that was logged
    pub fn log(&self, event: AuthEvent) -> AuditRecord {
        let record = AuditRecord {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            service: self.service_name.clone(),
            event,
        };

        match &record.event {
            AuthEvent::LoginSuccess {
                user_id,
                contact_type,
            } => {
                info!(
                    target: "audit::auth",
                    audit_id = %record.id,
                    event_type = record.event.event_type(),
                    user_id = %self.maybe_hash(user_id),
                    contact_type = %contact_type,
                    service = %self.service_name,
                    "Authentication successful"
                );
            }
            AuthEvent::LoginFailure {
                principal,
                contact_type,
                reason,
            } => {
                warn!(
                    target: "audit::auth",
                    audit_id = %record.id,
                    event_type = record.event.event_type(),
                    principal = %self.maybe_hash(principal),
                    contact_type = %contact_type,
                    reason = %reason,
                    service = %self.service_name,
                    "Authentication failed"
                );
            }
            AuthEvent::AccountLockedOut {
                user_id,
                locked_out_until,
            } => {
                warn!(
                    target: "audit::auth",
                    audit_id = %record.id,
                    event_type = record.event.event_type(),
                    user_id = %self.maybe_hash(user_id),
                    locked_out_until = %locked_out_until,
                    service = %self.service_name,
                    "Account locked out"
                );
            }
            AuthEvent::TokenIssued {
                target_id,
                token_type,
                expires_at,
            } => {
                info!(
                    target: "audit::auth",
                    audit_id = %record.id,
                    event_type = record.event.event_type(),
                    target_id = %self.maybe_hash(target_id),
                    token_type = %token_type,
                    expires_at = %expires_at,
                    service = %self.service_name,
                    "Token issued"
                );
            }
            AuthEvent::TokenRedeemed {
                target_id,
                token_type,
            } => {
                info!(
                    target: "audit::auth",
                    audit_id = %record.id,
                    event_type = record.event.event_type(),
                    target_id = %self.maybe_hash(target_id),
                    token_type = %token_type,
                    service = %self.service_name,
                    "Token redeemed"
                );
            }
            AuthEvent::TokenRejected { token_type, reason } => {
                warn!(
                    target: "audit::auth",
                    audit_id = %record.id,
                    event_type = record.event.event_type(),
                    token_type = %token_type,
                    reason = %reason,
                    service = %self.service_name,
                    "Token rejected"
                );
            }
            AuthEvent::PasswordReset { user_id } => {
                info!(
                    target: "audit::auth",
                    audit_id = %record.id,
                    event_type = record.event.event_type(),
                    user_id = %self.maybe_hash(user_id),
                    service = %self.service_name,
                    "Password reset"
                );
            }
        }

        record
    }

    fn maybe_hash(&self, value: &str) -> String {
        if self.hash_identifiers {
            hash_identifier(value)
        } else {
            value.to_string()
        }
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new("warden")
    }
}

/// Truncated SHA-256 of an identifier, stable across processes
pub fn hash_identifier(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}

/// Authentication event types for audit logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    /// Credentials accepted
    LoginSuccess {
        /// Authenticated user
        user_id: String,
        /// Channel of the primary contact used
        contact_type: String,
    },

    /// Credentials refused
    LoginFailure {
        /// Principal that was presented
        principal: String,
        /// Channel of the principal
        contact_type: String,
        /// Error code of the failure
        reason: String,
    },

    /// Failure threshold reached
    AccountLockedOut {
        /// Locked user
        user_id: String,
        /// End of the lockout window
        locked_out_until: DateTime<Utc>,
    },

    /// Opaque token stored
    TokenIssued {
        /// Record the token acts on
        target_id: String,
        /// Token purpose
        token_type: String,
        /// Expiration instant
        expires_at: DateTime<Utc>,
    },

    /// Opaque token consumed
    TokenRedeemed {
        /// Record the token acts on
        target_id: String,
        /// Token purpose
        token_type: String,
    },

    /// Opaque token refused on creation or redemption
    TokenRejected {
        /// Expected or presented purpose
        token_type: String,
        /// Error code of the rejection
        reason: String,
    },

    /// Password replaced through a reset token
    PasswordReset {
        /// User whose password changed
        user_id: String,
    },
}

impl AuthEvent {
    /// Stable snake_case event name
    pub fn event_type(&self) -> &'static str {
        match self {
            AuthEvent::LoginSuccess { .. } => "login_success",
            AuthEvent::LoginFailure { .. } => "login_failure",
            AuthEvent::AccountLockedOut { .. } => "account_locked_out",
            AuthEvent::TokenIssued { .. } => "token_issued",
            AuthEvent::TokenRedeemed { .. } => "token_redeemed",
            AuthEvent::TokenRejected { .. } => "token_rejected",
            AuthEvent::PasswordReset { .. } => "password_reset",
        }
    }
}

/// Audit record wrapping an event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Time-ordered audit record id
    pub id: Uuid,
    /// When the event was logged
    pub timestamp: DateTime<Utc>,
    /// Service that generated the event
    pub service: String,
    /// The audit event
    pub event: AuthEvent,
}
