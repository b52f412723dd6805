//! Domain records handed in by persistence collaborators
//!
//! Only the fields the authentication core reads or mutates are modeled.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creation and modification metadata shared by managed records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditData {
    /// Who created the record
    pub created_by_id: String,
    /// When the record was created
    pub created_on: DateTime<Utc>,
    /// Who last modified the record
    pub modified_by_id: Option<String>,
    /// When the record was last modified
    pub modified_on: Option<DateTime<Utc>>,
}

impl AuditData {
    /// Metadata for a record created now
    pub fn created(by: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            created_by_id: by.into(),
            created_on: at,
            modified_by_id: None,
            modified_on: None,
        }
    }

    /// Stamp a modification
    pub fn touch(&mut self, by: impl Into<String>, at: DateTime<Utc>) {
        self.modified_by_id = Some(by.into());
        self.modified_on = Some(at);
    }
}

/// User record (authentication subset)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user id
    pub id: String,
    /// bcrypt hash of the current password
    pub password_hash: String,
    /// Failed attempts since the last success or lockout
    pub consecutive_failed_login_attempts: u32,
    /// Attempts are refused until this instant
    pub locked_out_until: Option<DateTime<Utc>>,
    /// Creation and modification metadata
    pub audit: AuditData,
}

impl User {
    /// Whether the lockout window is still open at `now`
    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.locked_out_until.is_some_and(|until| until > now)
    }
}

/// Channel a contact principal belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    Email,
    Phone,
    /// Any other channel, by name
    Other(String),
}

impl ContactType {
    /// Lowercase channel name
    pub fn as_str(&self) -> &str {
        match self {
            ContactType::Email => "email",
            ContactType::Phone => "phone",
            ContactType::Other(name) => name,
        }
    }
}

impl fmt::Display for ContactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact method for a user (authentication subset)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Stable contact id
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Identifying value (email address, phone number)
    pub principal: String,
    /// Channel
    pub contact_type: ContactType,
    /// Only the primary contact may authenticate its user
    pub is_primary: bool,
    /// Set once the principal has been confirmed
    pub confirmed_date: Option<DateTime<Utc>>,
}

/// Purpose of an opaque token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Sentinel for an uninitialized token; never stored
    #[default]
    Invalid,
    Csrf,
    ConfirmContact,
    PasswordReset,
    Session,
    MagicLogin,
}

impl TokenType {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Invalid => "invalid",
            TokenType::Csrf => "csrf",
            TokenType::ConfirmContact => "confirm_contact",
            TokenType::PasswordReset => "password_reset",
            TokenType::Session => "session",
            TokenType::MagicLogin => "magic_login",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque random credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Random, unguessable value
    pub value: String,
    /// Purpose
    pub token_type: TokenType,
    /// Id of the record the token acts on (user id, contact id)
    pub target_id: String,
    /// Dead at and after this instant
    pub expiration: DateTime<Utc>,
}

impl Token {
    /// Whether the token can still be redeemed at `now`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expiration > now
    }
}

// Manual Debug impl so token values never reach logs
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("target_id", &self.target_id)
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_lockout_window() {
        let now = Utc::now();
        let mut user = User::default();
        assert!(!user.is_locked_out(now));

        user.locked_out_until = Some(now + Duration::minutes(15));
        assert!(user.is_locked_out(now));
        assert!(!user.is_locked_out(now + Duration::minutes(15)));
    }

    #[test]
    fn test_token_liveness_excludes_expiry_instant() {
        let now = Utc::now();
        let token = Token {
            value: "abc".to_string(),
            token_type: TokenType::Csrf,
            target_id: String::new(),
            expiration: now,
        };
        assert!(!token.is_live(now));
        assert!(token.is_live(now - Duration::seconds(1)));
        assert!(!format!("{token:?}").contains("abc"));
    }

    #[test]
    fn test_audit_touch() {
        let now = Utc::now();
        let mut audit = AuditData::created("bootstrap", now);
        assert_eq!(audit.modified_by_id, None);

        audit.touch("admin", now + Duration::seconds(5));
        assert_eq!(audit.modified_by_id.as_deref(), Some("admin"));
        assert_eq!(audit.modified_on, Some(now + Duration::seconds(5)));
    }

    #[test]
    fn test_contact_type_names() {
        assert_eq!(ContactType::Email.to_string(), "email");
        assert_eq!(ContactType::Other("pager".to_string()).as_str(), "pager");
        assert_eq!(TokenType::PasswordReset.to_string(), "password_reset");
    }
}
