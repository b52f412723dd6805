//! Opaque token lifecycle
//!
//! Tokens are random bearer values stored through a [`TokenRepository`]. A
//! token is live strictly before its expiration; redemption at or after that
//! instant is refused.
//!
//! [`TokenService::get`] does not delete. A caller that needs single use
//! calls [`TokenService::redeem`], which deletes after a successful lookup;
//! the two steps are not atomic unless the repository makes them so.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Duration;
use rand::RngCore;
use tracing::debug;

use crate::audit::{AuditLogger, AuthEvent};
use crate::clock::{SharedClock, system_clock};
use crate::config::TokenLifetimes;
use crate::error::{AuthError, AuthResult};
use crate::models::{Token, TokenType};
use crate::repository::TokenRepository;

/// Random bytes in a generated token value
pub const TOKEN_VALUE_BYTES: usize = 32;

/// Fresh url-safe random token value
pub fn generate_token_value() -> String {
    let mut bytes = [0u8; TOKEN_VALUE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Creates, looks up and deletes opaque tokens
#[derive(Clone)]
pub struct TokenService {
    repository: Arc<dyn TokenRepository>,
    lifetimes: TokenLifetimes,
    clock: SharedClock,
    audit: AuditLogger,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetimes", &self.lifetimes)
            .field("clock", &self.clock)
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Service over `repository` with default lifetimes and the system clock
    pub fn new(repository: Arc<dyn TokenRepository>) -> Self {
        Self {
            repository,
            lifetimes: TokenLifetimes::default(),
            clock: system_clock(),
            audit: AuditLogger::default(),
        }
    }

    /// Replace the configured lifetimes
    pub fn with_lifetimes(mut self, lifetimes: TokenLifetimes) -> Self {
        self.lifetimes = lifetimes;
        self
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the audit logger
    pub fn with_audit_logger(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Configured lifetimes
    pub fn lifetimes(&self) -> &TokenLifetimes {
        &self.lifetimes
    }

    /// Store a token
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedToken`] listing every defect: empty value,
    ///   the invalid sentinel type, or an expiration not after now
    /// - any repository error
    pub async fn put(&self, token: &Token) -> AuthResult<()> {
        let mut reasons = Vec::new();
        if token.value.is_empty() {
            reasons.push("value is empty".to_string());
        }
        if token.token_type == TokenType::Invalid {
            reasons.push("token type is invalid".to_string());
        }
        if !token.is_live(self.clock.now()) {
            reasons.push("token is expired".to_string());
        }

        if !reasons.is_empty() {
            let err = AuthError::MalformedToken { reasons };
            self.audit.log(AuthEvent::TokenRejected {
                token_type: token.token_type.to_string(),
                reason: err.code().to_string(),
            });
            return Err(err);
        }

        self.repository.put_token(token).await?;
        self.audit.log(AuthEvent::TokenIssued {
            target_id: token.target_id.clone(),
            token_type: token.token_type.to_string(),
            expires_at: token.expiration,
        });
        Ok(())
    }

    /// Look up a live token of the expected type
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidToken`] if the token is unknown, expired, or of
    ///   another type
    /// - any repository error
    pub async fn get(&self, value: &str, expected: TokenType) -> AuthResult<Token> {
        let invalid = |reason: &str| {
            debug!(token_type = %expected, reason, "Token lookup refused");
            self.audit.log(AuthEvent::TokenRejected {
                token_type: expected.to_string(),
                reason: reason.to_string(),
            });
            AuthError::InvalidToken {
                token_type: expected.to_string(),
            }
        };

        let Some(token) = self.repository.get_token(value).await? else {
            return Err(invalid("not found"));
        };
        if !token.is_live(self.clock.now()) {
            return Err(invalid("expired"));
        }
        if token.token_type != expected {
            return Err(invalid("type mismatch"));
        }

        Ok(token)
    }

    /// Remove a token
    ///
    /// # Errors
    ///
    /// Returns any repository error.
    pub async fn delete(&self, value: &str) -> AuthResult<()> {
        self.repository.delete_token(value).await
    }

    /// Look up then delete a token
    ///
    /// # Errors
    ///
    /// See [`TokenService::get`] and [`TokenService::delete`].
    pub async fn redeem(&self, value: &str, expected: TokenType) -> AuthResult<Token> {
        let token = self.get(value, expected).await?;
        self.delete(value).await?;
        self.audit.log(AuthEvent::TokenRedeemed {
            target_id: token.target_id.clone(),
            token_type: token.token_type.to_string(),
        });
        Ok(token)
    }

    /// Mint and store a token living for `ttl`
    ///
    /// # Errors
    ///
    /// See [`TokenService::put`]; a non-positive `ttl` is reported as expired.
    pub async fn issue(
        &self,
        token_type: TokenType,
        target_id: impl Into<String>,
        ttl: Duration,
    ) -> AuthResult<Token> {
        let now = self.clock.now();
        let token = Token {
            value: generate_token_value(),
            token_type,
            target_id: target_id.into(),
            expiration: now.checked_add_signed(ttl).unwrap_or(now),
        };
        self.put(&token).await?;
        Ok(token)
    }

    /// Anti-forgery token bound to `target_id` (a session or user id)
    ///
    /// # Errors
    ///
    /// See [`TokenService::put`].
    pub async fn issue_csrf(&self, target_id: impl Into<String>) -> AuthResult<Token> {
        self.issue_configured(TokenType::Csrf, target_id.into()).await
    }

    /// Password reset token for `user_id`
    ///
    /// # Errors
    ///
    /// See [`TokenService::put`].
    pub async fn issue_password_reset(&self, user_id: impl Into<String>) -> AuthResult<Token> {
        self.issue_configured(TokenType::PasswordReset, user_id.into())
            .await
    }

    /// Magic login token for `user_id`
    ///
    /// # Errors
    ///
    /// See [`TokenService::put`].
    pub async fn issue_magic_login(&self, user_id: impl Into<String>) -> AuthResult<Token> {
        self.issue_configured(TokenType::MagicLogin, user_id.into())
            .await
    }

    /// Contact confirmation token for `contact_id`
    ///
    /// # Errors
    ///
    /// See [`TokenService::put`].
    pub async fn issue_confirm_contact(&self, contact_id: impl Into<String>) -> AuthResult<Token> {
        self.issue_configured(TokenType::ConfirmContact, contact_id.into())
            .await
    }

    async fn issue_configured(&self, token_type: TokenType, target_id: String) -> AuthResult<Token> {
        let ttl = self
            .lifetimes
            .for_type(token_type)
            .ok_or_else(|| AuthError::Configuration(format!("no lifetime configured for {token_type} tokens")))?;
        self.issue(token_type, target_id, ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryTokens {
        tokens: Mutex<HashMap<String, Token>>,
    }

    #[async_trait]
    impl TokenRepository for MemoryTokens {
        async fn get_token(&self, value: &str) -> AuthResult<Option<Token>> {
            Ok(self.tokens.lock().get(value).cloned())
        }

        async fn put_token(&self, token: &Token) -> AuthResult<()> {
            self.tokens.lock().insert(token.value.clone(), token.clone());
            Ok(())
        }

        async fn delete_token(&self, value: &str) -> AuthResult<()> {
            self.tokens.lock().remove(value);
            Ok(())
        }
    }

    fn service() -> (TokenService, ManualClock, Arc<MemoryTokens>) {
        let clock = ManualClock::starting_now();
        let repo = Arc::new(MemoryTokens::default());
        let service = TokenService::new(repo.clone()).with_clock(Arc::new(clock.clone()));
        (service, clock, repo)
    }

    #[test]
    fn test_generated_values_are_url_safe_and_unique() {
        let a = generate_token_value();
        let b = generate_token_value();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[tokio::test]
    async fn test_put_collects_every_defect() {
        let (service, clock, repo) = service();
        let token = Token {
            value: String::new(),
            token_type: TokenType::Invalid,
            target_id: "u1".to_string(),
            expiration: clock.now(),
        };

        let err = service.put(&token).await.unwrap_err();
        assert_eq!(
            err,
            AuthError::MalformedToken {
                reasons: vec![
                    "value is empty".to_string(),
                    "token type is invalid".to_string(),
                    "token is expired".to_string(),
                ]
            }
        );
        assert!(repo.tokens.lock().is_empty());
    }

    #[tokio::test]
    async fn test_get_until_expiration() {
        let (service, clock, _repo) = service();
        let token = service
            .issue(TokenType::Csrf, "session-1", Duration::seconds(60))
            .await
            .unwrap();

        let found = service.get(&token.value, TokenType::Csrf).await.unwrap();
        assert_eq!(found.target_id, "session-1");

        clock.advance(Duration::seconds(59));
        assert!(service.get(&token.value, TokenType::Csrf).await.is_ok());

        clock.advance(Duration::seconds(1));
        let err = service.get(&token.value, TokenType::Csrf).await.unwrap_err();
        assert_eq!(err.code(), "InvalidToken");
    }

    #[tokio::test]
    async fn test_get_rejects_type_mismatch_and_unknown() {
        let (service, _clock, _repo) = service();
        let token = service.issue_magic_login("u1").await.unwrap();

        let err = service
            .get(&token.value, TokenType::PasswordReset)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::InvalidToken {
                token_type: "password_reset".to_string()
            }
        );

        assert!(service.get("missing", TokenType::Csrf).await.is_err());
    }

    #[tokio::test]
    async fn test_redeem_deletes() {
        let (service, _clock, repo) = service();
        let token = service.issue_password_reset("u1").await.unwrap();
        assert_eq!(repo.tokens.lock().len(), 1);

        let redeemed = service
            .redeem(&token.value, TokenType::PasswordReset)
            .await
            .unwrap();
        assert_eq!(redeemed.target_id, "u1");
        assert!(repo.tokens.lock().is_empty());

        assert!(
            service
                .redeem(&token.value, TokenType::PasswordReset)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_configured_lifetimes() {
        let (service, clock, _repo) = service();
        let csrf = service.issue_csrf("s1").await.unwrap();
        assert_eq!(csrf.expiration, clock.now() + Duration::hours(1));

        let magic = service.issue_magic_login("u1").await.unwrap();
        assert_eq!(magic.expiration, clock.now() + Duration::minutes(15));

        let confirm = service.issue_confirm_contact("c1").await.unwrap();
        assert_eq!(confirm.expiration, clock.now() + Duration::days(1));
    }

    #[tokio::test]
    async fn test_issue_with_non_positive_ttl_is_rejected() {
        let (service, _clock, _repo) = service();
        let err = service
            .issue(TokenType::Session, "u1", Duration::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken { .. }));
    }
}
