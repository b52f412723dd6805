//! Login state machine
//!
//! A user is either active or locked until some instant. Each password
//! attempt walks a fixed sequence of checks and stops at the first failure:
//!
//! 1. a user owns the presented primary contact
//! 2. the contact is primary
//! 3. the user is not locked out
//! 4. the contact is confirmed
//! 5. the password matches
//!
//! Only a wrong password changes state before failing: the failure counter
//! grows, and reaching the policy threshold resets it and opens a lockout
//! window. A locked-out user accumulates no further failures.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::password::{DEFAULT_COST, hash_password, verify_password};
use crate::audit::{AuditLogger, AuthEvent};
use crate::clock::{SharedClock, system_clock};
use crate::config::LockoutPolicy;
use crate::error::{AuthError, AuthResult};
use crate::models::{Contact, ContactType, Token, TokenType, User};
use crate::repository::UserRepository;
use crate::tokens::TokenService;

/// Authenticates users by primary contact and password
#[derive(Clone)]
pub struct CredentialAuthenticator {
    users: Arc<dyn UserRepository>,
    tokens: TokenService,
    policy: LockoutPolicy,
    clock: SharedClock,
    audit: AuditLogger,
    password_cost: u32,
}

impl fmt::Debug for CredentialAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialAuthenticator")
            .field("policy", &self.policy)
            .field("tokens", &self.tokens)
            .field("clock", &self.clock)
            .field("password_cost", &self.password_cost)
            .finish_non_exhaustive()
    }
}

impl CredentialAuthenticator {
    /// Authenticator with the default lockout policy and the system clock
    pub fn new(users: Arc<dyn UserRepository>, tokens: TokenService) -> Self {
        Self {
            users,
            tokens,
            policy: LockoutPolicy::default(),
            clock: system_clock(),
            audit: AuditLogger::default(),
            password_cost: DEFAULT_COST,
        }
    }

    /// Replace the lockout policy
    pub fn with_policy(mut self, policy: LockoutPolicy) -> Self {
        self.policy = policy;
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

    /// bcrypt cost for passwords stored by [`reset_password`](Self::reset_password)
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    /// Lockout policy in force
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Token service used for reset and magic login tokens
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Authenticate with a primary contact and password
    ///
    /// # Errors
    ///
    /// In check order: [`AuthError::NoUserFound`],
    /// [`AuthError::ContactNotPrimary`], [`AuthError::UserLockedOut`],
    /// [`AuthError::ContactNotConfirmed`], [`AuthError::WrongPassword`].
    /// A malformed stored hash yields [`AuthError::PasswordHash`]; repository
    /// failures propagate.
    pub async fn login_with_primary_contact(
        &self,
        contact_type: &ContactType,
        principal: &str,
        password: &str,
    ) -> AuthResult<User> {
        let result = self.authenticate(contact_type, principal, password).await;
        match &result {
            Ok(user) => {
                self.audit.log(AuthEvent::LoginSuccess {
                    user_id: user.id.clone(),
                    contact_type: contact_type.to_string(),
                });
            }
            Err(e) => {
                self.audit.log(AuthEvent::LoginFailure {
                    principal: principal.to_string(),
                    contact_type: contact_type.to_string(),
                    reason: e.code().to_string(),
                });
            }
        }
        result
    }

    async fn authenticate(
        &self,
        contact_type: &ContactType,
        principal: &str,
        password: &str,
    ) -> AuthResult<User> {
        let (mut user, contact) = self.find_primary(contact_type, principal).await?;

        let now = self.clock.now();
        if user.is_locked_out(now) {
            return Err(locked_out(&user));
        }

        if contact.confirmed_date.is_none() {
            return Err(AuthError::ContactNotConfirmed {
                contact_id: contact.id,
                principal: principal.to_string(),
                principal_type: contact_type.to_string(),
            });
        }

        if !verify_password(&user.id, password, &user.password_hash).await? {
            self.record_failure(&mut user).await;
            return Err(AuthError::WrongPassword { user_id: user.id });
        }

        if user.consecutive_failed_login_attempts > 0 {
            user.consecutive_failed_login_attempts = 0;
            user.audit.touch(user.id.clone(), now);
            self.users.update_user(&user, &user.id).await?;
            debug!(user_id = %user.id, "Failed login counter reset");
        }

        info!(user_id = %user.id, "User authenticated");
        Ok(user)
    }

    // Count a wrong password and open a lockout window at the threshold.
    async fn record_failure(&self, user: &mut User) {
        let now = self.clock.now();
        user.consecutive_failed_login_attempts += 1;

        let threshold = self.policy.max_consecutive_failures;
        if threshold > 0 && user.consecutive_failed_login_attempts >= threshold {
            let until = now
                .checked_add_signed(self.policy.lockout_duration())
                .unwrap_or(now);
            user.consecutive_failed_login_attempts = 0;
            user.locked_out_until = Some(until);

            warn!(user_id = %user.id, locked_out_until = %until, "User locked out");
            self.audit.log(AuthEvent::AccountLockedOut {
                user_id: user.id.clone(),
                locked_out_until: until,
            });
        } else {
            debug!(
                user_id = %user.id,
                failures = user.consecutive_failed_login_attempts,
                "Wrong password"
            );
        }

        user.audit.touch(user.id.clone(), now);
        // The caller still sees the wrong password; a lost counter update is logged.
        if let Err(e) = self.users.update_user(user, &user.id).await {
            error!(user_id = %user.id, error = %e, "Failed to persist failed login state");
        }
    }

    async fn find_primary(
        &self,
        contact_type: &ContactType,
        principal: &str,
    ) -> AuthResult<(User, Contact)> {
        let Some((user, contact)) = self
            .users
            .get_user_and_contact_by_primary_contact(contact_type, principal)
            .await?
        else {
            return Err(AuthError::NoUserFound {
                principal: principal.to_string(),
                principal_type: contact_type.to_string(),
            });
        };

        if !contact.is_primary {
            return Err(AuthError::ContactNotPrimary {
                contact_id: contact.id,
                principal: principal.to_string(),
                principal_type: contact_type.to_string(),
            });
        }

        Ok((user, contact))
    }

    /// Issue a password reset token for the owner of a primary contact
    ///
    /// The caller delivers the token value to the contact.
    ///
    /// # Errors
    ///
    /// [`AuthError::NoUserFound`], [`AuthError::ContactNotPrimary`], or any
    /// token service error.
    pub async fn start_password_reset(
        &self,
        contact_type: &ContactType,
        principal: &str,
    ) -> AuthResult<Token> {
        let (user, _contact) = self.find_primary(contact_type, principal).await?;
        self.tokens.issue_password_reset(user.id).await
    }

    /// Replace a password using a reset token
    ///
    /// Clears the failure counter and any lockout, then deletes the token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidToken`] for an unknown, expired or mistyped token
    /// - [`AuthError::NoUserFound`] if the token's user no longer exists
    /// - [`AuthError::PasswordHash`] if hashing fails
    /// - any repository error
    pub async fn reset_password(&self, token_value: &str, new_password: &str) -> AuthResult<User> {
        let token = self.tokens.get(token_value, TokenType::PasswordReset).await?;
        let mut user = self.user_for_token(&token).await?;

        user.password_hash = hash_password(&user.id, new_password, self.password_cost).await?;
        user.consecutive_failed_login_attempts = 0;
        user.locked_out_until = None;
        user.audit.touch(user.id.clone(), self.clock.now());
        self.users.update_user(&user, &user.id).await?;

        self.tokens.delete(token_value).await?;
        self.audit.log(AuthEvent::PasswordReset {
            user_id: user.id.clone(),
        });
        Ok(user)
    }

    /// Issue a magic login token for the owner of a confirmed primary contact
    ///
    /// # Errors
    ///
    /// [`AuthError::NoUserFound`], [`AuthError::ContactNotPrimary`],
    /// [`AuthError::UserLockedOut`], [`AuthError::ContactNotConfirmed`], or
    /// any token service error.
    pub async fn start_magic_login(
        &self,
        contact_type: &ContactType,
        principal: &str,
    ) -> AuthResult<Token> {
        let (user, contact) = self.find_primary(contact_type, principal).await?;
        if user.is_locked_out(self.clock.now()) {
            return Err(locked_out(&user));
        }
        if contact.confirmed_date.is_none() {
            return Err(AuthError::ContactNotConfirmed {
                contact_id: contact.id,
                principal: principal.to_string(),
                principal_type: contact_type.to_string(),
            });
        }
        self.tokens.issue_magic_login(user.id).await
    }

    /// Authenticate by redeeming a magic login token
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidToken`] for an unknown, expired or mistyped token
    /// - [`AuthError::NoUserFound`] if the token's user no longer exists
    /// - [`AuthError::UserLockedOut`] if the user was locked after issuance
    pub async fn login_with_magic_token(&self, token_value: &str) -> AuthResult<User> {
        let token = self.tokens.redeem(token_value, TokenType::MagicLogin).await?;
        let user = self.user_for_token(&token).await?;
        if user.is_locked_out(self.clock.now()) {
            return Err(locked_out(&user));
        }

        self.audit.log(AuthEvent::LoginSuccess {
            user_id: user.id.clone(),
            contact_type: TokenType::MagicLogin.to_string(),
        });
        Ok(user)
    }

    async fn user_for_token(&self, token: &Token) -> AuthResult<User> {
        self.users
            .get_user_by_id(&token.target_id)
            .await?
            .ok_or_else(|| AuthError::NoUserFound {
                principal: token.target_id.clone(),
                principal_type: "user_id".to_string(),
            })
    }
}

fn locked_out(user: &User) -> AuthError {
    AuthError::UserLockedOut {
        user_id: user.id.clone(),
        locked_out_until: user
            .locked_out_until
            .map(|until| until.to_rfc3339())
            .unwrap_or_default(),
    }
}
