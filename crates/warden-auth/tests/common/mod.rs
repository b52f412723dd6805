//! Shared fakes for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use warden_auth::credentials::hash_password;
use warden_auth::jwt::AlgorithmFamily;
use warden_auth::{
    AuditData, AuthError, AuthResult, Clock, Contact, ContactType, CredentialAuthenticator,
    JwtSigningMaterial, ManualClock, SigningMaterialRepository, Token, TokenRepository,
    TokenService, User, UserRepository,
};

/// Cheapest bcrypt cost, for fast tests
pub const TEST_COST: u32 = 4;

pub const EMAIL: &str = "alice@example.com";
pub const PASSWORD: &str = "correct horse battery staple";

/// In-memory users and contacts that records every update
#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<String, User>>,
    contacts: Mutex<Vec<Contact>>,
    updates: Mutex<Vec<User>>,
    fail_updates: Mutex<bool>,
}

impl MemoryUsers {
    pub fn insert(&self, user: User, contact: Contact) {
        self.users.lock().insert(user.id.clone(), user);
        self.contacts.lock().push(contact);
    }

    pub fn user(&self, id: &str) -> Option<User> {
        self.users.lock().get(id).cloned()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn set_fail_updates(&self, fail: bool) {
        *self.fail_updates.lock() = fail;
    }

    pub fn edit_user(&self, id: &str, edit: impl FnOnce(&mut User)) {
        if let Some(user) = self.users.lock().get_mut(id) {
            edit(user);
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn get_user_and_contact_by_primary_contact(
        &self,
        contact_type: &ContactType,
        principal: &str,
    ) -> AuthResult<Option<(User, Contact)>> {
        let contact = self
            .contacts
            .lock()
            .iter()
            .find(|c| &c.contact_type == contact_type && c.principal == principal)
            .cloned();
        Ok(contact.and_then(|c| self.user(&c.user_id).map(|u| (u, c))))
    }

    async fn get_user_by_id(&self, user_id: &str) -> AuthResult<Option<User>> {
        Ok(self.user(user_id))
    }

    async fn update_user(&self, user: &User, _modified_by: &str) -> AuthResult<()> {
        if *self.fail_updates.lock() {
            return Err(AuthError::Repository("storage unavailable".to_string()));
        }
        self.users.lock().insert(user.id.clone(), user.clone());
        self.updates.lock().push(user.clone());
        Ok(())
    }
}

/// In-memory token store
#[derive(Default)]
pub struct MemoryTokens {
    tokens: Mutex<HashMap<String, Token>>,
}

impl MemoryTokens {
    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.tokens.lock().contains_key(value)
    }
}

#[async_trait]
impl TokenRepository for MemoryTokens {
    async fn get_token(&self, value: &str) -> AuthResult<Option<Token>> {
        Ok(self.tokens.lock().get(value).cloned())
    }

    async fn put_token(&self, token: &Token) -> AuthResult<()> {
        self.tokens
            .lock()
            .insert(token.value.clone(), token.clone());
        Ok(())
    }

    async fn delete_token(&self, value: &str) -> AuthResult<()> {
        self.tokens.lock().remove(value);
        Ok(())
    }
}

/// In-memory signing material store
#[derive(Default)]
pub struct MemoryMaterials {
    materials: Mutex<Vec<JwtSigningMaterial>>,
}

impl MemoryMaterials {
    pub fn insert(&self, material: JwtSigningMaterial) {
        self.materials.lock().push(material);
    }
}

#[async_trait]
impl SigningMaterialRepository for MemoryMaterials {
    async fn get_valid_by_algorithm_family(
        &self,
        family: AlgorithmFamily,
    ) -> AuthResult<Vec<JwtSigningMaterial>> {
        Ok(self
            .materials
            .lock()
            .iter()
            .filter(|m| m.algorithm_family() == family && !m.is_disabled())
            .cloned()
            .collect())
    }
}

pub fn confirmed_contact(user_id: &str, at: DateTime<Utc>) -> Contact {
    Contact {
        id: format!("contact-{user_id}"),
        user_id: user_id.to_string(),
        principal: EMAIL.to_string(),
        contact_type: ContactType::Email,
        is_primary: true,
        confirmed_date: Some(at),
    }
}

pub async fn user_with_password(id: &str, password: &str, at: DateTime<Utc>) -> User {
    User {
        id: id.to_string(),
        password_hash: hash_password(id, password, TEST_COST)
            .await
            .expect("hash"),
        consecutive_failed_login_attempts: 0,
        locked_out_until: None,
        audit: AuditData::created("test", at),
    }
}

/// Authenticator over fresh in-memory stores sharing one manual clock
pub struct Harness {
    pub clock: ManualClock,
    pub users: Arc<MemoryUsers>,
    pub tokens: Arc<MemoryTokens>,
    pub authenticator: CredentialAuthenticator,
}

impl Harness {
    pub fn new() -> Self {
        let clock = ManualClock::starting_now();
        let users = Arc::new(MemoryUsers::default());
        let tokens = Arc::new(MemoryTokens::default());
        let token_service = TokenService::new(tokens.clone()).with_clock(Arc::new(clock.clone()));
        let authenticator = CredentialAuthenticator::new(users.clone(), token_service)
            .with_clock(Arc::new(clock.clone()))
            .with_password_cost(TEST_COST);
        Self {
            clock,
            users,
            tokens,
            authenticator,
        }
    }

    /// Harness holding user `u1` with a confirmed primary email and [`PASSWORD`]
    pub async fn with_alice() -> Self {
        let harness = Self::new();
        let now = harness.clock.now();
        let user = user_with_password("u1", PASSWORD, now).await;
        harness.users.insert(user, confirmed_contact("u1", now));
        harness
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn login(&self, password: &str) -> AuthResult<User> {
        self.authenticator
            .login_with_primary_contact(&ContactType::Email, EMAIL, password)
            .await
    }
}
