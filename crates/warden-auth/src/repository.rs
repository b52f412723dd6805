//! Persistence collaborator interfaces
//!
//! Storage backends live outside this crate. Implementations must serialize
//! read-modify-write of a user's failure counter and lockout (conditional
//! update or row lock); the core assumes at least last-writer-wins.

use async_trait::async_trait;

use crate::error::AuthResult;
use crate::jwt::AlgorithmFamily;
use crate::models::{Contact, ContactType, Token, User};
use crate::signing_material::JwtSigningMaterial;

/// User and contact lookup
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// User owning the primary contact `(contact_type, principal)`, with that contact
    async fn get_user_and_contact_by_primary_contact(
        &self,
        contact_type: &ContactType,
        principal: &str,
    ) -> AuthResult<Option<(User, Contact)>>;

    /// User by id
    async fn get_user_by_id(&self, user_id: &str) -> AuthResult<Option<User>>;

    /// Persist a mutated user
    async fn update_user(&self, user: &User, modified_by: &str) -> AuthResult<()>;
}

/// Signing material lookup
#[async_trait]
pub trait SigningMaterialRepository: Send + Sync {
    /// Every non-disabled, non-expired material of `family`
    async fn get_valid_by_algorithm_family(
        &self,
        family: AlgorithmFamily,
    ) -> AuthResult<Vec<JwtSigningMaterial>>;
}

/// Opaque token storage
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Token by value
    async fn get_token(&self, value: &str) -> AuthResult<Option<Token>>;

    /// Store a token
    async fn put_token(&self, token: &Token) -> AuthResult<()>;

    /// Remove a token; removing an unknown value is not an error
    async fn delete_token(&self, value: &str) -> AuthResult<()>;
}
