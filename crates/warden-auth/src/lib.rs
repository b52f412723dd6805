//! # Warden Auth
//!
//! Authentication core: validates HMAC-signed JWTs, manages the signing
//! material behind them, authenticates users by primary contact and password
//! with lockout, and runs the lifecycle of opaque tokens (CSRF, password
//! reset, magic login, contact confirmation).
//!
//! ## Components
//!
//! - [`jwt`] - algorithm table, token decoding, signing and the
//!   [`JwtValidator`](jwt::JwtValidator)
//! - [`signing_material`] - managed keys and the
//!   [`SigningMaterialRegistry`](signing_material::SigningMaterialRegistry)
//! - [`credentials`] - bcrypt hashing and the
//!   [`CredentialAuthenticator`](credentials::CredentialAuthenticator)
//! - [`tokens`] - the [`TokenService`](tokens::TokenService)
//! - [`repository`] - persistence traits implemented by the embedding service
//! - [`audit`], [`config`], [`telemetry`], [`clock`] - ambient plumbing
//!
//! ## Validating a token
//!
//! ```rust
//! use warden_auth::jwt::{Algorithm, HmacSigner, JwtValidatorOptions, StandardClaims, encode_jwt};
//!
//! let signer = HmacSigner::new(Algorithm::HS256, b"shared secret").unwrap();
//! let token = encode_jwt(&signer, &StandardClaims {
//!     subject: Some("user-1".to_string()),
//!     ..Default::default()
//! }).unwrap();
//!
//! let validator = JwtValidatorOptions::new([Algorithm::HS256])
//!     .with_hmac_secret("shared secret")
//!     .require_subject(true)
//!     .build()
//!     .unwrap();
//! let verified = validator.validate(&token).unwrap();
//! assert_eq!(verified.claims.subject.as_deref(), Some("user-1"));
//! ```
//!
//! ## Concurrency
//!
//! The validator and registry are immutable after construction and can be
//! shared freely. The authenticator and token service hold no locks; per-user
//! and per-token atomicity is the repository's responsibility.

pub mod audit;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod models;
pub mod repository;
pub mod signing_material;
pub mod telemetry;
pub mod tokens;

pub use audit::{AuditLogger, AuthEvent};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{AuthConfig, JwtConfig, LockoutPolicy, LoggingConfig, TokenLifetimes};
pub use credentials::CredentialAuthenticator;
pub use error::{AuthError, AuthResult, ErrorCategory, ValidationError, ValidationReport};
pub use jwt::{Algorithm, AlgorithmFamily, JwtValidator, JwtValidatorOptions, ValidatedJwt};
pub use models::{AuditData, Contact, ContactType, Token, TokenType, User};
pub use repository::{SigningMaterialRepository, TokenRepository, UserRepository};
pub use signing_material::{JwtSigningMaterial, SigningMaterialRegistry};
pub use telemetry::init_logging;
pub use tokens::TokenService;
