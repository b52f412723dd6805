//! Password credentials
//!
//! - `password` - bcrypt hashing off the async runtime
//! - `authenticator` - login state machine, password reset and magic login

pub mod authenticator;
pub mod password;

pub use authenticator::CredentialAuthenticator;
pub use password::{DEFAULT_COST, hash_password, verify_password};
