// bcrypt hashing on tokio's blocking pool

use crate::error::{AuthError, AuthResult};

/// Default bcrypt cost for newly stored passwords
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

/// Hash a password for the user identified by `user_id`
///
/// # Errors
///
/// Returns [`AuthError::PasswordHash`] if bcrypt rejects the cost or the
/// blocking task fails.
pub async fn hash_password(user_id: &str, password: &str, cost: u32) -> AuthResult<String> {
    let password = password.to_string();
    let owner = user_id.to_string();

    tokio::task::spawn_blocking(move || {
        bcrypt::hash(password, cost).map_err(|e| hash_error(&owner, e.to_string()))
    })
    .await
    .map_err(|e| hash_error(user_id, format!("task join error: {e}")))?
}

/// Compare a password against a stored bcrypt hash
///
/// `Ok(false)` is a mismatch. A hash that cannot be parsed is an error, not a
/// mismatch.
///
/// # Errors
///
/// Returns [`AuthError::PasswordHash`] for a malformed hash or a failed
/// blocking task.
pub async fn verify_password(user_id: &str, password: &str, hash: &str) -> AuthResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    let owner = user_id.to_string();

    tokio::task::spawn_blocking(move || {
        bcrypt::verify(password, &hash).map_err(|e| hash_error(&owner, e.to_string()))
    })
    .await
    .map_err(|e| hash_error(user_id, format!("task join error: {e}")))?
}

fn hash_error(user_id: &str, reason: String) -> AuthError {
    AuthError::PasswordHash {
        user_id: user_id.to_string(),
        reason,
    }
}
