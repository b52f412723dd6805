//! Login state machine integration tests
//!
//! Covers the ordered check sequence and the lockout transitions:
//! - each failure kind and the order in which they are reported
//! - counter growth on wrong passwords and lockout at the threshold
//! - lockout expiry and counter reset on success

mod common;

use chrono::Duration;
use common::{EMAIL, Harness, PASSWORD, confirmed_contact, user_with_password};
use pretty_assertions::assert_eq;
use warden_auth::error::AUTHENTICATION_FAILED_MESSAGE;
use warden_auth::{AuthError, Clock, ContactType, LockoutPolicy};

#[tokio::test]
async fn test_successful_login_without_prior_failures_does_not_persist() {
    let harness = Harness::with_alice().await;

    let user = harness.login(PASSWORD).await.expect("login");

    assert_eq!(user.id, "u1");
    assert_eq!(harness.users.update_count(), 0);
}

#[tokio::test]
async fn test_unknown_principal() {
    let harness = Harness::with_alice().await;

    let err = harness
        .authenticator
        .login_with_primary_contact(&ContactType::Email, "bob@example.com", PASSWORD)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AuthError::NoUserFound {
            principal: "bob@example.com".to_string(),
            principal_type: "email".to_string(),
        }
    );
    assert_eq!(err.public_message(), AUTHENTICATION_FAILED_MESSAGE);
}

#[tokio::test]
async fn test_contact_type_must_match() {
    let harness = Harness::with_alice().await;

    let err = harness
        .authenticator
        .login_with_primary_contact(&ContactType::Phone, EMAIL, PASSWORD)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "NoUserFound");
}

#[tokio::test]
async fn test_non_primary_contact_checked_before_lockout() {
    let harness = Harness::new();
    let now = harness.clock.now();
    let mut user = user_with_password("u1", PASSWORD, now).await;
    user.locked_out_until = Some(now + Duration::minutes(5));
    let mut contact = confirmed_contact("u1", now);
    contact.is_primary = false;
    harness.users.insert(user, contact);

    let err = harness.login(PASSWORD).await.unwrap_err();

    assert_eq!(err.code(), "LoginContactNotPrimary");
}

#[tokio::test]
async fn test_lockout_checked_before_confirmation() {
    let harness = Harness::new();
    let now = harness.clock.now();
    let mut user = user_with_password("u1", PASSWORD, now).await;
    user.locked_out_until = Some(now + Duration::minutes(5));
    let mut contact = confirmed_contact("u1", now);
    contact.confirmed_date = None;
    harness.users.insert(user, contact);

    let err = harness.login(PASSWORD).await.unwrap_err();

    assert_eq!(err.code(), "UserLockedOut");
}

#[tokio::test]
async fn test_unconfirmed_contact_checked_before_password() {
    let harness = Harness::new();
    let now = harness.clock.now();
    let user = user_with_password("u1", PASSWORD, now).await;
    let mut contact = confirmed_contact("u1", now);
    contact.confirmed_date = None;
    harness.users.insert(user, contact);

    let err = harness.login("wrong").await.unwrap_err();

    assert_eq!(
        err,
        AuthError::ContactNotConfirmed {
            contact_id: "contact-u1".to_string(),
            principal: EMAIL.to_string(),
            principal_type: "email".to_string(),
        }
    );
    // An unconfirmed contact never reaches the password check
    assert_eq!(harness.users.update_count(), 0);
}

#[tokio::test]
async fn test_wrong_password_increments_counter() {
    let harness = Harness::with_alice().await;

    let err = harness.login("wrong").await.unwrap_err();
    assert_eq!(
        err,
        AuthError::WrongPassword {
            user_id: "u1".to_string()
        }
    );

    let stored = harness.users.user("u1").unwrap();
    assert_eq!(stored.consecutive_failed_login_attempts, 1);
    assert_eq!(stored.locked_out_until, None);
    assert_eq!(harness.users.update_count(), 1);
}

#[tokio::test]
async fn test_tenth_failure_locks_out_for_fifteen_minutes() {
    // GIVEN: a user with nine consecutive failures
    let harness = Harness::with_alice().await;
    harness
        .users
        .edit_user("u1", |u| u.consecutive_failed_login_attempts = 9);
    let now = harness.clock.now();

    // WHEN: the tenth attempt fails
    let err = harness.login("wrong").await.unwrap_err();

    // THEN: the counter resets and the lockout window opens
    assert_eq!(err.code(), "LoginFailedWrongPassword");
    let stored = harness.users.user("u1").unwrap();
    assert_eq!(stored.consecutive_failed_login_attempts, 0);
    assert_eq!(stored.locked_out_until, Some(now + Duration::minutes(15)));

    // AND: even the correct password is refused while locked
    let err = harness.login(PASSWORD).await.unwrap_err();
    assert_eq!(
        err,
        AuthError::UserLockedOut {
            user_id: "u1".to_string(),
            locked_out_until: (now + Duration::minutes(15)).to_rfc3339(),
        }
    );

    // AND: locked attempts do not accumulate failures
    let updates = harness.users.update_count();
    let _ = harness.login("wrong").await.unwrap_err();
    assert_eq!(harness.users.update_count(), updates);
    assert_eq!(
        harness.users.user("u1").unwrap().consecutive_failed_login_attempts,
        0
    );

    // AND: one second before the window closes the user is still locked
    harness.clock.advance(Duration::minutes(15) - Duration::seconds(1));
    assert_eq!(
        harness.login(PASSWORD).await.unwrap_err().code(),
        "UserLockedOut"
    );

    // AND: once the window closes the correct password works again
    harness.clock.advance(Duration::seconds(1));
    let user = harness.login(PASSWORD).await.expect("login after lockout");
    assert_eq!(user.id, "u1");
}

#[tokio::test]
async fn test_success_after_failures_resets_counter_with_one_update() {
    let harness = Harness::with_alice().await;
    for _ in 0..3 {
        let _ = harness.login("wrong").await.unwrap_err();
    }
    assert_eq!(
        harness.users.user("u1").unwrap().consecutive_failed_login_attempts,
        3
    );
    let before = harness.users.update_count();

    let user = harness.login(PASSWORD).await.expect("login");

    assert_eq!(user.consecutive_failed_login_attempts, 0);
    assert_eq!(harness.users.update_count(), before + 1);
    assert_eq!(
        harness.users.user("u1").unwrap().consecutive_failed_login_attempts,
        0
    );
}

#[tokio::test]
async fn test_custom_policy_threshold() {
    let mut harness = Harness::with_alice().await;
    harness.authenticator = harness.authenticator.clone().with_policy(LockoutPolicy {
        max_consecutive_failures: 2,
        lockout_duration_secs: 60,
    });
    let now = harness.clock.now();

    let _ = harness.login("wrong").await.unwrap_err();
    let _ = harness.login("wrong").await.unwrap_err();

    let stored = harness.users.user("u1").unwrap();
    assert_eq!(stored.locked_out_until, Some(now + Duration::seconds(60)));
}

#[tokio::test]
async fn test_persistence_failure_still_reports_wrong_password() {
    let harness = Harness::with_alice().await;
    harness.users.set_fail_updates(true);

    let err = harness.login("wrong").await.unwrap_err();

    assert_eq!(err.code(), "LoginFailedWrongPassword");
}

#[tokio::test]
async fn test_malformed_stored_hash_is_not_a_wrong_password() {
    let harness = Harness::with_alice().await;
    harness
        .users
        .edit_user("u1", |u| u.password_hash = "plaintext".to_string());

    let err = harness.login(PASSWORD).await.unwrap_err();

    assert_eq!(err.code(), "BcryptPasswordHashError");
    assert_eq!(harness.users.update_count(), 0);
}
