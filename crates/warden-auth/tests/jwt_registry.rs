//! End-to-end JWT issuance and validation against managed signing material

mod common;

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Duration;
use common::MemoryMaterials;
use pretty_assertions::assert_eq;
use warden_auth::jwt::{
    Algorithm, AlgorithmFamily, HmacSigner, JwtValidator, JwtValidatorOptions, Signer,
    StandardClaims, encode_jwt,
};
use warden_auth::{
    AuditData, AuthError, Clock, JwtSigningMaterial, ManualClock, SigningMaterialRegistry,
    ValidationError,
};

fn validator(clock: &ManualClock) -> JwtValidator {
    JwtValidatorOptions::new([Algorithm::HS256, Algorithm::HS512])
        .with_hmac_secret("static fallback secret")
        .with_expected_issuer("warden")
        .require_expiration(true)
        .require_subject(true)
        .build()
        .expect("validator")
        .with_clock(Arc::new(clock.clone()))
}

fn claims(clock: &ManualClock) -> StandardClaims {
    StandardClaims {
        issuer: Some("warden".to_string()),
        subject: Some("user-1".to_string()),
        expiration_time: Some(clock.now() + Duration::minutes(5)),
        issued_at: Some(clock.now()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_load_sign_and_validate() {
    // GIVEN: a repository with one current and one disabled key
    let clock = ManualClock::starting_now();
    let repo = MemoryMaterials::default();
    let current = JwtSigningMaterial::new_hmac("current secret", None, "bootstrap", clock.now());
    let mut retired = JwtSigningMaterial::new_hmac("retired secret", None, "bootstrap", clock.now());
    retired.disable("admin", clock.now());
    repo.insert(current.clone());
    repo.insert(retired);

    let registry = SigningMaterialRegistry::load(&repo, AlgorithmFamily::Hmac, clock.now())
        .await
        .expect("registry");
    assert_eq!(registry.len(), 1);

    // WHEN: a token is signed with the registry's newest key
    let signer = registry
        .signer_for_family(Algorithm::HS256, clock.now())
        .unwrap();
    let token = encode_jwt(signer.as_ref(), &claims(&clock)).unwrap();

    // THEN: it validates against the registry and reports the key id
    let verified = validator(&clock)
        .validate_with_registry(&token, &registry)
        .expect("valid token");
    assert_eq!(verified.key_id.as_deref(), Some(current.key_id()));
    assert_eq!(verified.algorithm, Algorithm::HS256);
    assert_eq!(verified.claims.subject.as_deref(), Some("user-1"));
}

#[tokio::test]
async fn test_load_fails_without_valid_material() {
    let clock = ManualClock::starting_now();
    let repo = MemoryMaterials::default();
    repo.insert(JwtSigningMaterial::new_hmac(
        "old",
        Some(clock.now() - Duration::days(1)),
        "bootstrap",
        clock.now(),
    ));

    let err = SigningMaterialRegistry::load(&repo, AlgorithmFamily::Hmac, clock.now())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AuthError::NoJwtSigningMaterialFound {
            query: "family=hmac".to_string()
        }
    );
}

#[test]
fn test_token_signed_by_disabled_key_is_rejected() {
    let clock = ManualClock::starting_now();
    let mut material = JwtSigningMaterial::new_hmac("secret", None, "bootstrap", clock.now());
    let signer = material.to_signer(Algorithm::HS256).unwrap();
    let token = encode_jwt(signer.as_ref(), &claims(&clock)).unwrap();

    material.disable("admin", clock.now());
    let registry = SigningMaterialRegistry::new(vec![material]);

    let err = validator(&clock)
        .validate_with_registry(&token, &registry)
        .unwrap_err();
    assert_eq!(
        err,
        AuthError::TokenRejected {
            errors: vec![ValidationError::SignatureInvalid]
        }
    );
}

#[test]
fn test_token_without_kid_tries_every_valid_key() {
    let clock = ManualClock::starting_now();
    let first = JwtSigningMaterial::new_hmac("first", None, "bootstrap", clock.now());
    let second = JwtSigningMaterial::new_hmac("second", None, "bootstrap", clock.now());
    let registry = SigningMaterialRegistry::new(vec![first, second.clone()]);

    // Signed with the second key's secret but no kid header
    let signer = HmacSigner::new(Algorithm::HS512, b"second").unwrap();
    let token = encode_jwt(&signer, &claims(&clock)).unwrap();

    let verified = validator(&clock)
        .validate_with_registry(&token, &registry)
        .expect("valid token");
    assert_eq!(verified.key_id.as_deref(), Some(second.key_id()));
}

#[test]
fn test_every_defect_is_reported_together() {
    let clock = ManualClock::starting_now();
    let material = JwtSigningMaterial::new_hmac("secret", None, "bootstrap", clock.now());
    let registry = SigningMaterialRegistry::new(vec![material]);

    let forged = HmacSigner::new(Algorithm::HS256, b"attacker").unwrap();
    let token = encode_jwt(
        &forged,
        &StandardClaims {
            issuer: Some("mallory".to_string()),
            expiration_time: Some(clock.now() - Duration::seconds(1)),
            ..Default::default()
        },
    )
    .unwrap();

    let err = validator(&clock)
        .validate_with_registry(&token, &registry)
        .unwrap_err();
    assert_eq!(
        err,
        AuthError::TokenRejected {
            errors: vec![
                ValidationError::IssuerInvalid,
                ValidationError::Expired,
                ValidationError::SubjectMissing,
                ValidationError::SignatureInvalid,
            ]
        }
    );
}

#[test]
fn test_token_expires_with_the_clock() {
    let clock = ManualClock::starting_now();
    let signer = HmacSigner::new(Algorithm::HS256, b"static fallback secret").unwrap();
    let token = encode_jwt(&signer, &claims(&clock)).unwrap();
    let validator = validator(&clock);

    validator.validate(&token).expect("fresh token");

    clock.advance(Duration::minutes(5));
    let err = validator.validate(&token).unwrap_err();
    assert_eq!(
        err,
        AuthError::TokenRejected {
            errors: vec![ValidationError::Expired]
        }
    );
}

#[test]
fn test_disallowed_algorithm_skips_signature_check() {
    let clock = ManualClock::starting_now();
    let signer = HmacSigner::new(Algorithm::HS384, b"static fallback secret").unwrap();
    let token = encode_jwt(&signer, &claims(&clock)).unwrap();

    let err = validator(&clock).validate(&token).unwrap_err();
    assert_eq!(
        err,
        AuthError::TokenRejected {
            errors: vec![ValidationError::AlgorithmNotAllowed]
        }
    );
}

#[test]
fn test_unsigned_token_rejected() {
    let clock = ManualClock::starting_now();
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(br#"{"sub":"user-1"}"#);
    let token = format!("{header}.{body}.");

    // Not in the allow-list: rejected at the header
    let err = validator(&clock).validate(&token).unwrap_err();
    assert!(matches!(
        err,
        AuthError::TokenRejected { ref errors } if errors.contains(&ValidationError::AlgorithmNotAllowed)
    ));

    // Explicitly allowed: still cannot be executed
    let permissive = JwtValidatorOptions::new([Algorithm::None])
        .build()
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    let err = permissive.validate(&token).unwrap_err();
    assert_eq!(err.code(), "JWTAlgorithmNotImplemented");
}

#[test]
fn test_malformed_tokens() {
    let clock = ManualClock::starting_now();
    for token in ["", "abc", "a.b", "a.b.c.d", "!!!.e30.sig"] {
        let err = validator(&clock).validate(token).unwrap_err();
        assert_eq!(err.code(), "MalformedJWT", "token {token:?}");
    }
}

#[test]
fn test_kid_naming_material_of_another_family_is_a_bad_signature() {
    // GIVEN: a registry holding HMAC material and RSA material
    let clock = ManualClock::starting_now();
    let hmac = JwtSigningMaterial::new_hmac("secret", None, "bootstrap", clock.now());
    let rsa = JwtSigningMaterial::restore(
        "2",
        "rsa-kid",
        AlgorithmFamily::Rsa,
        None,
        None,
        false,
        AuditData::created("bootstrap", clock.now()),
    )
    .unwrap();
    let registry = SigningMaterialRegistry::new(vec![hmac, rsa]);

    // WHEN: an expired HS256 token points its kid at the RSA material
    let signer = HmacSigner::new(Algorithm::HS256, b"secret")
        .unwrap()
        .with_key_id("rsa-kid");
    let mut expired = claims(&clock);
    expired.expiration_time = Some(clock.now() - Duration::seconds(1));
    let token = encode_jwt(&signer, &expired).unwrap();

    // THEN: the token is rejected with every defect, not a configuration error
    let err = validator(&clock)
        .validate_with_registry(&token, &registry)
        .unwrap_err();
    assert_eq!(
        err,
        AuthError::TokenRejected {
            errors: vec![ValidationError::Expired, ValidationError::SignatureInvalid]
        }
    );
}

#[test]
fn test_array_audience_and_fractional_dates_validate() {
    let clock = ManualClock::starting_now();
    let material = JwtSigningMaterial::new_hmac("secret", None, "bootstrap", clock.now());
    let signer = material.to_signer(Algorithm::HS256).unwrap();
    let registry = SigningMaterialRegistry::new(vec![material]);

    let header = URL_SAFE_NO_PAD.encode(
        serde_json::json!({"alg": "HS256", "typ": "JWT", "kid": signer.key_id()}).to_string(),
    );
    let body = URL_SAFE_NO_PAD.encode(
        format!(
            r#"{{"iss":"warden","sub":"user-1","aud":["a","b"],"exp":{}.5}}"#,
            (clock.now() + Duration::minutes(1)).timestamp()
        )
        .as_bytes(),
    );
    let signing_input = format!("{header}.{body}");
    let token = format!("{signing_input}.{}", signer.sign(&signing_input));

    let verified = validator(&clock)
        .validate_with_registry(&token, &registry)
        .expect("valid token");
    assert_eq!(
        verified.claims.audience,
        Some(vec!["a".to_string(), "b".to_string()])
    );
    assert_eq!(
        verified.claims.expiration_time.map(|t| t.timestamp()),
        Some((clock.now() + Duration::minutes(1)).timestamp())
    );
}
