//! JWT validation engine
//!
//! A [`JwtValidator`] is built once from [`JwtValidatorOptions`] and is then
//! immutable, so one instance can be shared across request handlers without
//! locking. It checks three independent things:
//!
//! - the header: the algorithm must be in the allow-list
//! - the claims: each registered claim is checked against its
//!   required/optional policy, and every defect is collected
//! - the signature: recomputed with the configured secret (or with signing
//!   material resolved from a [`SigningMaterialRegistry`]) and compared in
//!   constant time
//!
//! A bad signature is an expected outcome (`Ok(false)`), not an error. Only an
//! algorithm this engine cannot execute is an error.

use std::collections::HashSet;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::algorithm::{Algorithm, SignatureScheme};
use super::signer::{HmacSigner, Signer};
use super::{DecodedJwt, Header, StandardClaims, is_blank};
use crate::clock::{SharedClock, system_clock};
use crate::error::{AuthError, AuthResult, ValidationError, ValidationReport};
use crate::signing_material::SigningMaterialRegistry;

/// Validator configuration
#[derive(Clone, Default)]
pub struct JwtValidatorOptions {
    /// Algorithms accepted in the `alg` header
    pub allowed_algorithms: Vec<Algorithm>,
    /// Shared secret for HS* algorithms
    pub hmac_secret: Option<SecretString>,
    /// If set, a present `iss` must equal this value
    pub expected_issuer: Option<String>,
    /// `iss` must be present
    pub issuer_required: bool,
    /// `exp` must be present
    pub expire_required: bool,
    /// `iat` must be present
    pub issued_at_required: bool,
    /// `sub` must be present
    pub subject_required: bool,
    /// `jti` must be present
    pub jti_required: bool,
    /// Reserved: audience policy is not enforced yet
    pub expected_audience: Option<String>,
    /// Reserved: audience policy is not enforced yet
    pub audience_required: bool,
    /// Reserved: not-before policy is not enforced yet
    pub not_before_required: bool,
}

impl fmt::Debug for JwtValidatorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtValidatorOptions")
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "<redacted>"))
            .field("expected_issuer", &self.expected_issuer)
            .field("issuer_required", &self.issuer_required)
            .field("expire_required", &self.expire_required)
            .field("issued_at_required", &self.issued_at_required)
            .field("subject_required", &self.subject_required)
            .field("jti_required", &self.jti_required)
            .field("expected_audience", &self.expected_audience)
            .field("audience_required", &self.audience_required)
            .field("not_before_required", &self.not_before_required)
            .finish()
    }
}

impl JwtValidatorOptions {
    /// Options allowing `algorithms` with every claim optional
    pub fn new(algorithms: impl IntoIterator<Item = Algorithm>) -> Self {
        Self {
            allowed_algorithms: algorithms.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Set the HMAC secret
    pub fn with_hmac_secret(mut self, secret: impl Into<String>) -> Self {
        self.hmac_secret = Some(SecretString::new(secret.into()));
        self
    }

    /// Set the expected issuer
    pub fn with_expected_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    /// Require `iss`
    pub fn require_issuer(mut self, required: bool) -> Self {
        self.issuer_required = required;
        self
    }

    /// Require `exp`
    pub fn require_expiration(mut self, required: bool) -> Self {
        self.expire_required = required;
        self
    }

    /// Require `iat`
    pub fn require_issued_at(mut self, required: bool) -> Self {
        self.issued_at_required = required;
        self
    }

    /// Require `sub`
    pub fn require_subject(mut self, required: bool) -> Self {
        self.subject_required = required;
        self
    }

    /// Require `jti`
    pub fn require_jti(mut self, required: bool) -> Self {
        self.jti_required = required;
        self
    }

    /// Build the validator
    ///
    /// # Errors
    ///
    /// See [`JwtValidator::new`].
    pub fn build(self) -> AuthResult<JwtValidator> {
        JwtValidator::new(self)
    }
}

/// Token that passed header, claims and signature validation
#[derive(Debug, Clone)]
pub struct ValidatedJwt {
    /// Verified header
    pub header: Header,
    /// Verified claims
    pub claims: StandardClaims,
    /// Algorithm the signature was checked with
    pub algorithm: Algorithm,
    /// Key id of the signing material that verified the token, if any
    pub key_id: Option<String>,
}

/// Immutable JWT validator
pub struct JwtValidator {
    id: Uuid,
    allowed_algorithms: HashSet<Algorithm>,
    hmac_secret: Option<SecretString>,
    expected_issuer: Option<String>,
    issuer_required: bool,
    expire_required: bool,
    issued_at_required: bool,
    subject_required: bool,
    jti_required: bool,
    expected_audience: Option<String>,
    audience_required: bool,
    not_before_required: bool,
    clock: SharedClock,
}

// Manual Debug impl so the HMAC secret never reaches logs
impl fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtValidator")
            .field("id", &self.id)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "<redacted>"))
            .field("expected_issuer", &self.expected_issuer)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    /// Build a validator from options
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoAlgorithmSpecified`] if the allow-list is empty
    /// - [`AuthError::NoHmacSecretProvided`] if an HS* algorithm is allowed and
    ///   the secret is absent or empty
    pub fn new(options: JwtValidatorOptions) -> AuthResult<Self> {
        if options.allowed_algorithms.is_empty() {
            return Err(AuthError::NoAlgorithmSpecified);
        }

        let has_secret = options
            .hmac_secret
            .as_ref()
            .is_some_and(|s| !s.expose_secret().is_empty());
        if let Some(hmac) = options.allowed_algorithms.iter().find(|a| a.is_hmac())
            && !has_secret
        {
            return Err(AuthError::NoHmacSecretProvided {
                algorithm: hmac.name().to_string(),
            });
        }

        let validator = Self {
            id: Uuid::new_v4(),
            allowed_algorithms: options.allowed_algorithms.into_iter().collect(),
            hmac_secret: options.hmac_secret,
            expected_issuer: options.expected_issuer.filter(|i| !i.is_empty()),
            issuer_required: options.issuer_required,
            expire_required: options.expire_required,
            issued_at_required: options.issued_at_required,
            subject_required: options.subject_required,
            jti_required: options.jti_required,
            expected_audience: options.expected_audience,
            audience_required: options.audience_required,
            not_before_required: options.not_before_required,
            clock: system_clock(),
        };

        debug!(
            validator_id = %validator.id,
            allowed = ?validator.allowed_algorithms,
            "JWT validator created"
        );
        Ok(validator)
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Random id for log correlation
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether `algorithm` is in the allow-list
    pub fn is_allowed(&self, algorithm: Algorithm) -> bool {
        self.allowed_algorithms.contains(&algorithm)
    }

    /// Check the header against the algorithm allow-list
    pub fn validate_header(&self, header: &Header) -> ValidationReport {
        let mut report = ValidationReport::new();

        match header.algorithm() {
            Some(alg) if self.is_allowed(alg) => {}
            _ => {
                debug!(
                    validator_id = %self.id,
                    algorithm = %header.algorithm,
                    "JWT algorithm not allowed"
                );
                report.push(ValidationError::AlgorithmNotAllowed);
            }
        }

        report
    }

    /// Check every registered claim, collecting all defects
    pub fn validate_claims(&self, claims: &StandardClaims) -> ValidationReport {
        let now = self.clock.now();
        let mut report = ValidationReport::new();

        // iss
        if self.issuer_required && is_blank(&claims.issuer) {
            report.push(ValidationError::IssuerMissing);
        }
        if let (Some(expected), Some(issuer)) = (&self.expected_issuer, &claims.issuer)
            && !issuer.is_empty()
            && issuer != expected
        {
            report.push(ValidationError::IssuerInvalid);
        }

        // exp
        match claims.expiration_time {
            None if self.expire_required => report.push(ValidationError::ExpireMissing),
            Some(exp) if exp <= now => report.push(ValidationError::Expired),
            _ => {}
        }

        // iat
        match claims.issued_at {
            None if self.issued_at_required => report.push(ValidationError::IssuedAtMissing),
            Some(iat) if iat > now => report.push(ValidationError::IssuedAtInvalid),
            _ => {}
        }

        // sub
        if self.subject_required && is_blank(&claims.subject) {
            report.push(ValidationError::SubjectMissing);
        }

        // jti
        if self.jti_required && is_blank(&claims.jwt_id) {
            report.push(ValidationError::IdMissing);
        }

        self.check_audience(claims);
        self.check_not_before(claims);

        if !report.is_valid() {
            debug!(
                validator_id = %self.id,
                errors = ?report.errors(),
                "JWT claims invalid"
            );
        }
        report
    }

    // Policy hook: audience enforcement is undefined, so nothing is reported.
    fn check_audience(&self, claims: &StandardClaims) {
        if self.audience_required || self.expected_audience.is_some() {
            trace!(
                validator_id = %self.id,
                audience = ?claims.audience,
                "audience policy configured but not enforced"
            );
        }
    }

    // Policy hook: not-before enforcement is undefined, so nothing is reported.
    fn check_not_before(&self, claims: &StandardClaims) {
        if self.not_before_required {
            trace!(
                validator_id = %self.id,
                not_before = ?claims.not_before,
                "not-before policy configured but not enforced"
            );
        }
    }

    /// Recompute the signature of `signing_input` with the configured secret
    ///
    /// Returns `Ok(false)` when the signature does not match.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AlgorithmNotImplemented`] if `algorithm` is not HS256,
    ///   HS384 or HS512 (including `none`)
    /// - [`AuthError::NoHmacSecretProvided`] if no secret is configured
    pub fn validate_signature(
        &self,
        algorithm: Algorithm,
        signing_input: &str,
        signature: &str,
    ) -> AuthResult<bool> {
        let SignatureScheme::Hmac(_) = algorithm.scheme() else {
            warn!(
                validator_id = %self.id,
                algorithm = %algorithm,
                "JWT signature algorithm not implemented"
            );
            return Err(AuthError::AlgorithmNotImplemented {
                algorithm: algorithm.name().to_string(),
            });
        };

        let secret = self
            .hmac_secret
            .as_ref()
            .ok_or_else(|| AuthError::NoHmacSecretProvided {
                algorithm: algorithm.name().to_string(),
            })?;

        let signer = HmacSigner::from_secret(algorithm, secret)?;
        Ok(signer.verify(signing_input, signature))
    }

    /// Decode and fully validate a compact token with the configured secret
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedJwt`] if the token cannot be decoded
    /// - [`AuthError::TokenRejected`] listing every header, claim and
    ///   signature defect
    /// - [`AuthError::AlgorithmNotImplemented`] if an allowed algorithm
    ///   cannot be executed
    pub fn validate(&self, token: &str) -> AuthResult<ValidatedJwt> {
        let decoded = DecodedJwt::parse(token)?;
        let (mut report, algorithm) = self.validate_decoded(&decoded);

        let Some(algorithm) = algorithm else {
            return Err(AuthError::TokenRejected {
                errors: report.into(),
            });
        };

        if !self.validate_signature(algorithm, &decoded.signing_input, &decoded.signature)? {
            report.push(ValidationError::SignatureInvalid);
        }
        report.into_result()?;

        Ok(ValidatedJwt {
            key_id: decoded.header.key_id.clone(),
            header: decoded.header,
            claims: decoded.claims,
            algorithm,
        })
    }

    /// Decode and fully validate a compact token against managed signing material
    ///
    /// The verifying material is the one named by the `kid` header. Without a
    /// `kid`, every valid material of the algorithm's family is tried.
    ///
    /// # Errors
    ///
    /// As [`JwtValidator::validate`]; a `kid` naming unknown, disabled or
    /// expired material, or material of another algorithm family, is reported
    /// as [`ValidationError::SignatureInvalid`].
    pub fn validate_with_registry(
        &self,
        token: &str,
        registry: &SigningMaterialRegistry,
    ) -> AuthResult<ValidatedJwt> {
        let decoded = DecodedJwt::parse(token)?;
        let (mut report, algorithm) = self.validate_decoded(&decoded);

        let Some(algorithm) = algorithm else {
            return Err(AuthError::TokenRejected {
                errors: report.into(),
            });
        };

        if let SignatureScheme::Unsupported = algorithm.scheme() {
            return Err(AuthError::AlgorithmNotImplemented {
                algorithm: algorithm.name().to_string(),
            });
        }

        let now = self.clock.now();
        let candidates: Vec<_> = match decoded.header.key_id.as_deref() {
            Some(kid) => registry
                .find_valid(kid, now)
                .filter(|m| m.algorithm_family() == algorithm.family())
                .into_iter()
                .collect(),
            None => registry.valid_for_family(algorithm.family(), now),
        };

        let mut verified_by = None;
        for material in candidates {
            let signer = material.to_signer(algorithm)?;
            if signer.verify(&decoded.signing_input, &decoded.signature) {
                verified_by = Some(material.key_id().to_string());
                break;
            }
        }

        if verified_by.is_none() {
            warn!(
                validator_id = %self.id,
                key_id = ?decoded.header.key_id,
                algorithm = %algorithm,
                "JWT signature could not be verified with any valid signing material"
            );
            report.push(ValidationError::SignatureInvalid);
        }
        report.into_result()?;

        Ok(ValidatedJwt {
            header: decoded.header,
            claims: decoded.claims,
            algorithm,
            key_id: verified_by,
        })
    }

    // Header and claims checks; yields the algorithm only when it is allowed.
    fn validate_decoded(&self, decoded: &DecodedJwt) -> (ValidationReport, Option<Algorithm>) {
        let mut report = self.validate_header(&decoded.header);
        let algorithm = if report.is_valid() {
            decoded.header.algorithm()
        } else {
            None
        };
        report.merge(self.validate_claims(&decoded.claims));
        (report, algorithm)
    }
}
