//! Signing material and its registry
//!
//! A [`JwtSigningMaterial`] is a managed key record. Its `key_id` and
//! algorithm family are fixed at creation; afterwards it may only be disabled,
//! re-enabled, or have its expiration rotated.
//!
//! The [`SigningMaterialRegistry`] owns a snapshot of material and answers
//! "which keys may be used now". It is immutable once built; rotating keys
//! means loading a new registry.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::jwt::{Algorithm, AlgorithmFamily, HmacSigner, Signer};
use crate::models::AuditData;
use crate::repository::SigningMaterialRepository;

/// Managed key record
#[derive(Clone)]
pub struct JwtSigningMaterial {
    id: String,
    key_id: String,
    algorithm_family: AlgorithmFamily,
    hmac_secret: Option<SecretString>,
    expiration: Option<DateTime<Utc>>,
    disabled: bool,
    audit: AuditData,
}

// Manual Debug impl so the secret never reaches logs
impl fmt::Debug for JwtSigningMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSigningMaterial")
            .field("id", &self.id)
            .field("key_id", &self.key_id)
            .field("algorithm_family", &self.algorithm_family)
            .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .field("disabled", &self.disabled)
            .field("audit", &self.audit)
            .finish()
    }
}

impl JwtSigningMaterial {
    /// Create HMAC material with a freshly generated key id
    ///
    /// The storage id is left empty; the repository assigns it when the
    /// record is first persisted, and [`JwtSigningMaterial::restore`] carries
    /// it from then on.
    pub fn new_hmac(
        secret: impl Into<String>,
        expiration: Option<DateTime<Utc>>,
        created_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            key_id: Uuid::new_v4().to_string(),
            algorithm_family: AlgorithmFamily::Hmac,
            hmac_secret: Some(SecretString::new(secret.into())),
            expiration,
            disabled: false,
            audit: AuditData::created(created_by, now),
        }
    }

    /// Rehydrate a stored record
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] unless an HMAC secret is present
    /// exactly when the family is HMAC.
    pub fn restore(
        id: impl Into<String>,
        key_id: impl Into<String>,
        algorithm_family: AlgorithmFamily,
        hmac_secret: Option<SecretString>,
        expiration: Option<DateTime<Utc>>,
        disabled: bool,
        audit: AuditData,
    ) -> AuthResult<Self> {
        let key_id = key_id.into();
        let is_hmac = algorithm_family == AlgorithmFamily::Hmac;
        if is_hmac != hmac_secret.is_some() {
            return Err(AuthError::Configuration(format!(
                "signing material {key_id}: HMAC secret must be present iff family is hmac (family {algorithm_family})"
            )));
        }

        Ok(Self {
            id: id.into(),
            key_id,
            algorithm_family,
            hmac_secret,
            expiration,
            disabled,
            audit,
        })
    }

    /// Storage id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Public key identifier (`kid`)
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Algorithm family
    pub fn algorithm_family(&self) -> AlgorithmFamily {
        self.algorithm_family
    }

    /// Expiration, if any
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    /// Whether an administrator disabled this material
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Creation and modification metadata
    pub fn audit(&self) -> &AuditData {
        &self.audit
    }

    /// Expiration is set and lies before `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| exp < now)
    }

    /// Usable at `now`: not disabled and not expired
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.disabled && !self.is_expired(now)
    }

    /// Disable the material
    pub fn disable(&mut self, by: impl Into<String>, now: DateTime<Utc>) {
        self.disabled = true;
        self.audit.touch(by, now);
    }

    /// Re-enable the material
    pub fn enable(&mut self, by: impl Into<String>, now: DateTime<Utc>) {
        self.disabled = false;
        self.audit.touch(by, now);
    }

    /// Rotate the expiration
    pub fn set_expiration(
        &mut self,
        expiration: Option<DateTime<Utc>>,
        by: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.expiration = expiration;
        self.audit.touch(by, now);
    }

    /// Build a signer for `algorithm` bound to this material's secret
    ///
    /// # Errors
    ///
    /// - [`AuthError::AlgorithmTypeNotSupported`] if the material is not HMAC,
    ///   or `algorithm` belongs to a different family
    /// - [`AuthError::Configuration`] if HMAC material has no secret
    pub fn to_signer(&self, algorithm: Algorithm) -> AuthResult<Box<dyn Signer>> {
        match self.algorithm_family {
            AlgorithmFamily::Hmac if algorithm.is_hmac() => {
                let secret = self.hmac_secret.as_ref().ok_or_else(|| {
                    AuthError::Configuration(format!(
                        "signing material {} has no HMAC secret",
                        self.key_id
                    ))
                })?;
                let signer = HmacSigner::new(algorithm, secret.expose_secret().as_bytes())?
                    .with_key_id(self.key_id.clone());
                Ok(Box::new(signer))
            }
            AlgorithmFamily::Hmac => Err(AuthError::AlgorithmTypeNotSupported {
                key_id: self.key_id.clone(),
                family: algorithm.family().to_string(),
            }),
            family => Err(AuthError::AlgorithmTypeNotSupported {
                key_id: self.key_id.clone(),
                family: family.to_string(),
            }),
        }
    }
}

/// Immutable snapshot of signing material
#[derive(Debug, Clone, Default)]
pub struct SigningMaterialRegistry {
    materials: Vec<JwtSigningMaterial>,
}

impl SigningMaterialRegistry {
    /// Registry over `materials`
    pub fn new(materials: Vec<JwtSigningMaterial>) -> Self {
        Self { materials }
    }

    /// Load the valid material of `family` through the repository
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NoJwtSigningMaterialFound`] when nothing valid
    /// exists: no token could be signed or verified, so callers treat this as
    /// a fatal startup condition.
    pub async fn load(
        repository: &dyn SigningMaterialRepository,
        family: AlgorithmFamily,
        now: DateTime<Utc>,
    ) -> AuthResult<Self> {
        let materials: Vec<_> = repository
            .get_valid_by_algorithm_family(family)
            .await?
            .into_iter()
            .filter(|m| m.algorithm_family == family && m.is_valid(now))
            .collect();

        if materials.is_empty() {
            error!(family = %family, "No valid JWT signing material found");
            return Err(AuthError::NoJwtSigningMaterialFound {
                query: format!("family={family}"),
            });
        }

        info!(family = %family, count = materials.len(), "Loaded JWT signing material");
        Ok(Self::new(materials))
    }

    /// All material, valid or not
    pub fn materials(&self) -> &[JwtSigningMaterial] {
        &self.materials
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether the registry holds no records
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Material by key id regardless of validity
    pub fn find(&self, key_id: &str) -> Option<&JwtSigningMaterial> {
        self.materials.iter().find(|m| m.key_id == key_id)
    }

    /// Material by key id if it is valid at `now`
    pub fn find_valid(&self, key_id: &str, now: DateTime<Utc>) -> Option<&JwtSigningMaterial> {
        let material = self.find(key_id)?;
        if material.is_valid(now) {
            Some(material)
        } else {
            debug!(key_id, disabled = material.disabled, "Signing material not valid");
            None
        }
    }

    /// Every material of `family` valid at `now`
    pub fn valid_for_family(
        &self,
        family: AlgorithmFamily,
        now: DateTime<Utc>,
    ) -> Vec<&JwtSigningMaterial> {
        self.materials
            .iter()
            .filter(|m| m.algorithm_family == family && m.is_valid(now))
            .collect()
    }

    /// Like [`valid_for_family`](Self::valid_for_family), failing when empty
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NoJwtSigningMaterialFound`] if nothing is valid.
    pub fn require_valid_for_family(
        &self,
        family: AlgorithmFamily,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<&JwtSigningMaterial>> {
        let valid = self.valid_for_family(family, now);
        if valid.is_empty() {
            return Err(AuthError::NoJwtSigningMaterialFound {
                query: format!("family={family}"),
            });
        }
        Ok(valid)
    }

    /// Signer over the most recently created valid material for `algorithm`
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoJwtSigningMaterialFound`] if nothing of the
    ///   algorithm's family is valid
    /// - see [`JwtSigningMaterial::to_signer`]
    pub fn signer_for_family(&self, algorithm: Algorithm, now: DateTime<Utc>) -> AuthResult<Box<dyn Signer>> {
        let newest = self
            .require_valid_for_family(algorithm.family(), now)?
            .into_iter()
            .max_by_key(|m| m.audit.created_on)
            .ok_or_else(|| AuthError::NoJwtSigningMaterialFound {
                query: format!("algorithm={algorithm}"),
            })?;
        newest.to_signer(algorithm)
    }
}
