//! Signature primitives
//!
//! Signatures are computed over the ASCII signing input
//! (`base64url(header).base64url(claims)`) and exchanged as unpadded base64url.
//! Verification recomputes the signature and compares the encoded forms in
//! constant time.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ring::hmac;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use super::algorithm::{Algorithm, SignatureScheme};
use super::{Header, StandardClaims, encode_segment};
use crate::error::{AuthError, AuthResult};

/// Produces and checks signatures for one algorithm and key
pub trait Signer: Send + Sync + fmt::Debug {
    /// Algorithm written to the `alg` header
    fn algorithm(&self) -> Algorithm;

    /// Key id written to the `kid` header
    fn key_id(&self) -> Option<&str>;

    /// Unpadded base64url signature of `signing_input`
    fn sign(&self, signing_input: &str) -> String;

    /// Whether `signature` is the signature of `signing_input`
    fn verify(&self, signing_input: &str, signature: &str) -> bool {
        constant_time_eq(&self.sign(signing_input), signature)
    }
}

/// Compare two encoded signatures without early exit
pub fn constant_time_eq(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// HMAC-SHA2 signer bound to one shared secret
pub struct HmacSigner {
    algorithm: Algorithm,
    key_id: Option<String>,
    key: hmac::Key,
}

// Manual Debug impl so the key never reaches logs
impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSigner")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl HmacSigner {
    /// Build a signer for an HMAC algorithm
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AlgorithmNotImplemented`] if `algorithm` is not
    /// HS256, HS384 or HS512.
    pub fn new(algorithm: Algorithm, secret: &[u8]) -> AuthResult<Self> {
        let SignatureScheme::Hmac(width) = algorithm.scheme() else {
            return Err(AuthError::AlgorithmNotImplemented {
                algorithm: algorithm.name().to_string(),
            });
        };

        Ok(Self {
            algorithm,
            key_id: None,
            key: hmac::Key::new(width.ring_algorithm(), secret),
        })
    }

    /// Build a signer from a managed secret
    ///
    /// # Errors
    ///
    /// See [`HmacSigner::new`].
    pub fn from_secret(algorithm: Algorithm, secret: &SecretString) -> AuthResult<Self> {
        Self::new(algorithm, secret.expose_secret().as_bytes())
    }

    /// Attach the key id of the signing material this signer was built from
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }
}

impl Signer for HmacSigner {
    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn sign(&self, signing_input: &str) -> String {
        let tag = hmac::sign(&self.key, signing_input.as_bytes());
        URL_SAFE_NO_PAD.encode(tag.as_ref())
    }
}

/// Encode and sign a compact JWT
///
/// The header carries the signer's algorithm, `typ: JWT`, and its key id when set.
///
/// # Errors
///
/// Returns [`AuthError::MalformedJwt`] if the claims cannot be serialized.
pub fn encode_jwt(signer: &dyn Signer, claims: &StandardClaims) -> AuthResult<String> {
    let mut header = Header::new(signer.algorithm());
    if let Some(kid) = signer.key_id() {
        header = header.with_key_id(kid);
    }

    let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(claims)?);
    let signature = signer.sign(&signing_input);
    Ok(format!("{signing_input}.{signature}"))
}
