//! JWT header and claim model, compact-form decoding, signing and validation
//!
//! # Modules
//!
//! - `algorithm` - algorithm lookup table (names, families, schemes)
//! - `signer` - HMAC signers and compact token encoding
//! - `validator` - header, claims and signature validation

pub mod algorithm;
pub mod signer;
pub mod validator;

pub use algorithm::{ALGORITHM_TABLE, Algorithm, AlgorithmFamily, HmacWidth, SignatureScheme};
pub use signer::{HmacSigner, Signer, encode_jwt};
pub use validator::{JwtValidator, JwtValidatorOptions, ValidatedJwt};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::error::{AuthError, AuthResult};

/// JOSE header
///
/// `alg` is kept as received so that an unknown or empty identifier reaches
/// header validation instead of failing the decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Algorithm (alg)
    #[serde(rename = "alg", default)]
    pub algorithm: String,

    /// Media type (typ)
    #[serde(rename = "typ", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Key ID (kid) naming the signing material
    #[serde(rename = "kid", skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

impl Header {
    /// Header for `algorithm` with `typ` set to `JWT`
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm: algorithm.name().to_string(),
            token_type: Some("JWT".to_string()),
            key_id: None,
        }
    }

    /// Attach a key id
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Recognized algorithm, if any
    pub fn algorithm(&self) -> Option<Algorithm> {
        if self.algorithm.is_empty() {
            return None;
        }
        Algorithm::from_name(&self.algorithm)
    }
}

/// Registered claims per RFC 7519 Section 4.1
///
/// Time claims are NumericDate seconds on the wire; fractional values are
/// accepted and truncated. `None` means the claim is absent, which is
/// distinct from a claim set to the epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardClaims {
    /// Issuer (iss)
    #[serde(rename = "iss", skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Subject (sub)
    #[serde(rename = "sub", skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Audience (aud), a single string or an array on the wire
    #[serde(
        rename = "aud",
        default,
        with = "audience",
        skip_serializing_if = "Option::is_none"
    )]
    pub audience: Option<Vec<String>>,

    /// Expiration time (exp)
    #[serde(
        rename = "exp",
        default,
        with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_time: Option<DateTime<Utc>>,

    /// Not before (nbf)
    #[serde(
        rename = "nbf",
        default,
        with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_before: Option<DateTime<Utc>>,

    /// Issued at (iat)
    #[serde(
        rename = "iat",
        default,
        with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub issued_at: Option<DateTime<Utc>>,

    /// JWT ID (jti)
    #[serde(rename = "jti", skip_serializing_if = "Option::is_none")]
    pub jwt_id: Option<String>,

    /// Private claims
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

// NumericDate: integer or fractional seconds since the epoch.
mod numeric_date {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => serializer.serialize_i64(time.timestamp()),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
            return Ok(None);
        };

        let seconds = match number.as_i64() {
            Some(seconds) => Some(seconds),
            None => number
                .as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64),
        };

        seconds
            .and_then(|s| DateTime::from_timestamp(s, 0))
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("NumericDate {number} is out of range")))
    }
}

// `aud` is either one string or an array of strings.
mod audience {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Vec<String>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value.as_deref() {
            Some([single]) => single.serialize(serializer),
            other => other.serialize(serializer),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<String>>, D::Error> {
        Ok(
            Option::<OneOrMany>::deserialize(deserializer)?.map(|aud| match aud {
                OneOrMany::One(single) => vec![single],
                OneOrMany::Many(many) => many,
            }),
        )
    }
}

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

/// A compact JWT split into its parts
#[derive(Debug, Clone)]
pub struct DecodedJwt {
    /// Decoded header
    pub header: Header,
    /// Decoded claims
    pub claims: StandardClaims,
    /// `base64url(header).base64url(claims)` exactly as received
    pub signing_input: String,
    /// Third segment, still base64url encoded
    pub signature: String,
}

impl DecodedJwt {
    /// Split and decode a compact three-segment token
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedJwt`] if the token does not have three
    /// segments or a segment is not valid base64url JSON.
    pub fn parse(token: &str) -> AuthResult<Self> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("token must have three dot-separated segments"));
        };

        let header: Header = decode_segment(header_b64, "header")?;
        let claims: StandardClaims = decode_segment(claims_b64, "claims")?;

        Ok(Self {
            header,
            claims,
            signing_input: format!("{header_b64}.{claims_b64}"),
            signature: signature.to_string(),
        })
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str, name: &str) -> AuthResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| malformed(&format!("invalid {name} encoding: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| malformed(&format!("invalid {name} JSON: {e}")))
}

fn malformed(reason: &str) -> AuthError {
    AuthError::MalformedJwt {
        reason: reason.to_string(),
    }
}

pub(crate) fn encode_segment<T: Serialize>(value: &T) -> AuthResult<String> {
    let json = serde_json::to_vec(value).map_err(|e| AuthError::MalformedJwt {
        reason: format!("failed to serialize segment: {e}"),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}
