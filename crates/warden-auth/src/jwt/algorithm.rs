//! JWT algorithm identifiers
//!
//! All dispatch on algorithm names (header validation, signature computation,
//! signer construction) goes through [`ALGORITHM_TABLE`]. Only the HMAC family
//! is executable; asymmetric families are recognized so that they can appear
//! in configuration and headers, and resolve to [`SignatureScheme::Unsupported`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AuthError;

/// Signing algorithm identifier (`alg` header, RFC 7518)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Algorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
    PS256,
    PS384,
    PS512,
    /// Unsecured JWT; never executable
    None,
}

/// Key material family an algorithm belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmFamily {
    /// Symmetric shared-secret signatures
    Hmac,
    /// RSA PKCS#1 and PSS signatures
    Rsa,
    /// Elliptic curve signatures
    Ecdsa,
    /// No signature
    None,
}

impl AlgorithmFamily {
    /// Lowercase family name
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmFamily::Hmac => "hmac",
            AlgorithmFamily::Rsa => "rsa",
            AlgorithmFamily::Ecdsa => "ecdsa",
            AlgorithmFamily::None => "none",
        }
    }
}

impl fmt::Display for AlgorithmFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digest width of an HMAC algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HmacWidth {
    Sha256,
    Sha384,
    Sha512,
}

impl HmacWidth {
    pub(crate) fn ring_algorithm(self) -> ring::hmac::Algorithm {
        match self {
            HmacWidth::Sha256 => ring::hmac::HMAC_SHA256,
            HmacWidth::Sha384 => ring::hmac::HMAC_SHA384,
            HmacWidth::Sha512 => ring::hmac::HMAC_SHA512,
        }
    }
}

/// How this engine executes an algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureScheme {
    /// Keyed digest with a shared secret
    Hmac(HmacWidth),
    /// Recognized but not executable here
    Unsupported,
}

/// One row of the algorithm lookup table
#[derive(Debug, Clone, Copy)]
pub struct AlgorithmEntry {
    pub algorithm: Algorithm,
    pub name: &'static str,
    pub family: AlgorithmFamily,
    pub scheme: SignatureScheme,
}

/// The single source of truth for algorithm names, families and schemes
pub const ALGORITHM_TABLE: &[AlgorithmEntry] = &[
    AlgorithmEntry {
        algorithm: Algorithm::HS256,
        name: "HS256",
        family: AlgorithmFamily::Hmac,
        scheme: SignatureScheme::Hmac(HmacWidth::Sha256),
    },
    AlgorithmEntry {
        algorithm: Algorithm::HS384,
        name: "HS384",
        family: AlgorithmFamily::Hmac,
        scheme: SignatureScheme::Hmac(HmacWidth::Sha384),
    },
    AlgorithmEntry {
        algorithm: Algorithm::HS512,
        name: "HS512",
        family: AlgorithmFamily::Hmac,
        scheme: SignatureScheme::Hmac(HmacWidth::Sha512),
    },
    AlgorithmEntry {
        algorithm: Algorithm::RS256,
        name: "RS256",
        family: AlgorithmFamily::Rsa,
        scheme: SignatureScheme::Unsupported,
    },
    AlgorithmEntry {
        algorithm: Algorithm::RS384,
        name: "RS384",
        family: AlgorithmFamily::Rsa,
        scheme: SignatureScheme::Unsupported,
    },
    AlgorithmEntry {
        algorithm: Algorithm::RS512,
        name: "RS512",
        family: AlgorithmFamily::Rsa,
        scheme: SignatureScheme::Unsupported,
    },
    AlgorithmEntry {
        algorithm: Algorithm::ES256,
        name: "ES256",
        family: AlgorithmFamily::Ecdsa,
        scheme: SignatureScheme::Unsupported,
    },
    AlgorithmEntry {
        algorithm: Algorithm::ES384,
        name: "ES384",
        family: AlgorithmFamily::Ecdsa,
        scheme: SignatureScheme::Unsupported,
    },
    AlgorithmEntry {
        algorithm: Algorithm::PS256,
        name: "PS256",
        family: AlgorithmFamily::Rsa,
        scheme: SignatureScheme::Unsupported,
    },
    AlgorithmEntry {
        algorithm: Algorithm::PS384,
        name: "PS384",
        family: AlgorithmFamily::Rsa,
        scheme: SignatureScheme::Unsupported,
    },
    AlgorithmEntry {
        algorithm: Algorithm::PS512,
        name: "PS512",
        family: AlgorithmFamily::Rsa,
        scheme: SignatureScheme::Unsupported,
    },
    AlgorithmEntry {
        algorithm: Algorithm::None,
        name: "none",
        family: AlgorithmFamily::None,
        scheme: SignatureScheme::Unsupported,
    },
];

impl Algorithm {
    fn entry(self) -> &'static AlgorithmEntry {
        ALGORITHM_TABLE
            .iter()
            .find(|entry| entry.algorithm == self)
            .unwrap_or_else(|| unreachable!("every Algorithm variant has a table row"))
    }

    /// Look up an algorithm by its registered `alg` name (case-sensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        ALGORITHM_TABLE
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.algorithm)
    }

    /// Registered `alg` name
    pub fn name(self) -> &'static str {
        self.entry().name
    }

    /// Key family
    pub fn family(self) -> AlgorithmFamily {
        self.entry().family
    }

    /// Execution scheme
    pub fn scheme(self) -> SignatureScheme {
        self.entry().scheme
    }

    /// True for HS256/HS384/HS512
    pub fn is_hmac(self) -> bool {
        self.family() == AlgorithmFamily::Hmac
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::from_name(s).ok_or_else(|| AuthError::AlgorithmNotImplemented {
            algorithm: s.to_string(),
        })
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Algorithm::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown JWT algorithm: {name}")))
    }
}
