//! Cache Identity Module
//!
//! Caller-supplied description of "what content is this", joined positionally
//! into the leading part of a cache key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Delimiter placed between identity parts, freshness token and fingerprint.
pub const KEY_DELIMITER: &str = "-";

// == Scalar ==
/// A single identity component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn validate(&self) -> Result<()> {
        match self {
            Scalar::Text(text) if text.is_empty() => Err(CacheError::KeyDerivation(
                "identity contains an empty string".to_string(),
            )),
            Scalar::Float(value) if !value.is_finite() => Err(CacheError::KeyDerivation(
                format!("identity contains a non-finite number: {}", value),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(value) => write!(f, "{}", value),
            Scalar::Float(value) => write!(f, "{}", value),
            Scalar::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value.into())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

// == Cache Identity ==
/// A scalar or an ordered sequence of scalars. Order is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheIdentity {
    One(Scalar),
    Many(Vec<Scalar>),
}

impl CacheIdentity {
    /// Rejects empty identities, empty string parts and non-finite numbers.
    pub fn validate(&self) -> Result<()> {
        match self {
            CacheIdentity::One(scalar) => scalar.validate(),
            CacheIdentity::Many(parts) if parts.is_empty() => Err(CacheError::KeyDerivation(
                "identity sequence is empty".to_string(),
            )),
            CacheIdentity::Many(parts) => parts.iter().try_for_each(Scalar::validate),
        }
    }

    /// Joins the identity parts with [`KEY_DELIMITER`].
    pub fn partial_key(&self) -> Result<String> {
        self.validate()?;
        Ok(match self {
            CacheIdentity::One(scalar) => scalar.to_string(),
            CacheIdentity::Many(parts) => parts
                .iter()
                .map(Scalar::to_string)
                .collect::<Vec<_>>()
                .join(KEY_DELIMITER),
        })
    }
}

impl From<Scalar> for CacheIdentity {
    fn from(value: Scalar) -> Self {
        CacheIdentity::One(value)
    }
}

macro_rules! identity_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CacheIdentity {
                fn from(value: $ty) -> Self {
                    CacheIdentity::One(value.into())
                }
            }
        )*
    };
}

identity_from_scalar!(&str, String, i64, i32, f64);

impl From<Vec<Scalar>> for CacheIdentity {
    fn from(parts: Vec<Scalar>) -> Self {
        CacheIdentity::Many(parts)
    }
}
