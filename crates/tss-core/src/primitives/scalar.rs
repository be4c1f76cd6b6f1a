//! Scalars modulo the secp256k1 group order

use crate::{Error, Result};
use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce, Field, PrimeField},
    FieldBytes,
};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};
use zeroize::Zeroize;

/// Width of a canonical scalar encoding
pub const SCALAR_LENGTH: usize = 32;

/// An integer modulo the curve order `n`
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Scalar(pub(crate) k256::Scalar);

impl Scalar {
    pub const ZERO: Self = Self(k256::Scalar::ZERO);
    pub const ONE: Self = Self(k256::Scalar::ONE);

    /// Parse a canonical big-endian encoding, rejecting values `>= n`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let repr = field_bytes(bytes)?;
        Option::<k256::Scalar>::from(k256::Scalar::from_repr(repr))
            .map(Self)
            .ok_or_else(|| Error::ParseError("scalar is not below the curve order".into()))
    }

    /// Parse a 32-byte big-endian value and reduce it modulo `n`.
    pub fn parse_reduced(bytes: &[u8]) -> Result<Self> {
        let repr = field_bytes(bytes)?;
        Ok(Self(<k256::Scalar as Reduce<U256>>::reduce_bytes(&repr)))
    }

    /// Reduce a 32-byte digest into the scalar field
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(<k256::Scalar as Reduce<U256>>::reduce_bytes(
            FieldBytes::from_slice(digest),
        ))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(k256::Scalar::from(value))
    }

    /// Sample a uniformly random scalar
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(<k256::Scalar as Field>::random(rng))
    }

    pub fn invert(&self) -> Option<Self> {
        Option::<k256::Scalar>::from(self.0.invert()).map(Self)
    }

    pub fn is_zero(&self) -> bool {
        bool::from(self.0.is_zero())
    }

    pub fn to_bytes(&self) -> [u8; SCALAR_LENGTH] {
        let mut out = [0u8; SCALAR_LENGTH];
        out.copy_from_slice(&self.0.to_bytes());
        out
    }
}

fn field_bytes(bytes: &[u8]) -> Result<FieldBytes> {
    if bytes.len() != SCALAR_LENGTH {
        return Err(Error::InvalidLength {
            expected: SCALAR_LENGTH,
            actual: bytes.len(),
        });
    }
    Ok(*FieldBytes::from_slice(bytes))
}

impl Default for Scalar {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for Scalar {
    type Output = Scalar;

    fn add(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 + rhs.0)
    }
}

impl Sub for Scalar {
    type Output = Scalar;

    fn sub(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 - rhs.0)
    }
}

impl Mul for Scalar {
    type Output = Scalar;

    fn mul(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 * rhs.0)
    }
}

impl Neg for Scalar {
    type Output = Scalar;

    fn neg(self) -> Scalar {
        Scalar(-self.0)
    }
}

impl Sum for Scalar {
    fn sum<I: Iterator<Item = Scalar>>(iter: I) -> Scalar {
        iter.fold(Scalar::ZERO, |acc, s| acc + s)
    }
}

impl<'a> Sum<&'a Scalar> for Scalar {
    fn sum<I: Iterator<Item = &'a Scalar>>(iter: I) -> Scalar {
        iter.fold(Scalar::ZERO, |acc, s| acc + *s)
    }
}

impl Zeroize for Scalar {
    fn zeroize(&mut self) {
        self.0 = k256::Scalar::ZERO;
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

impl Serialize for Scalar {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(serde::de::Error::custom)?;
        Scalar::parse(&bytes).map_err(serde::de::Error::custom)
    }
}
