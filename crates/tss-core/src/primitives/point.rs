//! Points on secp256k1 in compressed SEC1 form

use super::Scalar;
use crate::{Error, Result};
use k256::{
    elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint},
    AffinePoint, EncodedPoint, ProjectivePoint,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};

/// Width of a compressed point encoding
pub const POINT_LENGTH: usize = 33;

/// Canonical encoding of the point at infinity.
///
/// `x = 0` has no matching `y` on secp256k1, so this never collides with a
/// real point.
pub const IDENTITY_ENCODING: [u8; POINT_LENGTH] = {
    let mut bytes = [0u8; POINT_LENGTH];
    bytes[0] = 0x02;
    bytes
};

/// A curve point, possibly the identity
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Point(pub(crate) ProjectivePoint);

impl Point {
    pub const IDENTITY: Self = Self(ProjectivePoint::IDENTITY);
    pub const GENERATOR: Self = Self(ProjectivePoint::GENERATOR);

    /// Parse a 33-byte compressed encoding
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != POINT_LENGTH {
            return Err(Error::InvalidLength {
                expected: POINT_LENGTH,
                actual: bytes.len(),
            });
        }
        if bytes == IDENTITY_ENCODING {
            return Ok(Self::IDENTITY);
        }
        if bytes[0] != 0x02 && bytes[0] != 0x03 {
            return Err(Error::ParseError(format!(
                "invalid compressed point tag 0x{:02x}",
                bytes[0]
            )));
        }

        let encoded =
            EncodedPoint::from_bytes(bytes).map_err(|e| Error::ParseError(e.to_string()))?;
        let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or_else(|| Error::ParseError("point is not on the curve".into()))?;

        Ok(Self(ProjectivePoint::from(affine)))
    }

    /// `scalar * G`
    pub fn mul_base(scalar: &Scalar) -> Self {
        Self(ProjectivePoint::GENERATOR * scalar.0)
    }

    pub fn is_identity(&self) -> bool {
        self.0 == ProjectivePoint::IDENTITY
    }

    pub fn to_bytes(&self) -> [u8; POINT_LENGTH] {
        if self.is_identity() {
            return IDENTITY_ENCODING;
        }
        let encoded = self.0.to_affine().to_encoded_point(true);
        let mut out = [0u8; POINT_LENGTH];
        out.copy_from_slice(encoded.as_bytes());
        out
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point(self.0 + rhs.0)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point(self.0 - rhs.0)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point(-self.0)
    }
}

impl Mul<Scalar> for Point {
    type Output = Point;

    fn mul(self, rhs: Scalar) -> Point {
        Point(self.0 * rhs.0)
    }
}

impl Sum for Point {
    fn sum<I: Iterator<Item = Point>>(iter: I) -> Point {
        iter.fold(Point::IDENTITY, |acc, p| acc + p)
    }
}

impl<'a> Sum<&'a Point> for Point {
    fn sum<I: Iterator<Item = &'a Point>>(iter: I) -> Point {
        iter.fold(Point::IDENTITY, |acc, p| acc + *p)
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

impl Serialize for Point {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(serde::de::Error::custom)?;
        Point::parse(&bytes).map_err(serde::de::Error::custom)
    }
}
