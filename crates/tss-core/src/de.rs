//! One-time nonce key pairs ("DE")
//!
//! A member pre-submits the public halves `{D, E}`; the private halves stay
//! on the member's machine until a signing consumes the pair.

use crate::primitives::{Point, Scalar};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Public half of a DE pair, as stored in the on-chain queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct De {
    pub pub_d: Point,
    pub pub_e: Point,
}

impl De {
    /// Both halves must be real points
    pub fn validate(&self) -> crate::Result<()> {
        if self.pub_d.is_identity() || self.pub_e.is_identity() {
            return Err(crate::Error::ParseError("DE contains the identity point".into()));
        }
        Ok(())
    }
}

/// Private half of a DE pair
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct DePrivate {
    pub d: Scalar,
    pub e: Scalar,
}

impl DePrivate {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            d: Scalar::random(rng),
            e: Scalar::random(rng),
        }
    }

    pub fn public(&self) -> De {
        De {
            pub_d: Point::mul_base(&self.d),
            pub_e: Point::mul_base(&self.e),
        }
    }
}

/// Generate `count` fresh pairs, returning private halves alongside the
/// public halves in the same order
pub fn generate_des<R: RngCore + CryptoRng>(count: usize, rng: &mut R) -> (Vec<DePrivate>, Vec<De>) {
    let privates: Vec<DePrivate> = (0..count).map(|_| DePrivate::random(rng)).collect();
    let publics = privates.iter().map(DePrivate::public).collect();
    (privates, publics)
}
