//! Field and curve primitives
//!
//! - [`Scalar`] / [`Point`]: secp256k1 values with fixed-width encodings
//! - byte-level sums and Shamir polynomial evaluation
//! - ECDH (`KeySym` / `NonceSym`), hashing, Schnorr signatures

mod ecdh;
mod hash;
mod nonce;
mod point;
mod polynomial;
mod scalar;
pub mod schnorr;

pub use ecdh::{compute_key_sym, compute_nonce_sym};
pub use hash::{hash_to_scalar, keccak256};
pub use nonce::derive_nonce;
pub use point::{Point, IDENTITY_ENCODING, POINT_LENGTH};
pub use polynomial::{solve_point_polynomial, solve_scalar_polynomial, sum_points, sum_scalars};
pub use scalar::{Scalar, SCALAR_LENGTH};
pub use schnorr::{Signature, SIGNATURE_LENGTH};

/// Parse a 32-byte scalar
pub fn parse_scalar(bytes: &[u8]) -> crate::Result<Scalar> {
    Scalar::parse(bytes)
}

/// Parse a 33-byte compressed point
pub fn parse_point(bytes: &[u8]) -> crate::Result<Point> {
    Point::parse(bytes)
}
