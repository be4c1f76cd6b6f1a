//! Elliptic-curve Diffie-Hellman helpers

use super::{Point, Scalar};

/// Shared key between two one-time key pairs.
///
/// `compute_key_sym(sk_i, pk_j) == compute_key_sym(sk_j, pk_i)`.
pub fn compute_key_sym(private_key: &Scalar, other_pub_key: &Point) -> Point {
    *other_pub_key * *private_key
}

/// Nonce point `nonce * pub_key`, used for the second commitment of DLEQ proofs.
///
/// Callers compare the canonical compressed encoding, whose parity byte is
/// derived from `y`, so prover and verifier agree on the exact bytes.
pub fn compute_nonce_sym(nonce: &Scalar, pub_key: &Point) -> Point {
    *pub_key * *nonce
}
