//! Schnorr signatures over secp256k1
//!
//! A signature is `(R, z)` with `z*G == R + c*P`, where the challenge `c`
//! hashes a domain tag, `R`, `P` and the signed data. The same shape is used
//! for DKG proofs of knowledge and for the final threshold signature.

use super::{hash_to_scalar, Point, Scalar, POINT_LENGTH, SCALAR_LENGTH};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Width of an encoded signature (`R || z`)
pub const SIGNATURE_LENGTH: usize = POINT_LENGTH + SCALAR_LENGTH;

/// Schnorr signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Nonce commitment
    pub r: Point,
    /// Response
    pub z: Scalar,
}

impl Signature {
    pub fn new(r: Point, z: Scalar) -> Self {
        Self { r, z }
    }

    /// Parse `R || z`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(Error::InvalidLength {
                expected: SIGNATURE_LENGTH,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            r: Point::parse(&bytes[..POINT_LENGTH])?,
            z: Scalar::parse(&bytes[POINT_LENGTH..])?,
        })
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        let mut out = [0u8; SIGNATURE_LENGTH];
        out[..POINT_LENGTH].copy_from_slice(&self.r.to_bytes());
        out[POINT_LENGTH..].copy_from_slice(&self.z.to_bytes());
        out
    }
}

/// Challenge `c = H(tag, R, P, data...)`
pub fn challenge(tag: &str, r: &Point, pub_key: &Point, data: &[&[u8]]) -> Scalar {
    let r_bytes = r.to_bytes();
    let p_bytes = pub_key.to_bytes();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(data.len() + 2);
    parts.push(&r_bytes);
    parts.push(&p_bytes);
    parts.extend_from_slice(data);
    hash_to_scalar(tag, &parts)
}

/// Sign `data` under `tag` with a caller-supplied nonce
pub fn sign(tag: &str, private_key: &Scalar, nonce: &Scalar, data: &[&[u8]]) -> Result<Signature> {
    if nonce.is_zero() {
        return Err(Error::Crypto("zero signing nonce".into()));
    }
    let r = Point::mul_base(nonce);
    let pub_key = Point::mul_base(private_key);
    let c = challenge(tag, &r, &pub_key, data);
    Ok(Signature::new(r, *nonce + c * *private_key))
}

/// Verify a signature produced by [`sign`]
pub fn verify(tag: &str, pub_key: &Point, signature: &Signature, data: &[&[u8]]) -> Result<()> {
    if signature.r.is_identity() || pub_key.is_identity() {
        return Err(Error::VerificationFailed("identity nonce or key".into()));
    }
    let c = challenge(tag, &signature.r, pub_key, data);
    if Point::mul_base(&signature.z) != signature.r + *pub_key * c {
        return Err(Error::VerificationFailed(format!(
            "{tag} signature does not verify"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_sign_verify() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let sk = Scalar::random(&mut rng);
        let pk = Point::mul_base(&sk);
        let k = Scalar::random(&mut rng);

        let sig = sign("test", &sk, &k, &[b"hello"]).unwrap();
        assert!(verify("test", &pk, &sig, &[b"hello"]).is_ok());
        assert!(verify("test", &pk, &sig, &[b"hellO"]).is_err());
        assert!(verify("other", &pk, &sig, &[b"hello"]).is_err());

        let wrong = Point::mul_base(&Scalar::random(&mut rng));
        assert!(verify("test", &wrong, &sig, &[b"hello"]).is_err());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let sig = Signature::new(Point::GENERATOR, Scalar::from_u64(5));
        let bytes = sig.to_bytes();
        assert_eq!(Signature::parse(&bytes).unwrap(), sig);
        assert!(matches!(
            Signature::parse(&bytes[..64]),
            Err(Error::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_zero_nonce_rejected() {
        assert!(sign("test", &Scalar::ONE, &Scalar::ZERO, &[]).is_err());
    }
}
