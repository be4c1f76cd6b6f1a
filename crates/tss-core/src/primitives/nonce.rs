//! Hedged nonce derivation for proofs and signatures

use super::Scalar;
use crate::{Error, Result};
use hmac::{Hmac, Mac};
use rand_core::{CryptoRng, RngCore};
use sha2::Sha256;

/// Derive a nonzero nonce from a secret, the signed data and fresh randomness.
///
/// The nonce is `HMAC-SHA256(secret, aux || counter || data...)`, so a weak
/// RNG alone cannot repeat a nonce for different messages.
pub fn derive_nonce<R: RngCore + CryptoRng>(
    secret: &Scalar,
    data: &[&[u8]],
    rng: &mut R,
) -> Result<Scalar> {
    let mut aux = [0u8; 32];
    rng.fill_bytes(&mut aux);

    let key = secret.to_bytes();
    let mut counter: u32 = 0;
    loop {
        let mut mac = Hmac::<Sha256>::new_from_slice(&key)
            .map_err(|e| Error::Crypto(e.to_string()))?;
        mac.update(&aux);
        mac.update(&counter.to_be_bytes());
        for part in data {
            mac.update(part);
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&mac.finalize().into_bytes());
        let nonce = Scalar::from_digest(&digest);
        if !nonce.is_zero() {
            return Ok(nonce);
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_nonces_differ_per_message_and_draw() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let secret = Scalar::from_u64(99);
        let a = derive_nonce(&secret, &[b"a"], &mut rng).unwrap();
        let b = derive_nonce(&secret, &[b"b"], &mut rng).unwrap();
        let a2 = derive_nonce(&secret, &[b"a"], &mut rng).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, a2);
        assert!(!a.is_zero());
    }
}
