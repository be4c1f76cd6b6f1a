//! Keccak-256 hashing into bytes and scalars

use super::Scalar;
use tiny_keccak::{Hasher, Keccak};

/// Keccak-256 over the concatenation of `parts`
pub fn keccak256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Domain-separated hash reduced into the scalar field.
///
/// Every part is length-prefixed so variable-width inputs cannot be shifted
/// across part boundaries.
pub fn hash_to_scalar(tag: &str, parts: &[&[u8]]) -> Scalar {
    let mut hasher = Keccak::v256();
    hasher.update(tag.as_bytes());
    for part in parts {
        hasher.update(&(part.len() as u32).to_be_bytes());
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    Scalar::from_digest(&output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            hex::encode(keccak256(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_concatenates() {
        assert_eq!(keccak256(&[b"ab", b"c"]), keccak256(&[b"abc"]));
    }

    #[test]
    fn test_hash_to_scalar_separates_parts() {
        assert_ne!(
            hash_to_scalar("tag", &[b"ab", b"c"]),
            hash_to_scalar("tag", &[b"a", b"bc"])
        );
        assert_ne!(
            hash_to_scalar("one", &[b"abc"]),
            hash_to_scalar("two", &[b"abc"])
        );
    }
}
