//! Core types shared by the DKG and signing math

use crate::primitives::{Point, Scalar};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Member index inside a group (1..=size), also the polynomial x-coordinate
pub type MemberId = u64;

/// Group identifier (monotonic, starts at 1)
pub type GroupId = u64;

/// Signing request identifier (monotonic, starts at 1)
pub type SigningId = u64;

/// 32-byte hash binding every DKG proof to one group's key generation
pub type DkgContext = [u8; 32];

/// Shape of a group: `threshold` of `size` members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupShape {
    pub size: u64,
    pub threshold: u64,
}

impl GroupShape {
    pub fn new(size: u64, threshold: u64) -> crate::Result<Self> {
        if threshold == 0 || threshold > size {
            return Err(crate::Error::InvalidThreshold { threshold, size });
        }
        Ok(Self { size, threshold })
    }

    /// Member IDs `1..=size`
    pub fn member_ids(&self) -> impl Iterator<Item = MemberId> {
        1..=self.size
    }

    pub fn contains(&self, member_id: MemberId) -> bool {
        member_id >= 1 && member_id <= self.size
    }
}

/// Key share held by a member after DKG
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct MemberShare {
    /// Group this share belongs to
    #[zeroize(skip)]
    pub group_id: GroupId,

    /// This member's ID
    #[zeroize(skip)]
    pub member_id: MemberId,

    /// Secret share `s_j = sum_i f_i(j)`
    pub private_key: Scalar,

    /// Public key share `Y_j = s_j * G`
    #[zeroize(skip)]
    pub public_key: Point,

    /// Group public key
    #[zeroize(skip)]
    pub group_pub_key: Point,
}

impl MemberShare {
    /// Check the secret against the stored public share
    pub fn is_consistent(&self) -> bool {
        Point::mul_base(&self.private_key) == self.public_key
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| crate::Error::Deserialization(e.to_string()))
    }
}

impl std::fmt::Debug for MemberShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberShare")
            .field("group_id", &self.group_id)
            .field("member_id", &self.member_id)
            .field("public_key", &self.public_key)
            .field("group_pub_key", &self.group_pub_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_shape() {
        assert!(GroupShape::new(3, 2).is_ok());
        assert!(GroupShape::new(3, 3).is_ok());
        assert_eq!(
            GroupShape::new(3, 0),
            Err(crate::Error::InvalidThreshold { threshold: 0, size: 3 })
        );
        assert!(GroupShape::new(3, 4).is_err());

        let shape = GroupShape::new(4, 2).unwrap();
        assert_eq!(shape.member_ids().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(!shape.contains(0));
        assert!(shape.contains(4));
        assert!(!shape.contains(5));
    }

    #[test]
    fn test_member_share_roundtrip() {
        let sk = Scalar::from_u64(42);
        let share = MemberShare {
            group_id: 1,
            member_id: 2,
            private_key: sk,
            public_key: Point::mul_base(&sk),
            group_pub_key: Point::GENERATOR,
        };
        assert!(share.is_consistent());

        let bytes = share.to_bytes().unwrap();
        let back = MemberShare::from_bytes(&bytes).unwrap();
        assert_eq!(back.private_key, sk);
        assert_eq!(back.member_id, 2);
        assert!(!format!("{share:?}").contains(&sk.to_string()));
    }
}
