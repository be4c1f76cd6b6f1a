//! # TSS Core
//!
//! Cryptographic building blocks for a threshold Schnorr signature scheme
//! over secp256k1.
//!
//! This crate provides:
//! - Scalar/point primitives, sums and Shamir polynomial evaluation
//! - One-time nonce key pairs (DE)
//! - Distributed Key Generation (DKG) with complaint resolution
//! - Threshold signing with per-member binding factors
//!
//! Everything here is pure and deterministic given its inputs (and an RNG
//! where secrets are sampled), so the same functions serve both members
//! producing messages and the module verifying them.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tss_core::{keygen::DkgSession, sign::create_partial_signature};
//!
//! let mut session = DkgSession::new(group_id, member_id, shape, context)?;
//! let round1 = session.round1(&mut rng)?;
//! // ... exchange round 1 and round 2 through the module ...
//! let (share, round3) = session.round3(&round1s, &round2s, &mut rng)?;
//! ```

pub mod de;
pub mod error;
pub mod keygen;
pub mod primitives;
pub mod sign;
pub mod types;

pub use error::{Error, Result};
pub use types::{DkgContext, GroupId, GroupShape, MemberId, MemberShare, SigningId};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
