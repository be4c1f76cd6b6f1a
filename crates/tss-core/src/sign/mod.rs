//! Threshold signing
//!
//! Members sign with one polled DE each; the module verifies every partial
//! against the frozen commitments and combines them once all arrive.

mod dsg;
mod messages;

pub use dsg::{
    combine_partial_signatures, compute_binding_factor, compute_challenge,
    compute_group_pub_nonce, compute_lagrange_coefficient, compute_own_priv_nonce,
    compute_own_pub_nonce, create_partial_signature, encode_commitments, sign_partial,
    verify_partial, verify_signature,
};
pub use messages::*;
