//! End-to-end tests across the keystore crates.
//!
//! - Session scenarios: plain AES sessions, auth-bound secure-sign keys,
//!   expired tokens, malformed parameter sets
//! - Cross-crate properties: session lifecycle, token verification,
//!   registry idempotence, rendezvous ordering

pub mod test_utils;

#[cfg(test)]
mod scenarios;

#[cfg(test)]
mod properties;
