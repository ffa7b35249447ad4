//! Modular arithmetic over the two curve base fields and their scalar
//! (mod group-order) rings.

pub mod fp25519;
pub mod fp448;
pub mod scalar;
