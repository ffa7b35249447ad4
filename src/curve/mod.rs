//! Twisted Edwards curve group law and point encoding for Curve25519 and
//! Curve448.

pub mod ed25519;
pub mod ed448;
