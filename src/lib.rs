//! **microbits-core** - cryptographic primitives and a USB 2.0 device stack
//! for resource-constrained microcontrollers.
//!
//! # Modules
//! | Module | Contents |
//! |--------|----------|
//! | [`hash`]   | Keccak-f\[1600\], SHA-2, SHA-3/SHAKE/KMAC |
//! | [`mac`]    | HMAC |
//! | [`cipher`] | AES, AES-CTR, ChaCha20 |
//! | [`rng`]    | Fast-key-erasure CSPRNG |
//! | [`bigint`] | Fixed-width constant-time big integers |
//! | [`field`]  | Fp(2^255-19), Fp(2^448-2^224-1) and generic mod-ℓ scalars |
//! | [`curve`]  | Ed25519 / Ed448 group law and point codec |
//! | [`eddh`]   | X25519 / X448 Diffie-Hellman |
//! | [`eddsa`]  | Ed25519 / Ed448 signatures |
//! | [`usb`]    | Control-transfer engine, function framework, CDC-ACM |
//!
//! The crate is `#![no_std]` outside test builds and never allocates: every
//! context type is a fixed-size struct, and every buffer is supplied by the
//! caller.
#![cfg_attr(not(test), no_std)]

pub mod bigint;
pub mod cipher;
pub mod curve;
pub mod eddh;
pub mod eddsa;
pub mod error;
pub mod field;
pub mod hash;
pub mod mac;
pub mod rng;
pub mod usb;
pub mod util;

pub use error::{Error, Result, Status};
