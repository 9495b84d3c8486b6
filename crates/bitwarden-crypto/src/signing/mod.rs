//! Signing is used to assert integrity of a message to others or to oneself.
//!
//! Signing and signature verification operations are divided into two layers here:
//! - (public) High-level: Give a struct and a namespace, and get a [SignedObject]. Serialization
//!   is decided by the signing implementation, not by each consumer. Signed objects are
//!   COSE_Sign1 messages and the namespace sits in their protected header, so a signature from
//!   one protocol never verifies in another.
//! - (crate) Low-level: Give a byte array, and get a raw signature. Digital signature schemes are
//!   added here.

mod cose;
mod namespace;
pub use namespace::SigningNamespace;
mod signed_object;
pub use signed_object::SignedObject;
mod signing_key;
pub use signing_key::{SignatureAlgorithm, SigningKey, VerifyingKey};
