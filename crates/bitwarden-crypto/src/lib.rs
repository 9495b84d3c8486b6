#![doc = include_str!("../README.md")]

//! # Key material in memory
//!
//! Key material is held in [zeroize::Zeroizing] containers or in types that zeroize themselves on
//! drop, and none of the key types print their material through [Debug]. Keys are compared in
//! constant time.

mod aes;
mod content_format;
pub use content_format::ContentFormat;
mod cose;
mod enc_string;
pub use enc_string::{EncString, UnsignedSharedKey};
mod error;
pub(crate) use error::Result;
pub use error::{CryptoError, EncStringParseError, EncodingError, RsaError, SignatureError};
mod keys;
pub use keys::*;
mod signing;
pub use signing::*;
mod store;
pub use store::{KeyStore, KeyStoreContext};
mod traits;
pub use traits::{KeyId, KeyIds, LocalId};
mod util;
pub use util::{generate_random_bytes, pbkdf2};
mod xchacha20;
