//! Encrypted string types
//!
//! [EncString] and [UnsignedSharedKey] are Bitwarden specific primitive that represents a
//! encrypted string. They are are used together with the [KeyDecryptable][crate::KeyDecryptable]
//! and [KeyEncryptable][crate::KeyEncryptable] traits to encrypt and decrypt data using
//! [SymmetricCryptoKey][crate::SymmetricCryptoKey] and
//! [AsymmetricCryptoKey][crate::AsymmetricCryptoKey]s.

mod asymmetric;
mod symmetric;

pub use asymmetric::UnsignedSharedKey;
use base64::{engine::general_purpose::STANDARD, Engine};
pub use symmetric::EncString;

use crate::error::{EncStringParseError, Result};

fn from_b64_vec(s: &str) -> Result<Vec<u8>> {
    Ok(STANDARD
        .decode(s)
        .map_err(EncStringParseError::InvalidBase64)?)
}

fn from_b64<const N: usize>(s: &str) -> Result<[u8; N]> {
    let vec = from_b64_vec(s)?;
    let len = vec.len();
    vec.try_into().map_err(|_| {
        EncStringParseError::InvalidLength {
            expected: N,
            got: len,
        }
        .into()
    })
}

/// Splits `<type>.<rest>` into the type and the `|` separated parts.
fn split_enc_string(s: &str) -> Result<(&str, Vec<&str>)> {
    let (enc_type, data) = s.split_once('.').ok_or(EncStringParseError::NoType)?;
    Ok((enc_type, data.split('|').collect()))
}
