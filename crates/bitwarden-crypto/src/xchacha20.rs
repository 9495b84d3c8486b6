//! # XChaCha20Poly1305 operations
//!
//! Contains low level XChaCha20Poly1305 operations used by the rest of the crate.
//!
//! In most cases you should use the [EncString][crate::EncString] with
//! [KeyEncryptable][crate::KeyEncryptable] & [KeyDecryptable][crate::KeyDecryptable] instead.
//!
//! XChaCha20Poly1305 is not key-committing. The COSE encoding in [crate::cose] authenticates the
//! key id in the protected header, which is part of the associated data.

use chacha20poly1305::{AeadInPlace, Key, KeyInit, XChaCha20Poly1305, XNonce};

use crate::{error::Result, util::generate_random_bytes, CryptoError};

pub(crate) const NONCE_SIZE: usize = 24;

pub(crate) fn encrypt_xchacha20_poly1305(
    key: &[u8; 32],
    plaintext_secret_data: &[u8],
    associated_data: &[u8],
) -> Result<([u8; NONCE_SIZE], Vec<u8>)> {
    let nonce = *generate_random_bytes::<NONCE_SIZE>();

    // This buffer contains the plaintext, that will be encrypted in-place
    let mut buffer = Vec::from(plaintext_secret_data);
    XChaCha20Poly1305::new(Key::from_slice(key))
        .encrypt_in_place(XNonce::from_slice(&nonce), associated_data, &mut buffer)
        .map_err(|_| CryptoError::InvalidKey)?;

    Ok((nonce, buffer))
}

pub(crate) fn decrypt_xchacha20_poly1305(
    nonce: &[u8; NONCE_SIZE],
    key: &[u8; 32],
    ciphertext: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>> {
    let mut buffer = ciphertext.to_vec();
    XChaCha20Poly1305::new(Key::from_slice(key))
        .decrypt_in_place(XNonce::from_slice(nonce), associated_data, &mut buffer)
        .map_err(|_| CryptoError::KeyDecrypt)?;
    Ok(buffer)
}
