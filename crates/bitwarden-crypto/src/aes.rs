//! # AES operations
//!
//! Contains low level AES operations used by the rest of the crate.
//!
//! In most cases you should use the [EncString][crate::EncString] with
//! [KeyEncryptable][crate::KeyEncryptable] & [KeyDecryptable][crate::KeyDecryptable] instead.

use aes::cipher::{
    block_padding::Pkcs7, generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut,
    KeyIvInit,
};
use hmac::Mac;
use subtle::ConstantTimeEq;

use crate::{error::Result, util::PbkdfSha256Hmac, CryptoError};

/// Encrypt using AES-256 in CBC mode with an HMAC-SHA256 over `iv || data`.
///
/// Returns the randomly generated IV, the MAC and the ciphertext.
pub(crate) fn encrypt_aes256_hmac(
    data: &[u8],
    mac_key: &[u8; 32],
    key: &[u8; 32],
) -> Result<([u8; 16], [u8; 32], Vec<u8>)> {
    let iv = *crate::util::generate_random_bytes::<16>();

    let data = cbc::Encryptor::<aes::Aes256>::new(
        GenericArray::from_slice(key),
        GenericArray::from_slice(&iv),
    )
    .encrypt_padded_vec_mut::<Pkcs7>(data);

    let mac = generate_mac(mac_key, &iv, &data)?;

    Ok((iv, mac, data))
}

/// Decrypt using AES-256 in CBC mode, validating the MAC before touching the ciphertext.
pub(crate) fn decrypt_aes256_hmac(
    iv: &[u8; 16],
    mac: &[u8; 32],
    data: Vec<u8>,
    mac_key: &[u8; 32],
    key: &[u8; 32],
) -> Result<Vec<u8>> {
    let res = generate_mac(mac_key, iv, &data)?;
    if res.as_slice().ct_ne(mac.as_slice()).into() {
        return Err(CryptoError::InvalidMac);
    }

    let mut data = data;
    let decrypted = cbc::Decryptor::<aes::Aes256>::new(
        GenericArray::from_slice(key),
        GenericArray::from_slice(iv),
    )
    .decrypt_padded_mut::<Pkcs7>(&mut data)
    .map_err(|_| CryptoError::KeyDecrypt)?;

    Ok(decrypted.to_vec())
}

fn generate_mac(mac_key: &[u8; 32], iv: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut hmac =
        PbkdfSha256Hmac::new_from_slice(mac_key).map_err(|_| CryptoError::InvalidKey)?;
    hmac.update(iv);
    hmac.update(data);
    let mac = hmac.finalize().into_bytes();

    let mut out = [0u8; 32];
    out.copy_from_slice(&mac);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_aes256_hmac() {
        let key = [1u8; 32];
        let mac_key = [2u8; 32];
        let data = b"EncryptMe!";

        let (iv, mac, ciphertext) = encrypt_aes256_hmac(data, &mac_key, &key).unwrap();
        assert_ne!(ciphertext.as_slice(), data);

        let decrypted = decrypt_aes256_hmac(&iv, &mac, ciphertext, &mac_key, &key).unwrap();
        assert_eq!(decrypted, data);
    }

    #[test]
    fn test_decrypt_with_modified_mac_fails() {
        let key = [1u8; 32];
        let mac_key = [2u8; 32];

        let (iv, mut mac, ciphertext) = encrypt_aes256_hmac(b"data", &mac_key, &key).unwrap();
        mac[0] ^= 1;

        let result = decrypt_aes256_hmac(&iv, &mac, ciphertext, &mac_key, &key);
        assert!(matches!(result, Err(CryptoError::InvalidMac)));
    }

    #[test]
    fn test_decrypt_with_wrong_mac_key_fails() {
        let key = [1u8; 32];

        let (iv, mac, ciphertext) = encrypt_aes256_hmac(b"data", &[2u8; 32], &key).unwrap();

        let result = decrypt_aes256_hmac(&iv, &mac, ciphertext, &[3u8; 32], &key);
        assert!(matches!(result, Err(CryptoError::InvalidMac)));
    }
}
