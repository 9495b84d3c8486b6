use rand::RngCore;
use zeroize::Zeroizing;

use crate::{error::Result, CryptoError};

pub(crate) type PbkdfSha256Hmac = hmac::Hmac<sha2::Sha256>;
pub(crate) const PBKDF_SHA256_HMAC_OUT_SIZE: usize = 32;

/// [RFC5869](https://datatracker.ietf.org/doc/html/rfc5869) HKDF-Expand operation
pub(crate) fn hkdf_expand(prk: &[u8], info: Option<&str>) -> Result<Zeroizing<[u8; 32]>> {
    let hkdf = hkdf::Hkdf::<sha2::Sha256>::from_prk(prk).map_err(|_| CryptoError::InvalidKeyLen)?;
    let mut key = Zeroizing::new([0u8; 32]);

    let i = info.map(|i| i.as_bytes()).unwrap_or(&[]);
    hkdf.expand(i, key.as_mut())
        .map_err(|_| CryptoError::InvalidKeyLen)?;

    Ok(key)
}

/// Generate random bytes that are cryptographically secure
pub fn generate_random_bytes<const N: usize>() -> Zeroizing<[u8; N]> {
    let mut bytes = Zeroizing::new([0u8; N]);
    rand::thread_rng().fill_bytes(bytes.as_mut());
    bytes
}

/// Derive pbkdf2 of a given password and salt
pub fn pbkdf2(
    password: &[u8],
    salt: &[u8],
    rounds: u32,
) -> Result<[u8; PBKDF_SHA256_HMAC_OUT_SIZE]> {
    pbkdf2::pbkdf2_array::<PbkdfSha256Hmac, PBKDF_SHA256_HMAC_OUT_SIZE>(password, salt, rounds)
        .map_err(|_| CryptoError::InvalidKeyLen)
}

/// Pads bytes to a minimum length using PKCS7-like padding.
/// The last N bytes of the padded value all contain the value N. At least one byte of
/// padding is always added, so the result is never shorter than `min_length`.
pub(crate) fn pad_bytes(bytes: &[u8], min_length: usize) -> Vec<u8> {
    let pad_bytes = min_length.saturating_sub(bytes.len()).max(1);
    let mut padded = Vec::with_capacity(bytes.len() + pad_bytes);
    padded.extend_from_slice(bytes);
    padded.resize(bytes.len() + pad_bytes, pad_bytes as u8);
    padded
}

/// Removes the padding added by [pad_bytes].
pub(crate) fn unpad_bytes(padded: &[u8]) -> Result<&[u8]> {
    let pad_len = *padded.last().ok_or(CryptoError::InvalidKeyLen)? as usize;
    if pad_len == 0 || pad_len > padded.len() {
        return Err(CryptoError::InvalidKeyLen);
    }
    Ok(&padded[..padded.len() - pad_len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hkdf_expand() {
        let prk = &[
            23, 152, 120, 41, 214, 16, 156, 133, 71, 226, 178, 135, 208, 255, 66, 101, 189, 70,
            173, 30, 39, 215, 175, 236, 38, 180, 180, 62, 196, 4, 159, 70,
        ];
        let info = Some("info");

        let result = hkdf_expand(prk, info).unwrap();

        let expected_output: [u8; 32] = [
            6, 114, 42, 38, 87, 231, 30, 109, 30, 255, 104, 129, 255, 94, 92, 108, 124, 145, 215,
            208, 17, 60, 135, 22, 70, 158, 40, 53, 45, 182, 8, 63,
        ];

        assert_eq!(result.as_slice(), expected_output);
    }

    #[test]
    fn test_pad_and_unpad() {
        let data = vec![1u8, 2, 3];
        let padded = pad_bytes(&data, 65);
        assert_eq!(padded.len(), 65);
        assert_eq!(unpad_bytes(&padded).unwrap(), data.as_slice());
    }

    #[test]
    fn test_pad_always_adds_a_byte() {
        let data = vec![7u8; 80];
        let padded = pad_bytes(&data, 65);
        assert_eq!(padded.len(), 81);
        assert_eq!(unpad_bytes(&padded).unwrap(), data.as_slice());
    }

    #[test]
    fn test_unpad_rejects_empty() {
        assert!(unpad_bytes(&[]).is_err());
        assert!(unpad_bytes(&[1, 2, 0]).is_err());
    }
}
