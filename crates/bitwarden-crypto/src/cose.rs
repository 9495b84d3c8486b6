//! This file contains private-use constants for COSE encoded key types and algorithms, and the
//! COSE_Encrypt0 encoding of XChaCha20-Poly1305 ciphertexts.
//! Standardized values from https://www.iana.org/assignments/cose/cose.xhtml should always be preferred
//! unless there is a specific reason to use a private-use value.

use coset::{iana, CborSerializable, Label};

use crate::{
    error::{EncStringParseError, EncodingError},
    util::{pad_bytes, unpad_bytes},
    xchacha20, ContentFormat, CryptoError, SymmetricKeyAlgorithm, XChaCha20Poly1305Key,
};

// XChaCha20 (https://datatracker.ietf.org/doc/html/draft-irtf-cfrg-xchacha-03) is used over ChaCha20
// to be able to randomly generate nonces, and to not have to worry about key wearout. Since
// the draft was never published as an RFC, we use a private-use value for the algorithm.
pub(crate) const XCHACHA20_POLY1305: i64 = -70000;
pub(crate) const SYMMETRIC_KEY: Label = Label::Int(iana::SymmetricKeyParameter::K as i64);

/// Protected header label carrying the [SigningNamespace][crate::SigningNamespace] of a signature
pub(crate) const SIGNING_NAMESPACE: i64 = -80000;

/// Text content is padded to a multiple of this many bytes so ciphertexts only leak a coarse
/// length.
pub(crate) const XCHACHA20_TEXT_PAD_BLOCK_SIZE: usize = 32;

// Content types without a registered CoAP content format
pub(crate) const CONTENT_TYPE_PADDED_UTF8: &str = "application/x.bitwarden.utf8-padded";
pub(crate) const CONTENT_TYPE_BITWARDEN_LEGACY_KEY: &str = "application/x.bitwarden.legacy-key";

fn cose_encoding_error(err: coset::CoseError) -> CryptoError {
    CryptoError::EncString(EncStringParseError::InvalidCoseEncoding(err))
}

/// Encrypts a plaintext message using XChaCha20Poly1305 and returns a COSE Encrypt0 message
pub(crate) fn encrypt_xchacha20_poly1305(
    plaintext: &[u8],
    key: &XChaCha20Poly1305Key,
    content_format: ContentFormat,
) -> Result<Vec<u8>, CryptoError> {
    let header_builder: coset::HeaderBuilder = content_format.into();
    let mut protected_header = header_builder.key_id(key.key_id.to_vec()).build();
    // coset has no builder method for private-use algorithms
    protected_header.alg = Some(coset::Algorithm::PrivateUse(XCHACHA20_POLY1305));

    let plaintext = if should_pad_content(&content_format) {
        let padded_length =
            (plaintext.len() / XCHACHA20_TEXT_PAD_BLOCK_SIZE + 1) * XCHACHA20_TEXT_PAD_BLOCK_SIZE;
        zeroize::Zeroizing::new(pad_bytes(plaintext, padded_length))
    } else {
        zeroize::Zeroizing::new(plaintext.to_vec())
    };

    let mut nonce = [0u8; xchacha20::NONCE_SIZE];
    let cose_encrypt0 = coset::CoseEncrypt0Builder::new()
        .protected(protected_header)
        .try_create_ciphertext(&plaintext, &[], |data, aad| {
            let (used_nonce, ciphertext) =
                xchacha20::encrypt_xchacha20_poly1305(&key.enc_key, data, aad)?;
            nonce = used_nonce;
            Ok::<_, CryptoError>(ciphertext)
        })?
        .unprotected(coset::HeaderBuilder::new().iv(nonce.to_vec()).build())
        .build();

    cose_encrypt0.to_vec().map_err(cose_encoding_error)
}

/// Decrypts a COSE Encrypt0 message, using a XChaCha20Poly1305 key
pub(crate) fn decrypt_xchacha20_poly1305(
    cose_encrypt0_message: &[u8],
    key: &XChaCha20Poly1305Key,
) -> Result<(Vec<u8>, ContentFormat), CryptoError> {
    let msg =
        coset::CoseEncrypt0::from_slice(cose_encrypt0_message).map_err(cose_encoding_error)?;

    let Some(ref alg) = msg.protected.header.alg else {
        return Err(CryptoError::EncString(
            EncStringParseError::CoseMissingAlgorithm,
        ));
    };

    if *alg != coset::Algorithm::PrivateUse(XCHACHA20_POLY1305) {
        return Err(CryptoError::WrongKeyType(
            SymmetricKeyAlgorithm::XChaCha20Poly1305,
        ));
    }

    let content_format = ContentFormat::try_from(&msg.protected.header)?;

    if key.key_id.as_slice() != msg.protected.header.key_id.as_slice() {
        return Err(CryptoError::WrongCoseKeyId);
    }

    if msg.ciphertext.is_none() {
        return Err(EncodingError::MissingValue("ciphertext").into());
    }

    let decrypted_message = msg.decrypt(&[], |data, aad| {
        let nonce: &[u8; xchacha20::NONCE_SIZE] = msg
            .unprotected
            .iv
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidNonceLength)?;
        xchacha20::decrypt_xchacha20_poly1305(nonce, &key.enc_key, data, aad)
    })?;

    if should_pad_content(&content_format) {
        let data = unpad_bytes(&decrypted_message)?;
        return Ok((data.to_vec(), content_format));
    }

    Ok((decrypted_message, content_format))
}

fn should_pad_content(format: &ContentFormat) -> bool {
    matches!(format, ContentFormat::Utf8)
}
