use std::{fmt::Display, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;

use super::{from_b64, from_b64_vec, split_enc_string};
use crate::{
    error::{CryptoError, EncStringParseError, Result},
    ContentFormat, KeyDecryptable, KeyEncryptable, SymmetricCryptoKey,
};

/// # Encrypted string primitive
///
/// [EncString] is a Bitwarden specific primitive that represents a symmetrically encrypted
/// piece of data, encoded as a string. They are are used together with the
/// [KeyDecryptable][crate::KeyDecryptable] and [KeyEncryptable][crate::KeyEncryptable] traits to
/// encrypt and decrypt data using [SymmetricCryptoKey]s.
///
/// The flexibility of the [EncString] type allows for different encryption algorithms to be
/// used which is represented by the different variants of the enum.
///
/// ## Variants
/// - [Aes256Cbc_HmacSha256_B64](EncString::Aes256Cbc_HmacSha256_B64)
/// - [Cose_Encrypt0_B64](EncString::Cose_Encrypt0_B64)
///
/// ## Serialization
///
/// [EncString] implements [Display] and [FromStr] to allow for easy serialization and uses a
/// custom scheme to represent the different variants.
///
/// The scheme is one of the following schemes:
/// - `[type].[iv]|[data]|[mac]`
/// - `[type].[cose_encrypt0_bytes]`
///
/// Where:
/// - `[type]`: is a digit number representing the variant.
/// - `[iv]`: (optional) is the initialization vector used for encryption.
/// - `[data]`: is the encrypted data.
/// - `[mac]`: (optional) is the MAC used to validate the integrity of the data.
/// - `[cose_encrypt0_bytes]`: a COSE_Encrypt0 message. Its protected header carries the
///   algorithm, the key id and the content format, its unprotected header the nonce.
#[derive(Clone, PartialEq, Eq)]
#[allow(unused, non_camel_case_types, missing_docs)]
pub enum EncString {
    /// 2
    Aes256Cbc_HmacSha256_B64 {
        iv: [u8; 16],
        mac: [u8; 32],
        data: Vec<u8>,
    },
    /// 7 The actual enc type is contained in the cose struct
    Cose_Encrypt0_B64 { data: Vec<u8> },
}

// We manually implement these to make sure we don't print any sensitive data
impl std::fmt::Debug for EncString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncString")
            .field("type", &self.enc_type())
            .finish()
    }
}

/// Deserializes an [EncString] from a string.
impl FromStr for EncString {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (enc_type, parts) = split_enc_string(s)?;
        match (enc_type, parts.len()) {
            ("2", 3) => {
                let iv = from_b64(parts[0])?;
                let data = from_b64_vec(parts[1])?;
                let mac = from_b64(parts[2])?;

                Ok(EncString::Aes256Cbc_HmacSha256_B64 { iv, mac, data })
            }
            ("7", 1) => {
                let data = from_b64_vec(parts[0])?;

                Ok(EncString::Cose_Encrypt0_B64 { data })
            }
            (enc_type, parts) => Err(EncStringParseError::InvalidTypeSymm {
                enc_type: enc_type.to_string(),
                parts,
            }
            .into()),
        }
    }
}

impl Display for EncString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncString::Aes256Cbc_HmacSha256_B64 { iv, mac, data } => write!(
                f,
                "{}.{}|{}|{}",
                self.enc_type(),
                STANDARD.encode(iv),
                STANDARD.encode(data),
                STANDARD.encode(mac)
            ),
            EncString::Cose_Encrypt0_B64 { data } => {
                write!(f, "{}.{}", self.enc_type(), STANDARD.encode(data))
            }
        }
    }
}

impl<'de> Deserialize<'de> for EncString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for EncString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl EncString {
    /// The numeric type identifier used in the string representation
    const fn enc_type(&self) -> u8 {
        match self {
            EncString::Aes256Cbc_HmacSha256_B64 { .. } => 2,
            EncString::Cose_Encrypt0_B64 { .. } => 7,
        }
    }

    /// Encrypt raw bytes with the provided key, using the algorithm of the key. The content
    /// format is only recorded by COSE encrypted strings.
    pub(crate) fn encrypt_with_symmetric_key(
        data: &[u8],
        content_format: ContentFormat,
        key: &SymmetricCryptoKey,
    ) -> Result<EncString> {
        match key {
            SymmetricCryptoKey::Aes256CbcHmacKey(key) => {
                let (iv, mac, data) =
                    crate::aes::encrypt_aes256_hmac(data, &key.mac_key, &key.enc_key)?;
                Ok(EncString::Aes256Cbc_HmacSha256_B64 { iv, mac, data })
            }
            SymmetricCryptoKey::XChaCha20Poly1305Key(key) => {
                let data = crate::cose::encrypt_xchacha20_poly1305(data, key, content_format)?;
                Ok(EncString::Cose_Encrypt0_B64 { data })
            }
        }
    }

    /// Decrypts the string, returning the content format recorded at encryption time. Legacy
    /// AES strings carry no content format.
    pub(crate) fn decrypt_with_content_format(
        &self,
        key: &SymmetricCryptoKey,
    ) -> Result<(Vec<u8>, Option<ContentFormat>)> {
        match (self, key) {
            (
                EncString::Aes256Cbc_HmacSha256_B64 { iv, mac, data },
                SymmetricCryptoKey::Aes256CbcHmacKey(key),
            ) => {
                let decrypted = crate::aes::decrypt_aes256_hmac(
                    iv,
                    mac,
                    data.clone(),
                    &key.mac_key,
                    &key.enc_key,
                )?;
                Ok((decrypted, None))
            }
            (
                EncString::Cose_Encrypt0_B64 { data },
                SymmetricCryptoKey::XChaCha20Poly1305Key(key),
            ) => {
                let (decrypted, content_format) =
                    crate::cose::decrypt_xchacha20_poly1305(data, key)?;
                Ok((decrypted, Some(content_format)))
            }
            _ => Err(CryptoError::WrongKeyType(key.algorithm())),
        }
    }
}

impl KeyEncryptable<SymmetricCryptoKey, EncString> for &[u8] {
    fn encrypt_with_key(self, key: &SymmetricCryptoKey) -> Result<EncString> {
        EncString::encrypt_with_symmetric_key(self, ContentFormat::OctetStream, key)
    }
}

impl KeyEncryptable<SymmetricCryptoKey, EncString> for &str {
    fn encrypt_with_key(self, key: &SymmetricCryptoKey) -> Result<EncString> {
        EncString::encrypt_with_symmetric_key(self.as_bytes(), ContentFormat::Utf8, key)
    }
}

impl KeyEncryptable<SymmetricCryptoKey, EncString> for String {
    fn encrypt_with_key(self, key: &SymmetricCryptoKey) -> Result<EncString> {
        self.as_str().encrypt_with_key(key)
    }
}

/// Wraps a symmetric key with another symmetric key.
///
/// An AES wrapping key can not record a content format, so the wrapped key uses the padded legacy
/// encoding that is distinguishable by length. COSE wrapping keys get the raw COSE key.
impl KeyEncryptable<SymmetricCryptoKey, EncString> for &SymmetricCryptoKey {
    fn encrypt_with_key(self, key: &SymmetricCryptoKey) -> Result<EncString> {
        match key {
            SymmetricCryptoKey::Aes256CbcHmacKey(_) => {
                let encoded = self.to_encoded()?;
                EncString::encrypt_with_symmetric_key(
                    &encoded,
                    ContentFormat::BitwardenLegacyKey,
                    key,
                )
            }
            SymmetricCryptoKey::XChaCha20Poly1305Key(_) => {
                let (content_format, encoded) = self.to_encoded_raw()?;
                EncString::encrypt_with_symmetric_key(&encoded, content_format, key)
            }
        }
    }
}

impl KeyDecryptable<SymmetricCryptoKey, Vec<u8>> for EncString {
    fn decrypt_with_key(&self, key: &SymmetricCryptoKey) -> Result<Vec<u8>> {
        let (decrypted, _) = self.decrypt_with_content_format(key)?;
        Ok(decrypted)
    }
}

impl KeyDecryptable<SymmetricCryptoKey, String> for EncString {
    fn decrypt_with_key(&self, key: &SymmetricCryptoKey) -> Result<String> {
        let dec: Vec<u8> = self.decrypt_with_key(key)?;
        String::from_utf8(dec).map_err(|_| CryptoError::InvalidUtf8String)
    }
}

/// Unwraps a symmetric key that was wrapped with another symmetric key.
impl KeyDecryptable<SymmetricCryptoKey, SymmetricCryptoKey> for EncString {
    fn decrypt_with_key(&self, key: &SymmetricCryptoKey) -> Result<SymmetricCryptoKey> {
        let (mut decrypted, content_format) = self.decrypt_with_content_format(key)?;
        match content_format {
            Some(ContentFormat::CoseKey) => {
                let result = SymmetricCryptoKey::from_cose_key_bytes(&decrypted);
                zeroize::Zeroize::zeroize(&mut decrypted);
                result
            }
            Some(ContentFormat::BitwardenLegacyKey) | None => {
                SymmetricCryptoKey::try_from(decrypted)
            }
            Some(_) => {
                zeroize::Zeroize::zeroize(&mut decrypted);
                Err(CryptoError::InvalidKey)
            }
        }
    }
}
