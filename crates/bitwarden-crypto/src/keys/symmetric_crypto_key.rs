use base64::{engine::general_purpose::STANDARD, Engine};
use coset::{iana::KeyOperation, CborSerializable};
use serde::{Deserialize, Serialize};
use subtle::{Choice, ConstantTimeEq};
use zeroize::{Zeroize, Zeroizing};

use super::key_encryptable::CryptoKey;
use crate::{
    cose::{SYMMETRIC_KEY, XCHACHA20_POLY1305},
    error::{EncodingError, Result},
    util::{generate_random_bytes, pad_bytes, unpad_bytes},
    ContentFormat, CryptoError,
};

/// The algorithm a [SymmetricCryptoKey] is used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymmetricKeyAlgorithm {
    /// AES-256 in CBC mode with an HMAC-SHA256, the user key of version 1 accounts
    Aes256CbcHmac,
    /// XChaCha20-Poly1305, the user key of version 2 accounts
    XChaCha20Poly1305,
}

/// Aes256CbcHmacKey is a symmetric encryption key consisting
/// of two 256-bit keys, one for encryption and one for MAC
#[derive(Clone)]
pub struct Aes256CbcHmacKey {
    pub(crate) enc_key: Zeroizing<[u8; 32]>,
    pub(crate) mac_key: Zeroizing<[u8; 32]>,
}

impl ConstantTimeEq for Aes256CbcHmacKey {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.enc_key.as_slice().ct_eq(other.enc_key.as_slice())
            & self.mac_key.as_slice().ct_eq(other.mac_key.as_slice())
    }
}

impl PartialEq for Aes256CbcHmacKey {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

/// XChaCha20Poly1305Key is a symmetric encryption key consisting of one 256-bit key and a
/// random key id. The key id is bound to every ciphertext created with the key.
#[derive(Clone)]
pub struct XChaCha20Poly1305Key {
    pub(crate) key_id: [u8; 16],
    pub(crate) enc_key: Zeroizing<[u8; 32]>,
}

impl ConstantTimeEq for XChaCha20Poly1305Key {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.key_id.as_slice().ct_eq(other.key_id.as_slice())
            & self.enc_key.as_slice().ct_eq(other.enc_key.as_slice())
    }
}

impl PartialEq for XChaCha20Poly1305Key {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

/// A symmetric encryption key. Used to encrypt and decrypt [`EncString`](crate::EncString)
#[derive(Clone)]
#[allow(missing_docs)]
pub enum SymmetricCryptoKey {
    Aes256CbcHmacKey(Aes256CbcHmacKey),
    XChaCha20Poly1305Key(XChaCha20Poly1305Key),
}

impl SymmetricCryptoKey {
    // enc type 2 old static format
    const AES256_CBC_HMAC_KEY_LEN: usize = 64;

    /// Generate a new random AES-256-CBC-HMAC [SymmetricCryptoKey]
    pub fn make_aes256_cbc_hmac_key() -> Self {
        SymmetricCryptoKey::Aes256CbcHmacKey(Aes256CbcHmacKey {
            enc_key: generate_random_bytes::<32>(),
            mac_key: generate_random_bytes::<32>(),
        })
    }

    /// Generate a new random XChaCha20-Poly1305 [SymmetricCryptoKey]
    pub fn make_xchacha20_poly1305_key() -> Self {
        SymmetricCryptoKey::XChaCha20Poly1305Key(XChaCha20Poly1305Key {
            key_id: *generate_random_bytes::<16>(),
            enc_key: generate_random_bytes::<32>(),
        })
    }

    /// The algorithm this key is used with
    pub fn algorithm(&self) -> SymmetricKeyAlgorithm {
        match self {
            SymmetricCryptoKey::Aes256CbcHmacKey(_) => SymmetricKeyAlgorithm::Aes256CbcHmac,
            SymmetricCryptoKey::XChaCha20Poly1305Key(_) => SymmetricKeyAlgorithm::XChaCha20Poly1305,
        }
    }

    /// Encodes the key to a byte array representation.
    ///
    /// AES-256-CBC-HMAC keys use the legacy 64 byte layout `enc_key || mac_key`. Other keys are
    /// COSE keys, padded so that the encoded form is always longer than 64 bytes, which keeps the
    /// two layouts distinguishable by length alone.
    pub fn to_encoded(&self) -> Result<Zeroizing<Vec<u8>>> {
        let (content_format, encoded) = self.to_encoded_raw()?;
        match content_format {
            ContentFormat::CoseKey => Ok(Zeroizing::new(pad_bytes(
                &encoded,
                Self::AES256_CBC_HMAC_KEY_LEN + 1,
            ))),
            _ => Ok(encoded),
        }
    }

    /// Encodes the key without the length padding of [SymmetricCryptoKey::to_encoded], along
    /// with the [ContentFormat] describing the bytes.
    pub(crate) fn to_encoded_raw(&self) -> Result<(ContentFormat, Zeroizing<Vec<u8>>)> {
        match self {
            SymmetricCryptoKey::Aes256CbcHmacKey(key) => {
                let mut buf = Zeroizing::new(Vec::with_capacity(Self::AES256_CBC_HMAC_KEY_LEN));
                buf.extend_from_slice(key.enc_key.as_slice());
                buf.extend_from_slice(key.mac_key.as_slice());
                Ok((ContentFormat::BitwardenLegacyKey, buf))
            }
            SymmetricCryptoKey::XChaCha20Poly1305Key(key) => {
                let mut cose_key = coset::CoseKeyBuilder::new_symmetric_key(key.enc_key.to_vec())
                    .key_id(key.key_id.to_vec())
                    .add_key_op(KeyOperation::Encrypt)
                    .add_key_op(KeyOperation::Decrypt)
                    .add_key_op(KeyOperation::WrapKey)
                    .add_key_op(KeyOperation::UnwrapKey)
                    .build();
                cose_key.alg = Some(coset::Algorithm::PrivateUse(XCHACHA20_POLY1305));
                let encoded = cose_key
                    .to_vec()
                    .map_err(|_| EncodingError::InvalidCoseEncoding)?;
                Ok((ContentFormat::CoseKey, Zeroizing::new(encoded)))
            }
        }
    }

    /// Parses an unpadded COSE key, as produced by [SymmetricCryptoKey::to_encoded_raw].
    pub(crate) fn from_cose_key_bytes(bytes: &[u8]) -> Result<Self> {
        let cose_key =
            coset::CoseKey::from_slice(bytes).map_err(|_| EncodingError::InvalidCoseEncoding)?;
        SymmetricCryptoKey::try_from(&cose_key)
    }

    /// Encodes the key to base64
    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_encoded()?.as_slice()))
    }
}

impl ConstantTimeEq for SymmetricCryptoKey {
    fn ct_eq(&self, other: &SymmetricCryptoKey) -> Choice {
        match (self, other) {
            (SymmetricCryptoKey::Aes256CbcHmacKey(a), SymmetricCryptoKey::Aes256CbcHmacKey(b)) => {
                a.ct_eq(b)
            }
            (
                SymmetricCryptoKey::XChaCha20Poly1305Key(a),
                SymmetricCryptoKey::XChaCha20Poly1305Key(b),
            ) => a.ct_eq(b),
            _ => Choice::from(0),
        }
    }
}

impl PartialEq for SymmetricCryptoKey {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl TryFrom<String> for SymmetricCryptoKey {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut b = STANDARD
            .decode(value)
            .map_err(|_| CryptoError::InvalidKey)?;
        SymmetricCryptoKey::try_from(b.as_mut_slice())
    }
}

impl TryFrom<Vec<u8>> for SymmetricCryptoKey {
    type Error = CryptoError;

    fn try_from(mut value: Vec<u8>) -> Result<Self, Self::Error> {
        SymmetricCryptoKey::try_from(value.as_mut_slice())
    }
}

impl TryFrom<&mut [u8]> for SymmetricCryptoKey {
    type Error = CryptoError;

    /// Note: This function takes the byte slice by mutable reference and will zero out all
    /// the data in it. This is to prevent the key from being left in memory.
    fn try_from(value: &mut [u8]) -> Result<Self, Self::Error> {
        let result = decode_key(value);
        value.zeroize();
        result
    }
}

fn decode_key(value: &[u8]) -> Result<SymmetricCryptoKey> {
    match value.len() {
        SymmetricCryptoKey::AES256_CBC_HMAC_KEY_LEN => {
            let mut enc_key = Zeroizing::new([0u8; 32]);
            let mut mac_key = Zeroizing::new([0u8; 32]);
            enc_key.copy_from_slice(&value[..32]);
            mac_key.copy_from_slice(&value[32..]);
            Ok(SymmetricCryptoKey::Aes256CbcHmacKey(Aes256CbcHmacKey {
                enc_key,
                mac_key,
            }))
        }
        len if len > SymmetricCryptoKey::AES256_CBC_HMAC_KEY_LEN => {
            let unpadded = unpad_bytes(value)?;
            SymmetricCryptoKey::from_cose_key_bytes(unpadded)
        }
        _ => Err(CryptoError::InvalidKeyLen),
    }
}

impl CryptoKey for SymmetricCryptoKey {}

// Both variants hold their key material in `Zeroizing` containers
impl zeroize::ZeroizeOnDrop for SymmetricCryptoKey {}

// We manually implement these to make sure we don't print any sensitive data
impl std::fmt::Debug for SymmetricCryptoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricCryptoKey")
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

impl TryFrom<&coset::CoseKey> for SymmetricCryptoKey {
    type Error = CryptoError;

    fn try_from(cose_key: &coset::CoseKey) -> Result<Self, Self::Error> {
        let key_bytes = cose_key
            .params
            .iter()
            .find_map(|(label, value)| match (label, value) {
                (&SYMMETRIC_KEY, ciborium::Value::Bytes(bytes)) => Some(bytes),
                _ => None,
            })
            .ok_or(CryptoError::InvalidKey)?;
        let alg = cose_key.alg.as_ref().ok_or(CryptoError::InvalidKey)?;

        match alg {
            coset::Algorithm::PrivateUse(XCHACHA20_POLY1305) => {
                let enc_key: [u8; 32] = key_bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| CryptoError::InvalidKeyLen)?;
                let key_id = cose_key
                    .key_id
                    .as_slice()
                    .try_into()
                    .map_err(|_| CryptoError::InvalidKey)?;
                Ok(SymmetricCryptoKey::XChaCha20Poly1305Key(
                    XChaCha20Poly1305Key {
                        key_id,
                        enc_key: Zeroizing::new(enc_key),
                    },
                ))
            }
            _ => Err(CryptoError::InvalidKey),
        }
    }
}
