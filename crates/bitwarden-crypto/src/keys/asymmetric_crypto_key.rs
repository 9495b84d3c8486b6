use rsa::{
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
    RsaPrivateKey, RsaPublicKey,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::key_encryptable::{CryptoKey, KeyDecryptable};
use crate::{
    error::{CryptoError, Result, RsaError},
    ContentFormat, EncString, SymmetricCryptoKey,
};

/// Algorithm / public key encryption scheme used for encryption/decryption.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyEncryptionAlgorithm {
    /// RSA with OAEP padding and SHA-1 hashing.
    RsaOaepSha1,
}

/// Public key of an asymmetric key pair. Used to encapsulate symmetric keys for the holder of
/// the matching [AsymmetricCryptoKey].
#[derive(Clone, PartialEq)]
pub struct AsymmetricPublicCryptoKey {
    pub(crate) key: RsaPublicKey,
}

impl AsymmetricPublicCryptoKey {
    /// Build a public key from the SubjectPublicKeyInfo DER.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            key: RsaPublicKey::from_public_key_der(der).map_err(|_| CryptoError::InvalidKey)?,
        })
    }

    /// Makes a SubjectPublicKeyInfo DER serialized version of the public key.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self
            .key
            .to_public_key_der()
            .map_err(|_| RsaError::CreatePublicKey)?
            .into_vec())
    }

    /// The algorithm this key is used with
    pub fn algorithm(&self) -> PublicKeyEncryptionAlgorithm {
        PublicKeyEncryptionAlgorithm::RsaOaepSha1
    }
}

impl std::fmt::Debug for AsymmetricPublicCryptoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsymmetricPublicCryptoKey")
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

/// An asymmetric encryption key. Contains both the public and private key. Can be used to both
/// encrypt and decrypt [`UnsignedSharedKey`](crate::UnsignedSharedKey).
#[derive(Clone)]
pub struct AsymmetricCryptoKey {
    // RsaPrivateKey is not a Copy type so this isn't completely necessary, but
    // to keep the compiler from making stack copies when moving this struct around,
    // we use a Box to keep the values on the heap.
    pub(crate) key: Box<RsaPrivateKey>,
}

impl AsymmetricCryptoKey {
    /// Generate a random AsymmetricCryptoKey (RSA-2048).
    pub fn make() -> Result<Self> {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).map_err(RsaError::Rsa)?;
        Ok(Self { key: Box::new(key) })
    }

    /// Parse a PKCS8 DER encoded private key.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            key: Box::new(RsaPrivateKey::from_pkcs8_der(der).map_err(|_| CryptoError::InvalidKey)?),
        })
    }

    /// Encode the private key as PKCS8 DER.
    pub fn to_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let der = self
            .key
            .to_pkcs8_der()
            .map_err(|_| RsaError::CreatePrivateKey)?;
        Ok(Zeroizing::new(der.as_bytes().to_vec()))
    }

    /// Derives the public key from the private key.
    pub fn to_public_key(&self) -> AsymmetricPublicCryptoKey {
        AsymmetricPublicCryptoKey {
            key: self.key.to_public_key(),
        }
    }

    /// Wraps the private key with a symmetric key, usually the user key.
    pub fn wrap(&self, wrapping_key: &SymmetricCryptoKey) -> Result<EncString> {
        EncString::encrypt_with_symmetric_key(
            &self.to_der()?,
            ContentFormat::Pkcs8PrivateKey,
            wrapping_key,
        )
    }

    /// Unwraps a private key wrapped by [AsymmetricCryptoKey::wrap].
    pub fn from_wrapped(wrapped: &EncString, wrapping_key: &SymmetricCryptoKey) -> Result<Self> {
        let der: Zeroizing<Vec<u8>> = Zeroizing::new(wrapped.decrypt_with_key(wrapping_key)?);
        Self::from_der(&der)
    }
}

impl CryptoKey for AsymmetricCryptoKey {}

// rsa::RsaPrivateKey zeroizes itself on drop
impl zeroize::ZeroizeOnDrop for AsymmetricCryptoKey {}

// We manually implement these to make sure we don't print any sensitive data
impl std::fmt::Debug for AsymmetricCryptoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsymmetricCryptoKey").finish()
    }
}
