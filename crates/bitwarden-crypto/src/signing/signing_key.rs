use ciborium::{value::Integer, Value};
use coset::{
    iana::{Algorithm, EllipticCurve, EnumI64, KeyOperation, KeyType, OkpKeyParameter},
    CborSerializable, CoseKey, RegisteredLabel, RegisteredLabelWithPrivate,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::cose::{ed25519_signing_key, ed25519_verifying_key, key_id};
use crate::{
    error::{EncodingError, Result, SignatureError},
    keys::{key_id::KeyId, CryptoKey},
    ContentFormat, CryptoError, EncString, KeyDecryptable, SymmetricCryptoKey,
};

/// The signature algorithms supported by [SigningKey] and [VerifyingKey]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// Ed25519 (EdDSA over Curve25519)
    Ed25519,
}

/// A signing key is a private key used for signing data. An associated `VerifyingKey` can be
/// derived from it.
#[derive(Clone)]
pub struct SigningKey {
    pub(super) id: KeyId,
    // ed25519_dalek::SigningKey zeroizes itself on drop
    inner: Box<ed25519_dalek::SigningKey>,
}

impl zeroize::ZeroizeOnDrop for SigningKey {}
impl CryptoKey for SigningKey {}

// We manually implement these to make sure we don't print any sensitive data
impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

impl SigningKey {
    /// Makes a new signing key for the given signature scheme.
    pub fn make(algorithm: SignatureAlgorithm) -> Self {
        match algorithm {
            SignatureAlgorithm::Ed25519 => SigningKey {
                id: KeyId::make(),
                inner: Box::new(ed25519_dalek::SigningKey::generate(&mut rand::thread_rng())),
            },
        }
    }

    /// The signature scheme of this key
    pub fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Ed25519
    }

    pub(super) fn cose_algorithm(&self) -> Algorithm {
        Algorithm::EdDSA
    }

    /// Derives the verifying key from the signing key. The key id is the same for the signing and
    /// verifying key, since they are a pair.
    pub fn to_verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            id: self.id.clone(),
            inner: self.inner.verifying_key(),
        }
    }

    /// Signs the given byte array with the signing key.
    /// This should not be used directly other than for generating namespace separated signed
    /// objects.
    pub(super) fn sign_raw(&self, data: &[u8]) -> Vec<u8> {
        use ed25519_dalek::Signer;
        self.inner.sign(data).to_bytes().to_vec()
    }

    /// Serializes the signing key to a COSE key.
    pub fn to_cose(&self) -> Result<Zeroizing<Vec<u8>>> {
        let cose_key = coset::CoseKeyBuilder::new_okp_key()
            .key_id((&self.id).into())
            .algorithm(Algorithm::EdDSA)
            .param(
                OkpKeyParameter::D.to_i64(), // Signing key
                Value::Bytes(self.inner.to_bytes().into()),
            )
            .param(
                OkpKeyParameter::Crv.to_i64(), // Elliptic curve identifier
                Value::Integer(Integer::from(EllipticCurve::Ed25519.to_i64())),
            )
            .add_key_op(KeyOperation::Sign)
            .add_key_op(KeyOperation::Verify)
            .build();
        Ok(Zeroizing::new(
            cose_key
                .to_vec()
                .map_err(|_| EncodingError::InvalidCoseEncoding)?,
        ))
    }

    /// Deserializes a COSE key into a signing key.
    pub fn from_cose(bytes: &[u8]) -> Result<Self> {
        let cose_key =
            CoseKey::from_slice(bytes).map_err(|_| EncodingError::InvalidCoseEncoding)?;

        match (&cose_key.alg, &cose_key.kty) {
            (
                Some(RegisteredLabelWithPrivate::Assigned(Algorithm::EdDSA)),
                RegisteredLabel::Assigned(KeyType::OKP),
            ) => Ok(SigningKey {
                id: key_id(&cose_key)?,
                inner: Box::new(ed25519_signing_key(&cose_key)?),
            }),
            _ => Err(CryptoError::InvalidKey),
        }
    }

    /// Wraps the signing key with a symmetric key, for storage next to the rest of the
    /// account's wrapped key material.
    pub fn wrap(&self, wrapping_key: &SymmetricCryptoKey) -> Result<EncString> {
        EncString::encrypt_with_symmetric_key(
            &self.to_cose()?,
            ContentFormat::CoseKey,
            wrapping_key,
        )
    }

    /// Unwraps a signing key wrapped by [SigningKey::wrap].
    pub fn from_wrapped(wrapped: &EncString, wrapping_key: &SymmetricCryptoKey) -> Result<Self> {
        let cose_key: Zeroizing<Vec<u8>> = Zeroizing::new(wrapped.decrypt_with_key(wrapping_key)?);
        Self::from_cose(&cose_key)
    }
}

/// A verifying key is a public key used for verifying signatures. It can be published to other
/// users, who can use it to verify that messages were signed by the holder of the corresponding
/// `SigningKey`.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    pub(super) id: KeyId,
    inner: ed25519_dalek::VerifyingKey,
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyingKey")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

impl VerifyingKey {
    /// The signature scheme of this key
    pub fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Ed25519
    }

    /// Serializes the verifying key to a COSE key.
    pub fn to_cose(&self) -> Result<Vec<u8>> {
        coset::CoseKeyBuilder::new_okp_key()
            .key_id((&self.id).into())
            .algorithm(Algorithm::EdDSA)
            .param(
                OkpKeyParameter::Crv.to_i64(), // Elliptic curve identifier
                Value::Integer(Integer::from(EllipticCurve::Ed25519.to_i64())),
            )
            // Note: X does not refer to the X coordinate of the public key curve point, but
            // to the verifying key (signature public key), as represented by the curve spec. In
            // the case of Ed25519, this is the compressed Y coordinate. This was ill-defined in
            // earlier drafts of the standard. https://www.rfc-editor.org/rfc/rfc9053.html#name-octet-key-pair
            .param(
                OkpKeyParameter::X.to_i64(), // Verifying key (digital signature public key)
                Value::Bytes(self.inner.to_bytes().to_vec()),
            )
            .add_key_op(KeyOperation::Verify)
            .build()
            .to_vec()
            .map_err(|_| EncodingError::InvalidCoseEncoding.into())
    }

    /// Deserializes a COSE key into a verifying key.
    pub fn from_cose(bytes: &[u8]) -> Result<Self> {
        let cose_key =
            CoseKey::from_slice(bytes).map_err(|_| EncodingError::InvalidCoseEncoding)?;

        match (&cose_key.alg, &cose_key.kty) {
            (
                Some(RegisteredLabelWithPrivate::Assigned(Algorithm::EdDSA)),
                RegisteredLabel::Assigned(KeyType::OKP),
            ) => Ok(VerifyingKey {
                id: key_id(&cose_key)?,
                inner: ed25519_verifying_key(&cose_key)?,
            }),
            _ => Err(CryptoError::InvalidKey),
        }
    }

    /// Verifies a raw signature over the given data. Uses strict verification, rejecting
    /// malleable and small-order signatures.
    pub(super) fn verify_raw(&self, signature: &[u8], data: &[u8]) -> Result<()> {
        let signature = ed25519_dalek::Signature::from_slice(signature)
            .map_err(|_| SignatureError::InvalidSignature)?;
        self.inner
            .verify_strict(data, &signature)
            .map_err(|_| SignatureError::InvalidSignature.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_raw() {
        let signing_key = SigningKey::make(SignatureAlgorithm::Ed25519);
        let verifying_key = signing_key.to_verifying_key();

        let signature = signing_key.sign_raw(b"Test message");
        verifying_key.verify_raw(&signature, b"Test message").unwrap();
        assert!(verifying_key.verify_raw(&signature, b"Other message").is_err());
    }

    #[test]
    fn test_cose_roundtrip_keeps_key_id() {
        let signing_key = SigningKey::make(SignatureAlgorithm::Ed25519);
        let parsed = SigningKey::from_cose(&signing_key.to_cose().unwrap()).unwrap();
        assert_eq!(parsed.id, signing_key.id);
        assert_eq!(parsed.to_verifying_key(), signing_key.to_verifying_key());

        let verifying_key = signing_key.to_verifying_key();
        let parsed = VerifyingKey::from_cose(&verifying_key.to_cose().unwrap()).unwrap();
        assert_eq!(verifying_key, parsed);
    }

    #[test]
    fn test_verifying_key_is_not_a_signing_key() {
        let verifying_key = SigningKey::make(SignatureAlgorithm::Ed25519).to_verifying_key();
        assert!(SigningKey::from_cose(&verifying_key.to_cose().unwrap()).is_err());
        assert!(VerifyingKey::from_cose(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_wrap_unwrap_signing_key() {
        let wrapping_key = SymmetricCryptoKey::make_xchacha20_poly1305_key();
        let signing_key = SigningKey::make(SignatureAlgorithm::Ed25519);

        let wrapped = signing_key.wrap(&wrapping_key).unwrap();
        let (_, content_format) = wrapped.decrypt_with_content_format(&wrapping_key).unwrap();
        assert_eq!(content_format, Some(ContentFormat::CoseKey));

        let unwrapped = SigningKey::from_wrapped(&wrapped, &wrapping_key).unwrap();
        assert_eq!(
            signing_key.to_verifying_key(),
            unwrapped.to_verifying_key()
        );

        let other_key = SymmetricCryptoKey::make_xchacha20_poly1305_key();
        assert!(SigningKey::from_wrapped(&wrapped, &other_key).is_err());
    }
}
