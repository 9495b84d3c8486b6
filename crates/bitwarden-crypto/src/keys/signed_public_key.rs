//! A public encryption key alone is not authenticated. It needs to be tied to a cryptographic
//! identity, which is provided by a signature keypair. This is done by signing the public key, and
//! requiring consumers to verify the public key before consumption by using verify_and_unwrap.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use super::AsymmetricPublicCryptoKey;
use crate::{CryptoError, SignedObject, SigningKey, SigningNamespace, VerifyingKey};

/// `PublicKeyEncryptionAlgorithms` defines the algorithms used for asymmetric encryption.
/// Currently, only RSA with OAEP and SHA-1 keys are used.
#[derive(Serialize, Deserialize)]
enum PublicKeyEncryptionAlgorithms {
    #[serde(rename = "0")]
    RsaOaepSha1 = 0,
}

/// `PublicKeyFormat` defines the format of the public key in a `SignedPublicKeyMessage`.
/// Currently, only ASN.1 Subject Public Key Info (SPKI) is used.
#[derive(Serialize, Deserialize)]
enum PublicKeyFormat {
    #[serde(rename = "0")]
    Spki = 0,
}

/// `SignedPublicKeyMessage` is a message that once signed, makes a claim towards owning a
/// public encryption key.
#[derive(Serialize, Deserialize)]
pub struct SignedPublicKeyMessage {
    /// The algorithm/crypto system used with this public key.
    #[serde(rename = "alg")]
    algorithm: PublicKeyEncryptionAlgorithms,
    /// The format of the public key.
    #[serde(rename = "format")]
    content_format: PublicKeyFormat,
    /// The public key, serialized and formatted in the content format specified in
    /// `content_format`.
    #[serde(rename = "key")]
    public_key: ByteBuf,
}

impl SignedPublicKeyMessage {
    /// Creates the message claiming ownership of `public_key`.
    pub fn from_public_key(public_key: &AsymmetricPublicCryptoKey) -> Result<Self, CryptoError> {
        Ok(SignedPublicKeyMessage {
            algorithm: PublicKeyEncryptionAlgorithms::RsaOaepSha1,
            content_format: PublicKeyFormat::Spki,
            public_key: ByteBuf::from(public_key.to_der()?),
        })
    }

    /// Signs the ownership claim with the account's signing key.
    pub fn sign(&self, signing_key: &SigningKey) -> Result<SignedPublicKey, CryptoError> {
        Ok(SignedPublicKey(
            signing_key.sign(self, &SigningNamespace::SignedPublicKey)?,
        ))
    }
}

/// `SignedPublicKey` is a public encryption key, signed by the owner of the encryption
/// keypair. This wrapping ensures that the consumer of the public key MUST verify the identity of
/// the Signer before they can use the public key for encryption.
#[derive(Clone, PartialEq, Debug)]
pub struct SignedPublicKey(pub(crate) SignedObject);

impl SignedPublicKey {
    /// Verifies the signature and returns the contained public key.
    pub fn verify_and_unwrap(
        &self,
        verifying_key: &VerifyingKey,
    ) -> Result<AsymmetricPublicCryptoKey, CryptoError> {
        let public_key_message: SignedPublicKeyMessage = self
            .0
            .verify_and_unwrap(verifying_key, &SigningNamespace::SignedPublicKey)?;
        match (
            public_key_message.algorithm,
            public_key_message.content_format,
        ) {
            (PublicKeyEncryptionAlgorithms::RsaOaepSha1, PublicKeyFormat::Spki) => Ok(
                AsymmetricPublicCryptoKey::from_der(&public_key_message.public_key.into_vec())
                    .map_err(|_| CryptoError::InvalidKey)?,
            ),
        }
    }
}

impl Display for SignedPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SignedPublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SignedPublicKey(s.parse()?))
    }
}

impl Serialize for SignedPublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SignedPublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AsymmetricCryptoKey, SignatureAlgorithm};

    #[test]
    fn test_signed_asymmetric_public_key() {
        let public_key = AsymmetricCryptoKey::make().unwrap().to_public_key();
        let signing_key = SigningKey::make(SignatureAlgorithm::Ed25519);
        let message = SignedPublicKeyMessage::from_public_key(&public_key).unwrap();
        let signed_public_key = message.sign(&signing_key).unwrap();

        let parsed: SignedPublicKey = signed_public_key.to_string().parse().unwrap();
        let verifying_key = signing_key.to_verifying_key();
        let verified_public_key = parsed.verify_and_unwrap(&verifying_key).unwrap();
        assert_eq!(
            public_key.to_der().unwrap(),
            verified_public_key.to_der().unwrap()
        );
    }

    #[test]
    fn test_signed_public_key_rejects_other_signer() {
        let public_key = AsymmetricCryptoKey::make().unwrap().to_public_key();
        let signing_key = SigningKey::make(SignatureAlgorithm::Ed25519);
        let signed_public_key = SignedPublicKeyMessage::from_public_key(&public_key)
            .unwrap()
            .sign(&signing_key)
            .unwrap();

        let other = SigningKey::make(SignatureAlgorithm::Ed25519).to_verifying_key();
        assert!(signed_public_key.verify_and_unwrap(&other).is_err());
    }

    #[test]
    fn test_signed_public_key_is_cose_sign1() {
        use base64::{engine::general_purpose::STANDARD, Engine};
        use coset::CborSerializable;

        let signing_key = SigningKey::make(SignatureAlgorithm::Ed25519);
        let public_key = AsymmetricCryptoKey::make().unwrap().to_public_key();
        let signed_public_key = SignedPublicKeyMessage::from_public_key(&public_key)
            .unwrap()
            .sign(&signing_key)
            .unwrap();

        let bytes = STANDARD.decode(signed_public_key.to_string()).unwrap();
        let cose_sign1 = coset::CoseSign1::from_slice(&bytes).unwrap();
        assert_eq!(
            cose_sign1.protected.header.alg,
            Some(coset::Algorithm::Assigned(coset::iana::Algorithm::EdDSA))
        );
    }
}
