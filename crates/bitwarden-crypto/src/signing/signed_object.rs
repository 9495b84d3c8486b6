use std::{fmt::Display, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine};
use ciborium::value::Integer;
use coset::{iana::CoapContentFormat, CborSerializable};
use serde::{de::DeserializeOwned, Serialize};

use super::{
    cose::{content_type, namespace},
    SigningKey, SigningNamespace, VerifyingKey,
};
use crate::{
    cose::SIGNING_NAMESPACE,
    error::{EncodingError, Result, SignatureError},
    CryptoError,
};

/// A signed object is a message containing a payload and signature that attests the payload's
/// integrity and authenticity for a specific namespace and signature key. In order to gain
/// access to the payload, the caller must provide the correct namespace and verifying key,
/// ensuring that the caller cannot forget to validate the signature before using the payload.
///
/// Encoded as a COSE_Sign1 message. The namespace is a private-use label of the protected header,
/// so it is covered by the signature.
#[derive(Clone, PartialEq)]
pub struct SignedObject(pub(crate) coset::CoseSign1);

impl SigningKey {
    /// Signs the given payload with the signing key, under a given namespace.
    /// The payload is CBOR serialized before signing.
    pub fn sign<Message: Serialize>(
        &self,
        message: &Message,
        namespace: &SigningNamespace,
    ) -> Result<SignedObject> {
        let mut payload = Vec::new();
        ciborium::into_writer(message, &mut payload)
            .map_err(|_| EncodingError::InvalidCborSerialization)?;

        let cose_sign1 = coset::CoseSign1Builder::new()
            .protected(
                coset::HeaderBuilder::new()
                    .algorithm(self.cose_algorithm())
                    .key_id((&self.id).into())
                    .content_format(CoapContentFormat::Cbor)
                    .value(
                        SIGNING_NAMESPACE,
                        ciborium::Value::Integer(Integer::from(namespace.as_i64())),
                    )
                    .build(),
            )
            .payload(payload)
            .create_signature(&[], |pt| self.sign_raw(pt))
            .build();
        Ok(SignedObject(cose_sign1))
    }
}

impl SignedObject {
    /// Verifies the signature of the signed object and returns the deserialized payload, if the
    /// signature is valid and was created for `namespace`.
    pub fn verify_and_unwrap<Message: DeserializeOwned>(
        &self,
        verifying_key: &VerifyingKey,
        namespace: &SigningNamespace,
    ) -> Result<Message> {
        let Some(_alg) = &self.0.protected.header.alg else {
            return Err(SignatureError::InvalidSignature.into());
        };

        let signature_namespace = self.namespace()?;
        if signature_namespace != *namespace {
            return Err(SignatureError::InvalidNamespace {
                expected: *namespace,
                got: signature_namespace,
            }
            .into());
        }

        if content_type(&self.0.protected)? != CoapContentFormat::Cbor {
            return Err(EncodingError::InvalidCborSerialization.into());
        }

        self.0
            .verify_signature(&[], |sig, data| verifying_key.verify_raw(sig, data))?;

        let payload = self
            .0
            .payload
            .as_ref()
            .ok_or(EncodingError::MissingValue("payload"))?;
        ciborium::from_reader(payload.as_slice())
            .map_err(|_| EncodingError::InvalidCborSerialization.into())
    }

    /// The namespace the object claims to be signed for. Not authenticated until
    /// [SignedObject::verify_and_unwrap] succeeds.
    pub fn namespace(&self) -> Result<SigningNamespace> {
        namespace(&self.0.protected)
    }

    /// Serializes the signed object to a COSE_Sign1 message.
    pub fn to_cose(&self) -> Result<Vec<u8>> {
        self.0
            .clone()
            .to_vec()
            .map_err(|_| EncodingError::InvalidCoseEncoding.into())
    }

    /// Parses a COSE_Sign1 message serialized by [SignedObject::to_cose].
    pub fn from_cose(bytes: &[u8]) -> Result<Self> {
        let cose_sign1 =
            coset::CoseSign1::from_slice(bytes).map_err(|_| EncodingError::InvalidCoseEncoding)?;
        Ok(SignedObject(cose_sign1))
    }
}

impl std::fmt::Debug for SignedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedObject")
            .field("namespace", &self.namespace().ok())
            .finish()
    }
}

impl Display for SignedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.to_cose().map_err(|_| std::fmt::Error)?;
        write!(f, "{}", STANDARD.encode(bytes))
    }
}

impl FromStr for SignedObject {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|_| EncodingError::InvalidBase64Encoding)?;
        Self::from_cose(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::SignatureAlgorithm;

    const SIGNING_KEY: &[u8] = &[
        166, 1, 1, 2, 80, 91, 154, 106, 83, 253, 98, 76, 188, 129, 226, 105, 158, 216, 103, 155,
        16, 3, 39, 4, 130, 1, 2, 35, 88, 32, 114, 65, 45, 133, 77, 188, 130, 57, 89, 250, 113, 125,
        108, 138, 255, 68, 3, 202, 189, 96, 31, 218, 197, 24, 35, 127, 52, 168, 232, 85, 95, 199,
        32, 6,
    ];
    const VERIFYING_KEY: &[u8] = &[
        166, 1, 1, 2, 80, 91, 154, 106, 83, 253, 98, 76, 188, 129, 226, 105, 158, 216, 103, 155,
        16, 3, 39, 4, 129, 2, 32, 6, 33, 88, 32, 91, 255, 95, 169, 53, 21, 222, 134, 102, 103, 105,
        224, 58, 210, 82, 121, 141, 60, 76, 68, 9, 26, 242, 215, 111, 150, 228, 154, 141, 143, 108,
        38,
    ];
    const SIGNED_OBJECT: &[u8] = &[
        132, 88, 30, 164, 1, 39, 3, 24, 60, 4, 80, 91, 154, 106, 83, 253, 98, 76, 188, 129, 226,
        105, 158, 216, 103, 155, 16, 58, 0, 1, 56, 127, 32, 160, 85, 161, 102, 102, 105, 101, 108,
        100, 49, 108, 84, 101, 115, 116, 32, 109, 101, 115, 115, 97, 103, 101, 88, 64, 110, 91, 1,
        209, 74, 57, 108, 168, 211, 218, 58, 247, 112, 21, 205, 127, 120, 156, 192, 98, 81, 243,
        61, 167, 248, 236, 19, 115, 168, 62, 57, 170, 232, 138, 219, 159, 68, 193, 144, 100, 168,
        10, 173, 145, 72, 179, 236, 78, 94, 9, 135, 117, 153, 135, 126, 30, 70, 111, 109, 235, 85,
        247, 99, 14,
    ];

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct TestMessage {
        field1: String,
    }

    fn test_message() -> TestMessage {
        TestMessage {
            field1: "Test message".to_string(),
        }
    }

    #[test]
    fn test_vectors() {
        let signing_key = SigningKey::from_cose(SIGNING_KEY).unwrap();
        let verifying_key = VerifyingKey::from_cose(VERIFYING_KEY).unwrap();
        let signed_object = SignedObject::from_cose(SIGNED_OBJECT).unwrap();

        assert_eq!(signing_key.to_cose().unwrap().as_slice(), SIGNING_KEY);
        assert_eq!(verifying_key.to_cose().unwrap(), VERIFYING_KEY);
        assert_eq!(signed_object.to_cose().unwrap(), SIGNED_OBJECT);
        assert_eq!(signed_object.namespace().unwrap(), SigningNamespace::Test);

        let payload: TestMessage = signed_object
            .verify_and_unwrap(&verifying_key, &SigningNamespace::Test)
            .unwrap();
        assert_eq!(payload, test_message());

        // Ed25519 signatures are deterministic
        let resigned = signing_key
            .sign(&test_message(), &SigningNamespace::Test)
            .unwrap();
        assert_eq!(resigned.to_cose().unwrap(), SIGNED_OBJECT);
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let signing_key = SigningKey::make(SignatureAlgorithm::Ed25519);
        let verifying_key = signing_key.to_verifying_key();

        let signed = signing_key
            .sign(&test_message(), &SigningNamespace::Test)
            .unwrap();
        let parsed: SignedObject = signed.to_string().parse().unwrap();

        let payload: TestMessage = parsed
            .verify_and_unwrap(&verifying_key, &SigningNamespace::Test)
            .unwrap();
        assert_eq!(payload, test_message());
    }

    #[test]
    fn test_wrong_namespace_is_rejected() {
        let signing_key = SigningKey::make(SignatureAlgorithm::Ed25519);
        let signed = signing_key
            .sign(&"payload".to_string(), &SigningNamespace::SecurityState)
            .unwrap();

        let result: Result<String> = signed.verify_and_unwrap(
            &signing_key.to_verifying_key(),
            &SigningNamespace::SignedPublicKey,
        );
        assert!(matches!(
            result,
            Err(CryptoError::Signature(SignatureError::InvalidNamespace { .. }))
        ));
    }

    #[test]
    fn test_other_verifying_key_is_rejected() {
        let signing_key = SigningKey::make(SignatureAlgorithm::Ed25519);
        let other_key = SigningKey::make(SignatureAlgorithm::Ed25519);
        let signed = signing_key
            .sign(&"payload".to_string(), &SigningNamespace::Test)
            .unwrap();

        let result: Result<String> =
            signed.verify_and_unwrap(&other_key.to_verifying_key(), &SigningNamespace::Test);
        assert!(matches!(
            result,
            Err(CryptoError::Signature(SignatureError::InvalidSignature))
        ));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let signing_key = SigningKey::make(SignatureAlgorithm::Ed25519);
        let mut signed = signing_key
            .sign(&"payload".to_string(), &SigningNamespace::Test)
            .unwrap();
        let payload = signed.0.payload.as_mut().unwrap();
        let last = payload.len() - 1;
        payload[last] ^= 1;

        let result: Result<String> =
            signed.verify_and_unwrap(&signing_key.to_verifying_key(), &SigningNamespace::Test);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_namespace_is_rejected() {
        let signing_key = SigningKey::make(SignatureAlgorithm::Ed25519);
        let cose_sign1 = coset::CoseSign1Builder::new()
            .protected(
                coset::HeaderBuilder::new()
                    .algorithm(coset::iana::Algorithm::EdDSA)
                    .content_format(CoapContentFormat::Cbor)
                    .build(),
            )
            .payload(vec![0x60])
            .create_signature(&[], |pt| signing_key.sign_raw(pt))
            .build();

        let result: Result<String> = SignedObject(cose_sign1)
            .verify_and_unwrap(&signing_key.to_verifying_key(), &SigningNamespace::Test);
        assert!(matches!(
            result,
            Err(CryptoError::Signature(SignatureError::MissingNamespace))
        ));
    }
}
