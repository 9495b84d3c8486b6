use std::fmt::Debug;

use thiserror::Error;

use crate::SymmetricKeyAlgorithm;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("The provided key is not the expected type")]
    InvalidKey,
    #[error("The cipher's MAC doesn't match the expected value")]
    InvalidMac,
    #[error("The key provided expects mac protected encstrings, but the mac is missing")]
    MacNotProvided,
    #[error("Error while decrypting EncString")]
    KeyDecrypt,
    #[error("The cipher key has an invalid length")]
    InvalidKeyLen,
    #[error("The value is not a valid UTF8 String")]
    InvalidUtf8String,
    #[error("The key algorithm {0:?} can not be used for this operation")]
    WrongKeyType(SymmetricKeyAlgorithm),
    #[error("The encrypted message was created for a different key id")]
    WrongCoseKeyId,
    #[error("Invalid nonce length")]
    InvalidNonceLength,
    #[error("Missing Key for Id: {0}")]
    MissingKeyId(String),
    #[error("The key store is read-only")]
    ReadOnlyKeyStore,
    #[error("The KDF settings are out of range")]
    InvalidKdfSettings,

    #[error("EncString error, {0}")]
    EncString(#[from] EncStringParseError),

    #[error("Rsa error, {0}")]
    Rsa(#[from] RsaError),

    #[error("Signature error, {0}")]
    Signature(#[from] SignatureError),

    #[error("Encoding error, {0}")]
    Encoding(#[from] EncodingError),

    #[error("Argon2 error, {0}")]
    Argon(#[from] argon2::Error),

    #[error("Number is zero")]
    ZeroNumber,
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum EncStringParseError {
    #[error("No type detected, missing '.' separator")]
    NoType,
    #[error("Invalid symmetric type, got type {enc_type} with {parts} parts")]
    InvalidTypeSymm { enc_type: String, parts: usize },
    #[error("Invalid asymmetric type, got type {enc_type} with {parts} parts")]
    InvalidTypeAsymm { enc_type: String, parts: usize },
    #[error("Error decoding base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("Invalid length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("Invalid encoding {0:?}")]
    InvalidCoseEncoding(coset::CoseError),
    #[error("Algorithm missing in COSE header")]
    CoseMissingAlgorithm,
    #[error("Content type missing in COSE header")]
    CoseMissingContentType,
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum RsaError {
    #[error("Unable to create public key")]
    CreatePublicKey,
    #[error("Unable to create private key")]
    CreatePrivateKey,
    #[error("Rsa error, {0}")]
    Rsa(#[from] rsa::Error),
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("The signature does not match the signed data")]
    InvalidSignature,
    #[error("Unknown signing namespace {0}")]
    UnknownNamespace(i64),
    #[error("The signed object carries no signing namespace")]
    MissingNamespace,
    #[error("The signed object was created for namespace {got:?}, expected {expected:?}")]
    InvalidNamespace {
        expected: crate::SigningNamespace,
        got: crate::SigningNamespace,
    },
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("Invalid cbor serialization")]
    InvalidCborSerialization,
    #[error("Invalid base64 encoding")]
    InvalidBase64Encoding,
    #[error("Invalid cose encoding")]
    InvalidCoseEncoding,
    #[error("Missing value {0}")]
    MissingValue(&'static str),
}

/// Alias for `Result<T, CryptoError>`.
pub(crate) type Result<T, E = CryptoError> = std::result::Result<T, E>;
