use std::{fmt::Display, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::Oaep;
use serde::Deserialize;
use sha1::Sha1;
use zeroize::Zeroizing;

use super::{from_b64_vec, split_enc_string};
use crate::{
    error::{CryptoError, EncStringParseError, Result, RsaError},
    AsymmetricCryptoKey, AsymmetricPublicCryptoKey, KeyIds, KeyStoreContext, SymmetricCryptoKey,
};

/// # Encrypted string primitive
///
/// [UnsignedSharedKey] is a Bitwarden specific primitive that represents an asymmetrically
/// encapsulated symmetric key. The encapsulation carries no sender authentication, so whoever
/// decapsulates it must decide on their own whether to trust the contained key.
///
/// ## Serialization
///
/// [UnsignedSharedKey] implements [Display] and [FromStr] and is represented as
/// `[type].[data]`, where `[type]` is `4` for RSA-2048-OAEP-SHA1 and `[data]` is the base64
/// encoded ciphertext.
#[derive(Clone, PartialEq, Eq)]
#[allow(unused, non_camel_case_types, missing_docs)]
pub enum UnsignedSharedKey {
    /// 4
    Rsa2048_OaepSha1_B64 { data: Vec<u8> },
}

// We manually implement these to make sure we don't print any sensitive data
impl std::fmt::Debug for UnsignedSharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnsignedSharedKey")
            .field("type", &self.enc_type())
            .finish()
    }
}

/// Deserializes an [UnsignedSharedKey] from a string.
impl FromStr for UnsignedSharedKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (enc_type, parts) = split_enc_string(s)?;
        match (enc_type, parts.len()) {
            ("4", 1) => {
                let data = from_b64_vec(parts[0])?;
                Ok(UnsignedSharedKey::Rsa2048_OaepSha1_B64 { data })
            }
            (enc_type, parts) => Err(EncStringParseError::InvalidTypeAsymm {
                enc_type: enc_type.to_string(),
                parts,
            }
            .into()),
        }
    }
}

impl Display for UnsignedSharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnsignedSharedKey::Rsa2048_OaepSha1_B64 { data } => {
                write!(f, "{}.{}", self.enc_type(), STANDARD.encode(data))
            }
        }
    }
}

impl<'de> Deserialize<'de> for UnsignedSharedKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for UnsignedSharedKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl UnsignedSharedKey {
    /// Encapsulate a symmetric key, to be shared asymmetrically. Produces a
    /// [UnsignedSharedKey::Rsa2048_OaepSha1_B64] variant. Note, this does not sign the data
    /// and thus does not guarantee sender authenticity.
    pub fn encapsulate_key_unsigned(
        encapsulated_key: &SymmetricCryptoKey,
        encapsulation_key: &AsymmetricPublicCryptoKey,
    ) -> Result<UnsignedSharedKey> {
        let mut rng = rand::thread_rng();
        let encoded = encapsulated_key.to_encoded()?;

        let data = encapsulation_key
            .key
            .encrypt(&mut rng, Oaep::new::<Sha1>(), &encoded)
            .map_err(RsaError::Rsa)?;

        Ok(UnsignedSharedKey::Rsa2048_OaepSha1_B64 { data })
    }

    /// Encapsulates the symmetric key with id `shared_key` from the context for the holder of
    /// `encapsulation_key`.
    pub fn encapsulate<Ids: KeyIds>(
        shared_key: Ids::Symmetric,
        encapsulation_key: &AsymmetricPublicCryptoKey,
        ctx: &KeyStoreContext<Ids>,
    ) -> Result<UnsignedSharedKey> {
        Self::encapsulate_key_unsigned(ctx.get_symmetric_key(shared_key)?, encapsulation_key)
    }

    /// Decapsulates the shared key with the private key with id `decapsulation_key`, and stores it
    /// in the context under a new local id.
    pub fn decapsulate<Ids: KeyIds>(
        &self,
        decapsulation_key: Ids::Asymmetric,
        ctx: &mut KeyStoreContext<Ids>,
    ) -> Result<Ids::Symmetric> {
        let key = self.decapsulate_key_unsigned(ctx.get_asymmetric_key(decapsulation_key)?)?;
        Ok(ctx.add_local_symmetric_key(key))
    }

    /// The numerical representation of the encryption type of the [UnsignedSharedKey].
    const fn enc_type(&self) -> u8 {
        match self {
            UnsignedSharedKey::Rsa2048_OaepSha1_B64 { .. } => 4,
        }
    }

    /// Decapsulate a symmetric key, shared asymmetrically.
    /// Note: The shared key does not have any sender authentication.
    pub fn decapsulate_key_unsigned(
        &self,
        decapsulation_key: &AsymmetricCryptoKey,
    ) -> Result<SymmetricCryptoKey> {
        match self {
            UnsignedSharedKey::Rsa2048_OaepSha1_B64 { data } => {
                let mut key_data = Zeroizing::new(
                    decapsulation_key
                        .key
                        .decrypt(Oaep::new::<Sha1>(), data)
                        .map_err(|_| CryptoError::KeyDecrypt)?,
                );
                SymmetricCryptoKey::try_from(key_data.as_mut_slice())
            }
        }
    }
}
