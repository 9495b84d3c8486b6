use std::num::NonZeroU32;

use bitwarden_crypto::{CryptoError, EncString, Kdf, KeyStoreContext, MasterKey};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    api::models::{KdfType, MasterPasswordUnlockKdfModel, MasterPasswordUnlockResponseModel},
    require, KeyIds, MissingFieldError, SymmetricKeyId,
};

/// Error for master password related operations.
#[derive(Debug, thiserror::Error)]
pub enum MasterPasswordError {
    /// The wrapped encryption key could not be parsed because the encstring is malformed
    #[error("Wrapped encryption key is malformed")]
    EncryptionKeyMalformed,
    /// The KDF data could not be parsed, because it has an invalid value
    #[error("KDF is malformed")]
    KdfMalformed,
    /// The master password does not unlock the master-key-wrapped user key
    #[error("Wrong password")]
    WrongPassword,
    /// The wrapped encryption key or salt fields are missing or KDF data is incomplete
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),
    /// Key derivation or wrapping failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Represents the data required to unlock with the master password.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MasterPasswordUnlockData {
    /// The key derivation function used to derive the master key
    pub kdf: Kdf,
    /// The master key wrapped user key
    pub master_key_wrapped_user_key: EncString,
    /// The salt used in the KDF, typically the user's email
    pub salt: String,
}

impl MasterPasswordUnlockData {
    /// Derive the master key from `password` and wrap the user key held in `ctx` under
    /// `user_key` with it.
    #[instrument(skip(password, ctx), err)]
    pub fn derive(
        password: &str,
        kdf: &Kdf,
        salt: &str,
        user_key: SymmetricKeyId,
        ctx: &KeyStoreContext<KeyIds>,
    ) -> Result<Self, MasterPasswordError> {
        let master_key = MasterKey::derive(password, salt, kdf)?;
        Ok(Self {
            kdf: kdf.clone(),
            master_key_wrapped_user_key: ctx
                .wrap_symmetric_key_with_master_key(&master_key, user_key)?,
            salt: salt.to_owned(),
        })
    }

    /// Unwrap the user key into `ctx` with the master key derived from `password`, returning
    /// the local id it was stored under.
    ///
    /// Fails with [MasterPasswordError::WrongPassword] when the password does not match.
    #[instrument(skip_all, err)]
    pub fn unwrap_to_context(
        &self,
        password: &str,
        ctx: &mut KeyStoreContext<KeyIds>,
    ) -> Result<SymmetricKeyId, MasterPasswordError> {
        let master_key = MasterKey::derive(password, &self.salt, &self.kdf)?;
        self.unwrap_with_master_key(&master_key, ctx)
    }

    /// Unwrap the user key and produce the authentication data for `password` from a single
    /// master key derivation.
    #[instrument(skip_all, err)]
    pub fn unlock_and_authenticate(
        &self,
        password: &str,
        ctx: &mut KeyStoreContext<KeyIds>,
    ) -> Result<(SymmetricKeyId, MasterPasswordAuthenticationData), MasterPasswordError> {
        let master_key = MasterKey::derive(password, &self.salt, &self.kdf)?;
        let user_key = self.unwrap_with_master_key(&master_key, ctx)?;
        let authentication_data = MasterPasswordAuthenticationData::from_master_key(
            &master_key,
            password,
            &self.kdf,
            &self.salt,
        )?;
        Ok((user_key, authentication_data))
    }

    fn unwrap_with_master_key(
        &self,
        master_key: &MasterKey,
        ctx: &mut KeyStoreContext<KeyIds>,
    ) -> Result<SymmetricKeyId, MasterPasswordError> {
        ctx.unwrap_symmetric_key_with_master_key(master_key, &self.master_key_wrapped_user_key)
            .map_err(|_| MasterPasswordError::WrongPassword)
    }
}

impl TryFrom<&MasterPasswordUnlockResponseModel> for MasterPasswordUnlockData {
    type Error = MasterPasswordError;

    fn try_from(response: &MasterPasswordUnlockResponseModel) -> Result<Self, Self::Error> {
        let response = response.clone();

        let kdf = Kdf::try_from(&response.kdf)?;
        let master_key_encrypted_user_key = require!(response.master_key_encrypted_user_key);
        let salt = require!(response.salt);

        Ok(MasterPasswordUnlockData {
            kdf,
            master_key_wrapped_user_key: master_key_encrypted_user_key
                .parse()
                .map_err(|_| MasterPasswordError::EncryptionKeyMalformed)?,
            salt,
        })
    }
}

impl TryFrom<&MasterPasswordUnlockData> for MasterPasswordUnlockResponseModel {
    type Error = MasterPasswordError;

    fn try_from(data: &MasterPasswordUnlockData) -> Result<Self, Self::Error> {
        Ok(MasterPasswordUnlockResponseModel {
            kdf: MasterPasswordUnlockKdfModel::try_from(&data.kdf)?,
            master_key_encrypted_user_key: Some(data.master_key_wrapped_user_key.to_string()),
            salt: Some(data.salt.clone()),
        })
    }
}

/// Represents the data required to authenticate with the master password.
#[derive(Debug, Clone)]
pub struct MasterPasswordAuthenticationData {
    /// The key derivation function used to derive the master key
    pub kdf: Kdf,
    /// The salt used in the KDF, typically the user's email
    pub salt: String,
    /// The hash sent to the server to prove knowledge of the master password
    pub master_password_authentication_hash: String,
}

impl MasterPasswordAuthenticationData {
    /// Derive the authentication hash for `password`.
    #[instrument(skip(password), err)]
    pub fn derive(password: &str, kdf: &Kdf, salt: &str) -> Result<Self, MasterPasswordError> {
        let master_key = MasterKey::derive(password, salt, kdf)?;
        Self::from_master_key(&master_key, password, kdf, salt)
    }

    fn from_master_key(
        master_key: &MasterKey,
        password: &str,
        kdf: &Kdf,
        salt: &str,
    ) -> Result<Self, MasterPasswordError> {
        Ok(Self {
            kdf: kdf.clone(),
            salt: salt.to_owned(),
            master_password_authentication_hash: master_key
                .derive_master_key_hash(password.as_bytes())?,
        })
    }
}

impl TryFrom<&MasterPasswordUnlockKdfModel> for Kdf {
    type Error = MasterPasswordError;

    fn try_from(kdf: &MasterPasswordUnlockKdfModel) -> Result<Self, Self::Error> {
        Ok(match kdf.kdf_type {
            KdfType::PBKDF2_SHA256 => Kdf::PBKDF2 {
                iterations: kdf_parse_nonzero_u32(kdf.iterations)?,
            },
            KdfType::Argon2id => Kdf::Argon2id {
                iterations: kdf_parse_nonzero_u32(kdf.iterations)?,
                memory: kdf_parse_nonzero_u32(require!(kdf.memory))?,
                parallelism: kdf_parse_nonzero_u32(require!(kdf.parallelism))?,
            },
        })
    }
}

impl TryFrom<&Kdf> for MasterPasswordUnlockKdfModel {
    type Error = MasterPasswordError;

    fn try_from(kdf: &Kdf) -> Result<Self, Self::Error> {
        Ok(match kdf {
            Kdf::PBKDF2 { iterations } => MasterPasswordUnlockKdfModel {
                kdf_type: KdfType::PBKDF2_SHA256,
                iterations: kdf_to_i32(*iterations)?,
                memory: None,
                parallelism: None,
            },
            Kdf::Argon2id {
                iterations,
                memory,
                parallelism,
            } => MasterPasswordUnlockKdfModel {
                kdf_type: KdfType::Argon2id,
                iterations: kdf_to_i32(*iterations)?,
                memory: Some(kdf_to_i32(*memory)?),
                parallelism: Some(kdf_to_i32(*parallelism)?),
            },
        })
    }
}

fn kdf_parse_nonzero_u32(value: impl TryInto<u32>) -> Result<NonZeroU32, MasterPasswordError> {
    value
        .try_into()
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or(MasterPasswordError::KdfMalformed)
}

fn kdf_to_i32(value: NonZeroU32) -> Result<i32, MasterPasswordError> {
    value
        .get()
        .try_into()
        .map_err(|_| MasterPasswordError::KdfMalformed)
}

#[cfg(test)]
mod tests {
    use bitwarden_crypto::{KeyStore, SymmetricKeyAlgorithm};

    use super::*;

    const TEST_SALT: &str = "test@example.com";
    const TEST_INVALID_USER_KEY: &str = "-1.8UClLa8IPE1iZT7chy5wzQ==|6PVfHnVk5S3XqEtQemnM5yb4JodxmPkkWzmDRdfyHtjORmvxqlLX40tBJZ+CKxQWmS8tpEB5w39rbgHg/gqs0haGdZG4cPbywsgGzxZ7uNI=";

    fn test_kdf() -> Kdf {
        Kdf::PBKDF2 {
            iterations: NonZeroU32::new(5000).unwrap(),
        }
    }

    fn pbkdf2_response(
        master_key_encrypted_user_key: Option<String>,
        salt: Option<String>,
        iterations: i32,
    ) -> MasterPasswordUnlockResponseModel {
        MasterPasswordUnlockResponseModel {
            kdf: MasterPasswordUnlockKdfModel {
                kdf_type: KdfType::PBKDF2_SHA256,
                iterations,
                memory: None,
                parallelism: None,
            },
            master_key_encrypted_user_key,
            salt,
        }
    }

    fn wrapped_user_key(algorithm: SymmetricKeyAlgorithm) -> String {
        let store: KeyStore<KeyIds> = KeyStore::default();
        let mut ctx = store.context();
        let user_key = ctx.make_symmetric_key(algorithm);
        MasterPasswordUnlockData::derive("password", &test_kdf(), TEST_SALT, user_key, &ctx)
            .unwrap()
            .master_key_wrapped_user_key
            .to_string()
    }

    fn argon2id_response(
        memory: Option<i32>,
        parallelism: Option<i32>,
    ) -> MasterPasswordUnlockResponseModel {
        let wrapped = wrapped_user_key(SymmetricKeyAlgorithm::Aes256CbcHmac);
        MasterPasswordUnlockResponseModel {
            kdf: MasterPasswordUnlockKdfModel {
                kdf_type: KdfType::Argon2id,
                iterations: 3,
                memory,
                parallelism,
            },
            master_key_encrypted_user_key: Some(wrapped),
            salt: Some(TEST_SALT.to_string()),
        }
    }

    #[test]
    fn test_derive_and_unwrap_user_key() {
        let store: KeyStore<KeyIds> = KeyStore::default();
        let mut ctx = store.context();
        let user_key = ctx.make_symmetric_key(SymmetricKeyAlgorithm::Aes256CbcHmac);
        let data =
            MasterPasswordUnlockData::derive("password", &test_kdf(), TEST_SALT, user_key, &ctx)
                .unwrap();

        let unwrapped = data.unwrap_to_context("password", &mut ctx).unwrap();
        assert!(ctx.symmetric_keys_match(unwrapped, user_key).unwrap());
        assert!(matches!(
            data.unwrap_to_context("wrong password", &mut ctx),
            Err(MasterPasswordError::WrongPassword)
        ));
    }

    #[test]
    fn test_unwrap_xchacha20_user_key() {
        let store: KeyStore<KeyIds> = KeyStore::default();
        let mut ctx = store.context();
        let user_key = ctx.make_symmetric_key(SymmetricKeyAlgorithm::XChaCha20Poly1305);
        let data =
            MasterPasswordUnlockData::derive("password", &test_kdf(), TEST_SALT, user_key, &ctx)
                .unwrap();

        let unwrapped = data.unwrap_to_context("password", &mut ctx).unwrap();
        assert_eq!(
            ctx.get_symmetric_key_algorithm(unwrapped).unwrap(),
            SymmetricKeyAlgorithm::XChaCha20Poly1305
        );
        assert!(ctx.symmetric_keys_match(unwrapped, user_key).unwrap());
    }

    #[test]
    fn test_unlock_and_authenticate_matches_separate_derivations() {
        let store: KeyStore<KeyIds> = KeyStore::default();
        let mut ctx = store.context();
        let user_key = ctx.make_symmetric_key(SymmetricKeyAlgorithm::XChaCha20Poly1305);
        let data =
            MasterPasswordUnlockData::derive("password", &test_kdf(), TEST_SALT, user_key, &ctx)
                .unwrap();

        let (unwrapped, authentication) =
            data.unlock_and_authenticate("password", &mut ctx).unwrap();

        assert!(ctx.symmetric_keys_match(unwrapped, user_key).unwrap());
        let expected =
            MasterPasswordAuthenticationData::derive("password", &test_kdf(), TEST_SALT).unwrap();
        assert_eq!(
            authentication.master_password_authentication_hash,
            expected.master_password_authentication_hash
        );
        assert_eq!(authentication.salt, TEST_SALT);
    }

    #[test]
    fn test_unlock_and_authenticate_wrong_password() {
        let store: KeyStore<KeyIds> = KeyStore::default();
        let mut ctx = store.context();
        let user_key = ctx.make_symmetric_key(SymmetricKeyAlgorithm::Aes256CbcHmac);
        let data =
            MasterPasswordUnlockData::derive("password", &test_kdf(), TEST_SALT, user_key, &ctx)
                .unwrap();

        assert!(matches!(
            data.unlock_and_authenticate("wrong password", &mut ctx),
            Err(MasterPasswordError::WrongPassword)
        ));
    }

    #[test]
    fn test_authentication_hash_depends_on_password() {
        let a =
            MasterPasswordAuthenticationData::derive("password", &test_kdf(), TEST_SALT).unwrap();
        let b =
            MasterPasswordAuthenticationData::derive("password", &test_kdf(), TEST_SALT).unwrap();
        let c =
            MasterPasswordAuthenticationData::derive("password2", &test_kdf(), TEST_SALT).unwrap();

        assert_eq!(
            a.master_password_authentication_hash,
            b.master_password_authentication_hash
        );
        assert_ne!(
            a.master_password_authentication_hash,
            c.master_password_authentication_hash
        );
    }

    #[test]
    fn test_authentication_hash_vector() {
        let kdf = Kdf::PBKDF2 {
            iterations: NonZeroU32::new(600_000).unwrap(),
        };
        let data =
            MasterPasswordAuthenticationData::derive("asdfasdf", &kdf, "test@bitwarden.com")
                .unwrap();
        assert_eq!(
            data.master_password_authentication_hash,
            "l0j2NrfATaQS7IyFlGBFN83wWcrTOcriYjNJbo+VC2M="
        );
    }

    #[test]
    fn test_try_from_response_pbkdf2_success() {
        let wrapped = wrapped_user_key(SymmetricKeyAlgorithm::Aes256CbcHmac);
        let response = pbkdf2_response(Some(wrapped.clone()), Some(TEST_SALT.to_string()), 600_000);

        let data = MasterPasswordUnlockData::try_from(&response).unwrap();

        if let Kdf::PBKDF2 { iterations } = data.kdf {
            assert_eq!(iterations.get(), 600_000);
        } else {
            panic!("Expected PBKDF2 KDF")
        }
        assert_eq!(data.salt, TEST_SALT);
        assert_eq!(data.master_key_wrapped_user_key.to_string(), wrapped);
    }

    #[test]
    fn test_try_from_response_argon2id_success() {
        let data =
            MasterPasswordUnlockData::try_from(&argon2id_response(Some(64), Some(4))).unwrap();

        if let Kdf::Argon2id {
            iterations,
            memory,
            parallelism,
        } = data.kdf
        {
            assert_eq!(iterations.get(), 3);
            assert_eq!(memory.get(), 64);
            assert_eq!(parallelism.get(), 4);
        } else {
            panic!("Expected Argon2id KDF")
        }
    }

    #[test]
    fn test_try_from_response_invalid_user_key() {
        let response = pbkdf2_response(
            Some(TEST_INVALID_USER_KEY.to_string()),
            Some(TEST_SALT.to_string()),
            600_000,
        );

        assert!(matches!(
            MasterPasswordUnlockData::try_from(&response),
            Err(MasterPasswordError::EncryptionKeyMalformed)
        ));
    }

    #[test]
    fn test_try_from_response_missing_fields() {
        let response = pbkdf2_response(None, Some(TEST_SALT.to_string()), 600_000);
        assert!(matches!(
            MasterPasswordUnlockData::try_from(&response),
            Err(MasterPasswordError::MissingField(MissingFieldError(
                "response.master_key_encrypted_user_key"
            )))
        ));

        let response = pbkdf2_response(Some(TEST_INVALID_USER_KEY.to_string()), None, 600_000);
        assert!(matches!(
            MasterPasswordUnlockData::try_from(&response),
            Err(MasterPasswordError::MissingField(MissingFieldError(
                "response.salt"
            )))
        ));

        assert!(matches!(
            MasterPasswordUnlockData::try_from(&argon2id_response(None, Some(4))),
            Err(MasterPasswordError::MissingField(MissingFieldError(
                "kdf.memory"
            )))
        ));
        assert!(matches!(
            MasterPasswordUnlockData::try_from(&argon2id_response(Some(64), None)),
            Err(MasterPasswordError::MissingField(MissingFieldError(
                "kdf.parallelism"
            )))
        ));
    }

    #[test]
    fn test_try_from_response_zero_values_are_malformed() {
        let response = pbkdf2_response(None, Some(TEST_SALT.to_string()), 0);
        assert!(matches!(
            MasterPasswordUnlockData::try_from(&response),
            Err(MasterPasswordError::KdfMalformed)
        ));
        assert!(matches!(
            MasterPasswordUnlockData::try_from(&argon2id_response(Some(0), Some(4))),
            Err(MasterPasswordError::KdfMalformed)
        ));
        assert!(matches!(
            MasterPasswordUnlockData::try_from(&argon2id_response(Some(64), Some(0))),
            Err(MasterPasswordError::KdfMalformed)
        ));
        assert!(matches!(
            MasterPasswordUnlockData::try_from(&argon2id_response(Some(64), Some(-1))),
            Err(MasterPasswordError::KdfMalformed)
        ));
    }

    #[test]
    fn test_kdf_model_conversion() {
        let kdf = Kdf::Argon2id {
            iterations: NonZeroU32::new(3).unwrap(),
            memory: NonZeroU32::new(64).unwrap(),
            parallelism: NonZeroU32::new(4).unwrap(),
        };
        let model = MasterPasswordUnlockKdfModel::try_from(&kdf).unwrap();
        assert_eq!(model.kdf_type, KdfType::Argon2id);
        assert_eq!(model.memory, Some(64));
        assert_eq!(Kdf::try_from(&model).unwrap(), kdf);
    }
}
