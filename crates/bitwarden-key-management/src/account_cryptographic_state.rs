//! User account cryptographic state
//!
//! This module contains initialization and unwrapping of the user account cryptographic state.
//! The user account cryptographic state contains keys and cryptographic objects unlocked by
//! the user-key, or protected by keys unlocked by the user-key.
//!
//! V1 users have only a private key protected by an AES256-CBC-HMAC user key.
//! V2 users have a private key, a signing key, a signed public key and a signed security state,
//! all protected by an XChaCha20-Poly1305 user key.
//!
//! The state only ever exists wrapped. Operating on it unwraps the keys into a
//! [KeyStoreContext], so no key material leaves the key store.

use base64::{engine::general_purpose::STANDARD, Engine};
use bitwarden_crypto::{
    CryptoError, EncString, KeyStoreContext, PublicKeyEncryptionAlgorithm, SignatureAlgorithm,
    SignedPublicKey, SymmetricKeyAlgorithm,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    api::models::{
        AccountKeysRequestModel, PublicKeyEncryptionKeyPairRequestModel, SecurityStateModel,
        SignatureKeyPairRequestModel,
    },
    AsymmetricKeyId, KeyIds, SecurityState, SignedSecurityState, SigningKeyId, SymmetricKeyId,
    UserId,
};

/// Errors that can occur during initialization of the account cryptographic state.
#[derive(Debug, Error)]
pub enum AccountCryptographyInitializationError {
    /// The encryption algorithm from the user key does not match one of the encrypted items.
    /// This would mean that the user's account is corrupt.
    #[error("The encryption type of the user key does not match the account cryptographic state")]
    WrongUserKeyType,
    /// The provide user-key is incorrect or out-of-date. This may happen when a use-key changed
    /// and a local unlock-method is not yet updated.
    #[error("Wrong user key")]
    WrongUserKey,
    /// The decrypted data is corrupt.
    #[error("Decryption succeeded but produced corrupt data")]
    CorruptData,
    /// The decrypted data is corrupt.
    #[error("Signature or mac verification failed, the data may have been tampered with")]
    TamperedData,
    /// The key store already contains account keys.
    #[error("The key store is already initialized with account keys")]
    KeyStoreAlreadyInitialized,
    /// A generic cryptographic error occurred.
    #[error("A generic cryptographic error occurred: {0}")]
    GenericCrypto(CryptoError),
}

impl From<CryptoError> for AccountCryptographyInitializationError {
    fn from(err: CryptoError) -> Self {
        AccountCryptographyInitializationError::GenericCrypto(err)
    }
}

/// The version of an account's key hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccountCryptographicVersion {
    /// AES256-CBC-HMAC user key and an encryption key pair
    V1,
    /// XChaCha20-Poly1305 user key, an encryption key pair, a signing key pair and a security
    /// state
    V2,
}

/// Any keys / cryptographic protection "downstream" from the account symmetric key (user key).
/// Private keys are protected by the user key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::large_enum_variant)]
pub enum WrappedAccountCryptographicState {
    /// A V1 user has only a private key.
    V1 {
        /// The user's encryption private key, wrapped by the user key.
        private_key: EncString,
    },
    /// A V2 user has a private key, a signing key, a signed public key and a signed security state.
    /// The SignedPublicKey ensures that others can verify the public key is claimed by an identity
    /// they want to share data to. The signed security state protects against cryptographic
    /// downgrades.
    V2 {
        /// The user's encryption private key, wrapped by the user key.
        private_key: EncString,
        /// The user's public-key for the private key, signed by the user's signing key.
        /// Note: This is optional for backwards compatibility with accounts created before the
        /// public key was signed.
        signed_public_key: Option<SignedPublicKey>,
        /// The user's signing key, wrapped by the user key.
        signing_key: EncString,
        /// The user's signed security state.
        security_state: SignedSecurityState,
    },
}

/// The context-local ids of the keys unwrapped from a [WrappedAccountCryptographicState].
struct UnwrappedKeyIds {
    private_key: AsymmetricKeyId,
    signing_key: Option<SigningKeyId>,
}

impl WrappedAccountCryptographicState {
    /// Creates a new V2 account cryptographic state with fresh keys. This does not change the
    /// global keys of the store, but the new user key is left in the context under the returned
    /// local id.
    pub fn make(
        ctx: &mut KeyStoreContext<KeyIds>,
        user_id: UserId,
    ) -> Result<(SymmetricKeyId, Self), AccountCryptographyInitializationError> {
        let user_key = ctx.make_symmetric_key(SymmetricKeyAlgorithm::XChaCha20Poly1305);
        let private_key = ctx.make_private_key(PublicKeyEncryptionAlgorithm::RsaOaepSha1)?;
        let signing_key = ctx.make_signing_key(SignatureAlgorithm::Ed25519);
        let signed_public_key = ctx.make_signed_public_key(private_key, signing_key)?;
        let security_state = SecurityState::initialize_for_user(user_id).sign(signing_key, ctx)?;

        Ok((
            user_key,
            WrappedAccountCryptographicState::V2 {
                private_key: ctx.wrap_private_key(user_key, private_key)?,
                signed_public_key: Some(signed_public_key),
                signing_key: ctx.wrap_signing_key(user_key, signing_key)?,
                security_state,
            },
        ))
    }

    /// Set the decrypted account cryptographic state to the context's global keys. `user_key`
    /// is the id of the user key in the context, usually a local key. The context must have been
    /// created with write access.
    pub fn set_to_context(
        &self,
        user_key: SymmetricKeyId,
        ctx: &mut KeyStoreContext<KeyIds>,
    ) -> Result<(), AccountCryptographyInitializationError> {
        if ctx.has_symmetric_key(SymmetricKeyId::User)
            || ctx.has_asymmetric_key(AsymmetricKeyId::UserPrivateKey)
            || ctx.has_signing_key(SigningKeyId::UserSigningKey)
        {
            return Err(AccountCryptographyInitializationError::KeyStoreAlreadyInitialized);
        }

        let keys = self.unwrap_to_context(user_key, ctx)?;
        ctx.persist_asymmetric_key(keys.private_key, AsymmetricKeyId::UserPrivateKey)?;
        if let Some(signing_key) = keys.signing_key {
            ctx.persist_signing_key(signing_key, SigningKeyId::UserSigningKey)?;
        }
        ctx.persist_symmetric_key(user_key, SymmetricKeyId::User)?;
        Ok(())
    }

    /// Re-wraps the state from `current_user_key` to `new_user_key`. The algorithm of the new
    /// user key decides the version of the result:
    /// - an AES256-CBC-HMAC key keeps a V1 state at V1
    /// - an XChaCha20-Poly1305 key upgrades a V1 state to V2, with a new signing key and a new
    ///   security state
    /// - an XChaCha20-Poly1305 key keeps a V2 state's signing key and security state, and signs
    ///   the public key again
    ///
    /// The encryption key pair is kept in every case. A V2 state is never downgraded.
    pub fn rotate(
        &self,
        current_user_key: &SymmetricKeyId,
        new_user_key: &SymmetricKeyId,
        user_id: UserId,
        ctx: &mut KeyStoreContext<KeyIds>,
    ) -> Result<Self, AccountCryptographyInitializationError> {
        let keys = self.unwrap_to_context(*current_user_key, ctx)?;
        let new_algorithm = ctx.get_symmetric_key_algorithm(*new_user_key)?;
        let private_key = ctx.wrap_private_key(*new_user_key, keys.private_key)?;

        match (self, new_algorithm, keys.signing_key) {
            (
                WrappedAccountCryptographicState::V1 { .. },
                SymmetricKeyAlgorithm::Aes256CbcHmac,
                _,
            ) => {
                debug!("Rotating V1 account cryptographic state");
                Ok(WrappedAccountCryptographicState::V1 { private_key })
            }
            (
                WrappedAccountCryptographicState::V1 { .. },
                SymmetricKeyAlgorithm::XChaCha20Poly1305,
                _,
            ) => {
                info!("Upgrading account cryptographic state to V2");
                let signing_key = ctx.make_signing_key(SignatureAlgorithm::Ed25519);
                let signed_public_key =
                    ctx.make_signed_public_key(keys.private_key, signing_key)?;
                let security_state =
                    SecurityState::initialize_for_user(user_id).sign(signing_key, ctx)?;
                Ok(WrappedAccountCryptographicState::V2 {
                    private_key,
                    signed_public_key: Some(signed_public_key),
                    signing_key: ctx.wrap_signing_key(*new_user_key, signing_key)?,
                    security_state,
                })
            }
            (
                WrappedAccountCryptographicState::V2 { security_state, .. },
                SymmetricKeyAlgorithm::XChaCha20Poly1305,
                Some(signing_key),
            ) => {
                debug!("Rotating V2 account cryptographic state");
                Ok(WrappedAccountCryptographicState::V2 {
                    private_key,
                    signed_public_key: Some(
                        ctx.make_signed_public_key(keys.private_key, signing_key)?,
                    ),
                    signing_key: ctx.wrap_signing_key(*new_user_key, signing_key)?,
                    security_state: security_state.clone(),
                })
            }
            _ => Err(AccountCryptographyInitializationError::WrongUserKeyType),
        }
    }

    /// Converts to an [AccountKeysRequestModel] in order to make API requests. Since the state
    /// is wrapped, the context needs to contain the user key under `user_key`.
    pub fn to_request_model(
        &self,
        user_key: &SymmetricKeyId,
        ctx: &mut KeyStoreContext<KeyIds>,
    ) -> Result<AccountKeysRequestModel, AccountCryptographyInitializationError> {
        let keys = self.unwrap_to_context(*user_key, ctx)?;
        let public_key = STANDARD.encode(ctx.get_public_key(keys.private_key)?.to_der()?);

        let (wrapped_private_key, signed_public_key, signature_key_pair, security_state) =
            match (self, keys.signing_key) {
                (
                    WrappedAccountCryptographicState::V2 {
                        private_key,
                        signed_public_key,
                        signing_key: wrapped_signing_key,
                        security_state,
                    },
                    Some(signing_key),
                ) => {
                    let verifying_key = ctx.get_verifying_key(signing_key)?;
                    let security_version = security_state
                        .verify_and_unwrap(&verifying_key)
                        .map_err(|_| AccountCryptographyInitializationError::TamperedData)?
                        .version();
                    (
                        private_key.clone(),
                        signed_public_key.as_ref().map(SignedPublicKey::to_string),
                        Some(SignatureKeyPairRequestModel {
                            signature_algorithm: "ed25519".to_string(),
                            wrapped_signing_key: wrapped_signing_key.clone(),
                            verifying_key: STANDARD.encode(verifying_key.to_cose()?),
                        }),
                        Some(SecurityStateModel {
                            security_state: security_state.to_string(),
                            security_version: security_version
                                .try_into()
                                .map_err(|_| AccountCryptographyInitializationError::CorruptData)?,
                        }),
                    )
                }
                (WrappedAccountCryptographicState::V1 { private_key }, _)
                | (WrappedAccountCryptographicState::V2 { private_key, .. }, _) => {
                    (private_key.clone(), None, None, None)
                }
            };

        Ok(AccountKeysRequestModel {
            user_key_encrypted_account_private_key: wrapped_private_key.clone(),
            account_public_key: public_key.clone(),
            public_key_encryption_key_pair: PublicKeyEncryptionKeyPairRequestModel {
                wrapped_private_key,
                public_key,
                signed_public_key,
            },
            signature_key_pair,
            security_state,
        })
    }

    /// The version of the key hierarchy
    pub fn version(&self) -> AccountCryptographicVersion {
        match self {
            WrappedAccountCryptographicState::V1 { .. } => AccountCryptographicVersion::V1,
            WrappedAccountCryptographicState::V2 { .. } => AccountCryptographicVersion::V2,
        }
    }

    /// Unwraps the keys into context-local slots, checking that `user_key` matches the version
    /// and that every signature verifies.
    fn unwrap_to_context(
        &self,
        user_key: SymmetricKeyId,
        ctx: &mut KeyStoreContext<KeyIds>,
    ) -> Result<UnwrappedKeyIds, AccountCryptographyInitializationError> {
        match self {
            WrappedAccountCryptographicState::V1 { private_key } => {
                info!("Initializing V1 account cryptographic state");
                require_user_key_algorithm(user_key, SymmetricKeyAlgorithm::Aes256CbcHmac, ctx)?;

                let private_key = ctx
                    .unwrap_private_key(user_key, private_key)
                    .map_err(|_| AccountCryptographyInitializationError::WrongUserKey)?;
                Ok(UnwrappedKeyIds {
                    private_key,
                    signing_key: None,
                })
            }
            WrappedAccountCryptographicState::V2 {
                private_key,
                signed_public_key,
                signing_key,
                security_state,
            } => {
                info!("Initializing V2 account cryptographic state");
                require_user_key_algorithm(
                    user_key,
                    SymmetricKeyAlgorithm::XChaCha20Poly1305,
                    ctx,
                )?;

                let private_key = ctx
                    .unwrap_private_key(user_key, private_key)
                    .map_err(|_| AccountCryptographyInitializationError::WrongUserKey)?;
                let signing_key = ctx
                    .unwrap_signing_key(user_key, signing_key)
                    .map_err(|_| AccountCryptographyInitializationError::WrongUserKey)?;
                let verifying_key = ctx.get_verifying_key(signing_key)?;

                if let Some(signed_public_key) = signed_public_key {
                    let public_key = signed_public_key
                        .verify_and_unwrap(&verifying_key)
                        .map_err(|_| AccountCryptographyInitializationError::TamperedData)?;
                    if public_key != ctx.get_public_key(private_key)? {
                        return Err(AccountCryptographyInitializationError::CorruptData);
                    }
                } else {
                    debug!("V2 account has no signed public key");
                }

                security_state
                    .verify_and_unwrap(&verifying_key)
                    .map_err(|_| AccountCryptographyInitializationError::TamperedData)?;

                Ok(UnwrappedKeyIds {
                    private_key,
                    signing_key: Some(signing_key),
                })
            }
        }
    }
}

fn require_user_key_algorithm(
    user_key: SymmetricKeyId,
    expected: SymmetricKeyAlgorithm,
    ctx: &KeyStoreContext<KeyIds>,
) -> Result<(), AccountCryptographyInitializationError> {
    if ctx.get_symmetric_key_algorithm(user_key)? != expected {
        return Err(AccountCryptographyInitializationError::WrongUserKeyType);
    }
    Ok(())
}
