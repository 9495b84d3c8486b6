//! Reads the account cryptographic state from key storage into a key store.

use std::sync::Arc;

use async_trait::async_trait;
use bitwarden_crypto::{
    AsymmetricPublicCryptoKey, CryptoError, EncString, KeyStore, SignedPublicKey,
    SymmetricCryptoKey,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    api::models::MasterPasswordUnlockResponseModel, AccountCryptographicVersion,
    AccountCryptographyInitializationError, AsymmetricKeyId, KeyIds, MasterPasswordError,
    MasterPasswordUnlockData, SignedSecurityState, UserId, WrappedAccountCryptographicState,
};

/// The key material of an account as held by key storage. Every field is optional, storage
/// returns what it has.
#[derive(Debug, Clone, Default)]
pub struct StoredAccountKeys {
    /// The active user key
    pub user_key: Option<SymmetricCryptoKey>,
    /// The private key, wrapped by the user key
    pub wrapped_private_key: Option<EncString>,
    /// The public key, if stored separately from the private key
    pub public_key: Option<AsymmetricPublicCryptoKey>,
    /// The signing key, wrapped by the user key. Only version 2 accounts have one.
    pub wrapped_signing_key: Option<EncString>,
    /// The public key signed by the signing key
    pub signed_public_key: Option<SignedPublicKey>,
    /// The signed security state
    pub signed_security_state: Option<SignedSecurityState>,
    /// The master password unlock data in the form the server returned it on the last sync.
    /// Users without a master password have none.
    pub master_password_unlock: Option<MasterPasswordUnlockResponseModel>,
}

impl StoredAccountKeys {
    /// The storage content for a wrapped account state, its user key and its master password
    /// unlock data.
    pub fn from_state(
        user_key: SymmetricCryptoKey,
        state: &WrappedAccountCryptographicState,
        master_password_unlock: &MasterPasswordUnlockData,
    ) -> Result<Self, MasterPasswordError> {
        let mut keys = StoredAccountKeys {
            user_key: Some(user_key),
            master_password_unlock: Some(MasterPasswordUnlockResponseModel::try_from(
                master_password_unlock,
            )?),
            ..Default::default()
        };
        match state {
            WrappedAccountCryptographicState::V1 { private_key } => {
                keys.wrapped_private_key = Some(private_key.clone());
            }
            WrappedAccountCryptographicState::V2 {
                private_key,
                signed_public_key,
                signing_key,
                security_state,
            } => {
                keys.wrapped_private_key = Some(private_key.clone());
                keys.signed_public_key = signed_public_key.clone();
                keys.wrapped_signing_key = Some(signing_key.clone());
                keys.signed_security_state = Some(security_state.clone());
            }
        }
        Ok(keys)
    }
}

/// Key storage for an account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountKeyStorage: Send + Sync {
    /// Load the stored key material of `user_id`.
    async fn get_account_keys(&self, user_id: UserId) -> StoredAccountKeys;
}

/// Errors from reading the account cryptographic state.
#[derive(Debug, Error)]
pub enum StateReadError {
    /// Required key material is not available
    #[error("Key material is incomplete: {0} is missing")]
    IncompleteKeyMaterial(&'static str),
    /// The user key algorithm does not match the account version
    #[error("The encryption type of the user key does not match the account cryptographic state")]
    WrongUserKeyType,
    /// The wrapped keys do not decrypt under the user key
    #[error("Wrong user key")]
    WrongUserKey,
    /// A signature did not verify, or stored keys contradict each other
    #[error("Signature verification failed or stored keys do not match")]
    TamperedData,
    /// The key store passed to the reader already holds account keys
    #[error("The key store is already initialized with account keys")]
    KeyStoreAlreadyInitialized,
    /// The stored master password unlock data is malformed
    #[error(transparent)]
    MasterPassword(#[from] MasterPasswordError),
    /// A generic cryptographic error occurred
    #[error("A generic cryptographic error occurred: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<AccountCryptographyInitializationError> for StateReadError {
    fn from(err: AccountCryptographyInitializationError) -> Self {
        match err {
            AccountCryptographyInitializationError::WrongUserKeyType => {
                StateReadError::WrongUserKeyType
            }
            AccountCryptographyInitializationError::WrongUserKey => StateReadError::WrongUserKey,
            AccountCryptographyInitializationError::CorruptData
            | AccountCryptographyInitializationError::TamperedData => StateReadError::TamperedData,
            AccountCryptographyInitializationError::KeyStoreAlreadyInitialized => {
                StateReadError::KeyStoreAlreadyInitialized
            }
            AccountCryptographyInitializationError::GenericCrypto(e) => StateReadError::Crypto(e),
        }
    }
}

/// The result of reading an account's key material. The keys themselves are in the key store
/// passed to [CryptographicStateReader::read].
#[derive(Debug, Clone)]
pub struct AccountState {
    /// The version of the account's key hierarchy
    pub version: AccountCryptographicVersion,
    /// The wrapped state exactly as held by storage
    pub wrapped_state: WrappedAccountCryptographicState,
    /// The data to unlock, and re-derive, the master password
    pub master_password_unlock: MasterPasswordUnlockData,
}

/// Determines the account's key hierarchy version and loads its key material.
pub struct CryptographicStateReader {
    storage: Arc<dyn AccountKeyStorage>,
}

impl CryptographicStateReader {
    #[allow(missing_docs)]
    pub fn new(storage: Arc<dyn AccountKeyStorage>) -> Self {
        Self { storage }
    }

    /// Read the current cryptographic state of `user_id` into `store`.
    ///
    /// A stored signing key marks a version 2 account. On success the store holds the user key,
    /// the private key and, for version 2 accounts, the signing key in their global slots. On
    /// failure nothing is left in the store. Storage is never written.
    #[instrument(skip(self, store), err)]
    pub async fn read(
        &self,
        user_id: UserId,
        store: &KeyStore<KeyIds>,
    ) -> Result<AccountState, StateReadError> {
        let keys = self.storage.get_account_keys(user_id).await;

        let user_key = keys
            .user_key
            .ok_or(StateReadError::IncompleteKeyMaterial("user key"))?;
        let private_key = keys
            .wrapped_private_key
            .ok_or(StateReadError::IncompleteKeyMaterial("private key"))?;

        let wrapped_state = match keys.wrapped_signing_key {
            Some(signing_key) => WrappedAccountCryptographicState::V2 {
                private_key,
                signed_public_key: keys.signed_public_key,
                signing_key,
                security_state: keys
                    .signed_security_state
                    .ok_or(StateReadError::IncompleteKeyMaterial("security state"))?,
            },
            None => WrappedAccountCryptographicState::V1 { private_key },
        };
        info!(version = ?wrapped_state.version(), "Read account cryptographic state");

        let master_password_unlock = MasterPasswordUnlockData::try_from(
            keys.master_password_unlock
                .as_ref()
                .ok_or(StateReadError::IncompleteKeyMaterial(
                    "master password unlock data",
                ))?,
        )?;

        let mut ctx = store.context_mut();
        let user_key = ctx.add_local_symmetric_key(user_key);
        wrapped_state.set_to_context(user_key, &mut ctx)?;

        match keys.public_key {
            Some(public_key)
                if public_key != ctx.get_public_key(AsymmetricKeyId::UserPrivateKey)? =>
            {
                warn!("Stored public key does not match the private key");
                drop(ctx);
                store.clear();
                return Err(StateReadError::TamperedData);
            }
            Some(_) => {}
            None => debug!("No public key stored, using the key derived from the private key"),
        }

        Ok(AccountState {
            version: wrapped_state.version(),
            wrapped_state,
            master_password_unlock,
        })
    }
}
