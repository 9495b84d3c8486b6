//! The collaborators a key rotation depends on. Each is injected as an `Arc<dyn Trait>` through
//! [RotationServices].

use std::sync::Arc;

use async_trait::async_trait;
use bitwarden_crypto::{AsymmetricPublicCryptoKey, CryptoError, KeyStore};
use bitwarden_key_management::{
    api::{
        models::{
            EmergencyAccessType, EmergencyAccessWithIdRequestModel, EncryptedRecord,
            OtherDeviceKeysUpdateRequestModel, ResetPasswordWithOrgIdRequestModel,
            WebAuthnLoginRotateKeyRequestModel,
        },
        UserKeyRotationApi,
    },
    AccountKeyStorage, EmergencyAccessId, KeyIds, OrganizationId, SymmetricKeyId, UserId,
};
use thiserror::Error;

use super::trust::{TrustPrompt, TrustedPublicKeys, UntrustedKeyError};

/// Failure reported by an unlock method or owned data collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The collaborator was asked to encrypt to a public key the user did not confirm
    #[error(transparent)]
    UntrustedKey(#[from] UntrustedKeyError),
    /// Re-encryption failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// The collaborator could not load or process its data
    #[error("{0}")]
    Other(String),
}

/// The key store of a rotation run, holding the current and the new user key.
///
/// Collaborators re-encrypt through a read-only context on `store`. Contexts are not `Send` and
/// must be dropped before the next `.await`.
#[derive(Clone)]
pub struct RotationKeys {
    #[allow(missing_docs)]
    pub store: KeyStore<KeyIds>,
    /// The user key the account is currently encrypted with
    pub current_user_key: SymmetricKeyId,
    /// The user key the account is rotated to
    pub new_user_key: SymmetricKeyId,
}

/// An organization the user is enrolled in account recovery with.
#[derive(Debug, Clone)]
pub struct OrganizationMembership {
    #[allow(missing_docs)]
    pub organization_id: OrganizationId,
    /// Display name, shown when asking the user to trust the organization
    pub name: String,
    /// The organization's public key as reported by the server
    pub public_key: AsymmetricPublicCryptoKey,
}

/// An emergency contact the user granted access to.
#[derive(Debug, Clone)]
pub struct EmergencyAccessGrantee {
    #[allow(missing_docs)]
    pub id: EmergencyAccessId,
    /// Display name, shown when asking the user to trust the grantee
    pub name: String,
    /// The grantee's public key as reported by the server
    pub public_key: AsymmetricPublicCryptoKey,
    /// Whether the grantee may view or take over the account
    pub access_type: EmergencyAccessType,
    /// Days the grantee waits after requesting access
    pub wait_time_days: i32,
}

/// Organization account recovery. The user key is encapsulated to each organization's
/// public key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrganizationRecoveryService: Send + Sync {
    /// The organizations whose public keys need to be trusted before rotating.
    async fn get_trusted_public_keys(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrganizationMembership>, ServiceError>;

    /// Re-share the new user key with every enrolled organization. Encapsulating to a key not in
    /// `trusted_keys` must fail.
    async fn get_rotated_unlock_data(
        &self,
        keys: &RotationKeys,
        trusted_keys: &TrustedPublicKeys<OrganizationId>,
        user_id: UserId,
    ) -> Result<Option<Vec<ResetPasswordWithOrgIdRequestModel>>, ServiceError>;
}

/// Emergency access. The user key is encapsulated to each grantee's public key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmergencyAccessService: Send + Sync {
    /// The grantees whose public keys need to be trusted before rotating.
    async fn get_trusted_public_keys(
        &self,
        user_id: UserId,
    ) -> Result<Vec<EmergencyAccessGrantee>, ServiceError>;

    /// Re-share the new user key with every confirmed grantee. Encapsulating to a key not in
    /// `trusted_keys` must fail.
    async fn get_rotated_unlock_data(
        &self,
        keys: &RotationKeys,
        trusted_keys: &TrustedPublicKeys<EmergencyAccessId>,
        user_id: UserId,
    ) -> Result<Option<Vec<EmergencyAccessWithIdRequestModel>>, ServiceError>;
}

/// Passkeys with the PRF extension that can unlock the account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PasskeyUnlockService: Send + Sync {
    #[allow(missing_docs)]
    async fn get_rotated_unlock_data(
        &self,
        keys: &RotationKeys,
        user_id: UserId,
    ) -> Result<Option<Vec<WebAuthnLoginRotateKeyRequestModel>>, ServiceError>;
}

/// Devices trusted to unlock the account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceTrustService: Send + Sync {
    #[allow(missing_docs)]
    async fn get_rotated_unlock_data(
        &self,
        keys: &RotationKeys,
        user_id: UserId,
    ) -> Result<Option<Vec<OtherDeviceKeysUpdateRequestModel>>, ServiceError>;
}

/// The result of re-encrypting one kind of owned data.
#[derive(Debug, Clone)]
pub enum RotatedOwnedData {
    /// Every record, re-encrypted under the new user key. May be empty.
    Available(Vec<EncryptedRecord>),
    /// The data could not be obtained. This aborts the rotation, since committing without it
    /// would leave records encrypted with a key the server no longer accepts.
    Unavailable,
}

/// A kind of data owned by the user, such as ciphers, folders or sends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OwnedDataService: Send + Sync {
    #[allow(missing_docs)]
    async fn get_rotated_data(
        &self,
        keys: &RotationKeys,
        user_id: UserId,
    ) -> Result<RotatedOwnedData, ServiceError>;
}

/// Local sync state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncService: Send + Sync {
    /// Whether the client has completed at least one full sync for `user_id`.
    async fn has_completed_full_sync(&self, user_id: UserId) -> bool;
}

/// Session management.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Log out every session of `user_id`, on every device.
    async fn log_out_all_sessions(&self, user_id: UserId);
}

/// Every collaborator of a key rotation.
#[derive(Clone)]
pub struct RotationServices {
    #[allow(missing_docs)]
    pub key_storage: Arc<dyn AccountKeyStorage>,
    #[allow(missing_docs)]
    pub api: Arc<dyn UserKeyRotationApi>,
    #[allow(missing_docs)]
    pub sync: Arc<dyn SyncService>,
    #[allow(missing_docs)]
    pub session: Arc<dyn SessionService>,
    #[allow(missing_docs)]
    pub trust_prompt: Arc<dyn TrustPrompt>,
    #[allow(missing_docs)]
    pub organization_recovery: Arc<dyn OrganizationRecoveryService>,
    #[allow(missing_docs)]
    pub emergency_access: Arc<dyn EmergencyAccessService>,
    #[allow(missing_docs)]
    pub passkeys: Arc<dyn PasskeyUnlockService>,
    #[allow(missing_docs)]
    pub trusted_devices: Arc<dyn DeviceTrustService>,
    /// Vault items
    pub ciphers: Arc<dyn OwnedDataService>,
    #[allow(missing_docs)]
    pub folders: Arc<dyn OwnedDataService>,
    #[allow(missing_docs)]
    pub sends: Arc<dyn OwnedDataService>,
}
