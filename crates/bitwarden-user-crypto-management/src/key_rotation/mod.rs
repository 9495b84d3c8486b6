//! Rotation of the user key, optionally upgrading the account to the V2 key hierarchy.
//!
//! A rotation replaces the user key and re-encrypts everything downstream of it: the account
//! keys, every unlock method and all owned data. The server has no transactions across these, so
//! every fallible step runs locally first and the result is committed in a single request. Until
//! that request succeeds nothing has changed, neither on the server nor locally.
//!
//! The run proceeds as follows:
//! 1. Preconditions: a current password was given and the client has synced at least once.
//! 2. Trust: the user confirms the public keys of organizations and emergency contacts. A decline
//!    ends the run quietly.
//! 3. State read: the account cryptographic state is loaded and the current password verified.
//! 4. Key generation: a new user key, and for upgrades a new signing key and security state.
//! 5. Re-encryption of unlock methods and owned data, concurrently.
//! 6. Commit, authenticated with the current password.
//! 7. Every session of the account is logged out.

mod crypto;
mod data;
mod partial_rotateable_keyset;
mod services;
mod trust;
mod unlock;

#[cfg(test)]
pub(crate) mod fakes;

use bitwarden_crypto::{CryptoError, KeyStore, SymmetricCryptoKey};
use bitwarden_key_management::{
    api::models::RotateUserAccountKeysAndDataRequestModel, AccountCryptographicVersion,
    AccountCryptographyInitializationError, ApiError, CryptographicStateReader, KeyIds,
    MasterPasswordError, StateReadError, SymmetricKeyId, UpgradePolicy, UserId,
};
pub use data::reencrypt_records;
pub use partial_rotateable_keyset::PartialRotateableKeyset;
use serde::{Deserialize, Serialize};
pub use services::{
    DeviceTrustService, EmergencyAccessGrantee, EmergencyAccessService, OrganizationMembership,
    OrganizationRecoveryService, OwnedDataService, PasskeyUnlockService, RotatedOwnedData,
    RotationKeys, RotationServices, ServiceError, SessionService, SyncService,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
pub use trust::{
    TrustDecision, TrustPrompt, TrustSubject, TrustVerification, TrustVerifier, TrustedPublicKeys,
    UntrustedKeyError,
};
pub use unlock::{reshare_to_emergency_access, reshare_to_organizations};

use crate::key_rotation::{
    crypto::{make_rotated_user_key, rotate_account_cryptographic_state},
    data::reencrypt_data,
    unlock::{reencrypt_unlock, unlock_method_error, MasterPasswordRotation},
};

/// A key rotation that also changes the master password.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateUserKeysRequest {
    /// The current master password
    pub old_password: String,
    /// The new master password
    pub password: String,
    /// The new master password hint
    pub hint: Option<String>,
}

// Passwords must never end up in logs
impl std::fmt::Debug for RotateUserKeysRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotateUserKeysRequest")
            .field("hint", &self.hint.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl RotateUserKeysRequest {
    /// Checks the request before anything else happens.
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.password.trim().is_empty() {
            return Err(ValidationError::BlankNewPassword);
        }
        Ok(())
    }
}

/// Settings for a key rotation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RotationSettings {
    /// Check the sync state again right before committing. The trust prompts can take
    /// arbitrarily long, and the client may have been logged out and reset in the meantime.
    pub recheck_sync_before_commit: bool,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            recheck_sync_before_commit: true,
        }
    }
}

/// The keys after a successful rotation.
#[derive(Debug, Clone)]
pub struct RotatedUserKeys {
    /// The new user key. The server has accepted it, so the session layer should switch to it.
    pub user_key: SymmetricCryptoKey,
    /// The account's key hierarchy version after the rotation
    pub version: AccountCryptographicVersion,
}

/// How a key rotation run ended, if it did not fail.
#[derive(Debug, Clone)]
pub enum RotationOutcome {
    /// The server accepted the rotation and every session has been logged out.
    Rotated(RotatedUserKeys),
    /// The user declined to trust a public key. Nothing was generated or sent.
    TrustDenied,
}

/// The request is invalid. Checked before any I/O.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[allow(missing_docs)]
    #[error("The new master password must not be blank")]
    BlankNewPassword,
}

/// A condition for starting the rotation does not hold.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[allow(missing_docs)]
    #[error("The current master password is required")]
    MissingCurrentPassword,
    /// Rotating without a full sync would drop data the client has never seen
    #[error("The client has not completed a full sync")]
    NeverSynced,
    /// The account's key material could not be read
    #[error(transparent)]
    AccountState(#[from] StateReadError),
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum RotateUserKeysError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("The {0} could not be obtained for re-encryption")]
    ReencryptionUnavailable(&'static str),
    #[error("The server rejected the key rotation: {0}")]
    CommitRejected(#[source] ApiError),
    /// The current master password did not verify
    #[error("The current master password is incorrect")]
    Cancelled,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    AccountKeys(#[from] AccountCryptographyInitializationError),
    #[error(transparent)]
    MasterPassword(#[from] MasterPasswordError),
    #[error(transparent)]
    UntrustedKey(#[from] UntrustedKeyError),
    #[error("Failed to rotate the {method} unlock data: {source}")]
    UnlockMethod {
        method: &'static str,
        #[source]
        source: ServiceError,
    },
    #[error("Failed to re-encrypt {kind}: {source}")]
    OwnedData {
        kind: &'static str,
        #[source]
        source: ServiceError,
    },
    #[error("A key rotation is already in progress")]
    RotationInProgress,
}

async fn ensure_synced(
    services: &RotationServices,
    user_id: UserId,
) -> Result<(), PreconditionError> {
    if services.sync.has_completed_full_sync(user_id).await {
        Ok(())
    } else {
        warn!("Client has never completed a full sync");
        Err(PreconditionError::NeverSynced)
    }
}

/// Runs a key rotation with a master password change. The request must already be validated.
#[instrument(name = "rotate_user_keys", skip(services, settings, request), err)]
pub(crate) async fn rotate_user_keys(
    user_id: UserId,
    services: &RotationServices,
    upgrade_policy: UpgradePolicy,
    settings: &RotationSettings,
    request: RotateUserKeysRequest,
) -> Result<RotationOutcome, RotateUserKeysError> {
    if request.old_password.is_empty() {
        return Err(PreconditionError::MissingCurrentPassword.into());
    }
    ensure_synced(services, user_id).await?;

    info!("Verifying trust in third-party public keys");
    let (organizations, emergency_contacts) = tokio::try_join!(
        async {
            services
                .organization_recovery
                .get_trusted_public_keys(user_id)
                .await
                .map_err(unlock_method_error("organization account recovery"))
        },
        async {
            services
                .emergency_access
                .get_trusted_public_keys(user_id)
                .await
                .map_err(unlock_method_error("emergency access"))
        },
    )?;
    let (trusted_organizations, trusted_emergency_access) =
        match TrustVerifier::new(services.trust_prompt.clone())
            .verify(&organizations, &emergency_contacts)
            .await?
        {
            TrustVerification::Approved {
                organizations,
                emergency_access,
            } => (organizations, emergency_access),
            TrustVerification::Denied => {
                info!("Key rotation cancelled, the user did not trust all public keys");
                return Ok(RotationOutcome::TrustDenied);
            }
        };

    // The keys of this run live in their own store, which is zeroized when the run ends
    let store: KeyStore<KeyIds> = KeyStore::default();
    let account = CryptographicStateReader::new(services.key_storage.clone())
        .read(user_id, &store)
        .await
        .map_err(PreconditionError::from)?;

    let (rotated_state, account_keys, old_authentication_data) = {
        let mut ctx = store.context_mut();
        let (unlocked_user_key, old_authentication_data) = match account
            .master_password_unlock
            .unlock_and_authenticate(&request.old_password, &mut ctx)
        {
            Ok(unlocked) => unlocked,
            Err(MasterPasswordError::WrongPassword) => {
                info!("Current master password did not verify");
                return Err(RotateUserKeysError::Cancelled);
            }
            Err(e) => return Err(e.into()),
        };
        if !ctx.symmetric_keys_match(unlocked_user_key, SymmetricKeyId::User)? {
            warn!("Master password unlocks a different user key than the active one");
            return Err(PreconditionError::AccountState(StateReadError::WrongUserKey).into());
        }

        info!(?upgrade_policy, "Rotating account cryptographic state");
        let new_user_key =
            make_rotated_user_key(&account.wrapped_state, upgrade_policy, &mut ctx);
        ctx.persist_symmetric_key(new_user_key, SymmetricKeyId::RotatedUser)?;
        let (rotated_state, account_keys) = rotate_account_cryptographic_state(
            &account.wrapped_state,
            &SymmetricKeyId::User,
            &SymmetricKeyId::RotatedUser,
            user_id,
            &mut ctx,
        )?;
        (rotated_state, account_keys, old_authentication_data)
    };
    let keys = RotationKeys {
        store: store.clone(),
        current_user_key: SymmetricKeyId::User,
        new_user_key: SymmetricKeyId::RotatedUser,
    };
    let master_password_unlock = &account.master_password_unlock;

    info!("Re-encrypting unlock methods and account data");
    let (account_unlock_data, account_data) = tokio::try_join!(
        reencrypt_unlock(
            services,
            MasterPasswordRotation {
                password: &request.password,
                hint: request.hint.clone(),
                kdf: &master_password_unlock.kdf,
                salt: &master_password_unlock.salt,
            },
            &trusted_organizations,
            &trusted_emergency_access,
            &keys,
            user_id,
        ),
        reencrypt_data(services, &keys, user_id),
    )?;

    let commit = RotateUserAccountKeysAndDataRequestModel {
        old_master_key_authentication_hash: old_authentication_data
            .master_password_authentication_hash,
        account_keys,
        account_unlock_data,
        account_data,
    };

    // Taken out before committing, so a successful commit cannot be followed by a failure
    #[allow(deprecated)]
    let new_user_key = store
        .context()
        .dangerous_get_symmetric_key(SymmetricKeyId::RotatedUser)?
        .clone();

    if settings.recheck_sync_before_commit {
        debug!("Re-checking sync state before committing");
        ensure_synced(services, user_id).await?;
    }

    info!("Posting rotated user account keys and data to server");
    services
        .api
        .rotate_user_account_keys(&commit)
        .await
        .map_err(RotateUserKeysError::CommitRejected)?;
    info!("Successfully rotated user account keys and data");

    services.session.log_out_all_sessions(user_id).await;

    Ok(RotationOutcome::Rotated(RotatedUserKeys {
        user_key: new_user_key,
        version: rotated_state.version(),
    }))
}
