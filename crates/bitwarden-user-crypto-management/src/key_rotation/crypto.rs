//! Generation of the rotated account cryptographic state.

use bitwarden_crypto::{KeyStoreContext, SymmetricKeyAlgorithm};
use bitwarden_key_management::{
    api::models::AccountKeysRequestModel, AccountCryptographyInitializationError, KeyIds,
    SymmetricKeyId, UpgradePolicy, UserId, WrappedAccountCryptographicState,
};
use tracing::{debug, info, instrument};

/// Generates the new user key into a context-local slot. Its algorithm decides the version the
/// account is rotated to: a V1 account stays on AES256-CBC-HMAC unless the policy upgrades it,
/// and a V2 account is never downgraded.
pub(super) fn make_rotated_user_key(
    current_state: &WrappedAccountCryptographicState,
    upgrade_policy: UpgradePolicy,
    ctx: &mut KeyStoreContext<KeyIds>,
) -> SymmetricKeyId {
    let algorithm = match (current_state, upgrade_policy) {
        (WrappedAccountCryptographicState::V1 { .. }, UpgradePolicy::KeepCurrentVersion) => {
            SymmetricKeyAlgorithm::Aes256CbcHmac
        }
        _ => SymmetricKeyAlgorithm::XChaCha20Poly1305,
    };
    debug!(?algorithm, "Generating new user key");
    ctx.make_symmetric_key(algorithm)
}

/// Rotates the account cryptographic state from `current_user_key_id` to `new_user_key_id` and
/// builds the account keys part of the rotation request.
///
/// The encryption key pair is kept in every case, so the account's public key does not change.
#[instrument(skip(current_state, ctx), fields(current_version = ?current_state.version()), err)]
pub(super) fn rotate_account_cryptographic_state(
    current_state: &WrappedAccountCryptographicState,
    current_user_key_id: &SymmetricKeyId,
    new_user_key_id: &SymmetricKeyId,
    user_id: UserId,
    ctx: &mut KeyStoreContext<KeyIds>,
) -> Result<
    (WrappedAccountCryptographicState, AccountKeysRequestModel),
    AccountCryptographyInitializationError,
> {
    let rotated = current_state.rotate(current_user_key_id, new_user_key_id, user_id, ctx)?;
    info!(new_version = ?rotated.version(), "Rotated account cryptographic state");
    let request_model = rotated.to_request_model(new_user_key_id, ctx)?;
    Ok((rotated, request_model))
}
