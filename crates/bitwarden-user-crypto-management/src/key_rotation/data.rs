//! Functionality for re-encrypting user data during key rotation.

use bitwarden_crypto::CryptoError;
use bitwarden_key_management::{
    api::models::{AccountDataRequestModel, EncryptedRecord},
    UserId,
};
use tracing::{debug, instrument, warn};

use super::{
    services::{OwnedDataService, RotatedOwnedData, RotationKeys, RotationServices},
    RotateUserKeysError,
};

/// Re-encrypts every record from the current to the new user key. Owned data collaborators
/// can use this for records they hold in encrypted form.
pub fn reencrypt_records(
    records: &[EncryptedRecord],
    keys: &RotationKeys,
) -> Result<Vec<EncryptedRecord>, CryptoError> {
    let ctx = keys.store.context();
    records
        .iter()
        .map(|record| record.reencrypt(keys.current_user_key, keys.new_user_key, &ctx))
        .collect()
}

#[instrument(name = "reencrypt_owned_data", skip(service, keys))]
async fn rotate_kind(
    kind: &'static str,
    service: &dyn OwnedDataService,
    keys: &RotationKeys,
    user_id: UserId,
) -> Result<Vec<EncryptedRecord>, RotateUserKeysError> {
    match service.get_rotated_data(keys, user_id).await {
        Ok(RotatedOwnedData::Available(records)) => {
            debug!(count = records.len(), "Re-encrypted {kind}");
            Ok(records)
        }
        Ok(RotatedOwnedData::Unavailable) => {
            warn!("Owned data is unavailable: {kind}");
            Err(RotateUserKeysError::ReencryptionUnavailable(kind))
        }
        Err(source) => Err(RotateUserKeysError::OwnedData { kind, source }),
    }
}

/// Fully re-encrypt all user data with the new user key. The kinds are fetched concurrently.
#[instrument(skip_all, err)]
pub(super) async fn reencrypt_data(
    services: &RotationServices,
    keys: &RotationKeys,
    user_id: UserId,
) -> Result<AccountDataRequestModel, RotateUserKeysError> {
    let (ciphers, folders, sends) = tokio::try_join!(
        rotate_kind("ciphers", services.ciphers.as_ref(), keys, user_id),
        rotate_kind("folders", services.folders.as_ref(), keys, user_id),
        rotate_kind("sends", services.sends.as_ref(), keys, user_id),
    )?;

    Ok(AccountDataRequestModel {
        ciphers,
        folders,
        sends,
    })
}
