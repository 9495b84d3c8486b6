//! Re-encryption of every unlock method for the new user key.

use bitwarden_crypto::{Kdf, KeyStoreContext};
use bitwarden_key_management::{
    api::models::{
        EmergencyAccessWithIdRequestModel, MasterPasswordUnlockAndAuthenticationDataModel,
        MasterPasswordUnlockKdfModel, ResetPasswordWithOrgIdRequestModel, UnlockDataRequestModel,
    },
    EmergencyAccessId, KeyIds, MasterPasswordAuthenticationData, MasterPasswordError,
    MasterPasswordUnlockData, OrganizationId, SymmetricKeyId, UserId,
};
use tracing::{debug, debug_span, instrument};

use super::{
    services::{
        EmergencyAccessGrantee, OrganizationMembership, RotationKeys, RotationServices,
        ServiceError,
    },
    trust::TrustedPublicKeys,
    RotateUserKeysError,
};

/// The new master password, and the kdf and salt it is derived with.
pub(super) struct MasterPasswordRotation<'a> {
    pub(super) password: &'a str,
    pub(super) hint: Option<String>,
    pub(super) kdf: &'a Kdf,
    pub(super) salt: &'a str,
}

/// Shares the new user key with every organization the user is enrolled in account recovery
/// with. Each organization's public key must be in `trusted_keys`.
pub fn reshare_to_organizations(
    memberships: &[OrganizationMembership],
    trusted_keys: &TrustedPublicKeys<OrganizationId>,
    keys: &RotationKeys,
) -> Result<Vec<ResetPasswordWithOrgIdRequestModel>, ServiceError> {
    let _span = debug_span!("reencrypt_organization_keys").entered();
    let ctx = keys.store.context();
    memberships
        .iter()
        .map(|membership| {
            let _span = debug_span!(
                "reencrypt_organization_key",
                organization_id = %membership.organization_id
            )
            .entered();
            // Note: No sender authentication, the public key is only as good as the user's
            // confirmation of it.
            Ok(ResetPasswordWithOrgIdRequestModel {
                organization_id: membership.organization_id,
                reset_password_key: trusted_keys.encapsulate(
                    membership.organization_id,
                    &membership.public_key,
                    keys.new_user_key,
                    &ctx,
                )?,
            })
        })
        .collect()
}

/// Shares the new user key with every emergency access grantee, keeping the grant's type and
/// wait time. Each grantee's public key must be in `trusted_keys`.
pub fn reshare_to_emergency_access(
    grantees: &[EmergencyAccessGrantee],
    trusted_keys: &TrustedPublicKeys<EmergencyAccessId>,
    keys: &RotationKeys,
) -> Result<Vec<EmergencyAccessWithIdRequestModel>, ServiceError> {
    let _span = debug_span!("reencrypt_emergency_access_keys").entered();
    let ctx = keys.store.context();
    grantees
        .iter()
        .map(|grantee| {
            let _span =
                debug_span!("reencrypt_emergency_access_key", grantee_id = %grantee.id).entered();
            Ok(EmergencyAccessWithIdRequestModel {
                id: grantee.id,
                r#type: grantee.access_type,
                wait_time_days: grantee.wait_time_days,
                key_encrypted: trusted_keys.encapsulate(
                    grantee.id,
                    &grantee.public_key,
                    keys.new_user_key,
                    &ctx,
                )?,
            })
        })
        .collect()
}

/// Builds the master password unlock record: the new user key wrapped by the master key derived
/// from the new password, and the new authentication hash.
fn derive_master_password_unlock(
    master_password: MasterPasswordRotation<'_>,
    new_user_key: SymmetricKeyId,
    ctx: &KeyStoreContext<KeyIds>,
) -> Result<MasterPasswordUnlockAndAuthenticationDataModel, MasterPasswordError> {
    let _span = debug_span!("derive_master_password_unlock_data").entered();
    let unlock_data = MasterPasswordUnlockData::derive(
        master_password.password,
        master_password.kdf,
        master_password.salt,
        new_user_key,
        ctx,
    )?;
    let authentication_data = MasterPasswordAuthenticationData::derive(
        master_password.password,
        master_password.kdf,
        master_password.salt,
    )?;
    to_authentication_and_unlock_data(unlock_data, authentication_data, master_password.hint)
}

fn to_authentication_and_unlock_data(
    master_password_unlock_data: MasterPasswordUnlockData,
    master_password_authentication_data: MasterPasswordAuthenticationData,
    hint: Option<String>,
) -> Result<MasterPasswordUnlockAndAuthenticationDataModel, MasterPasswordError> {
    let kdf = MasterPasswordUnlockKdfModel::try_from(&master_password_unlock_data.kdf)?;
    Ok(MasterPasswordUnlockAndAuthenticationDataModel {
        kdf_type: kdf.kdf_type,
        kdf_iterations: kdf.iterations,
        kdf_memory: kdf.memory,
        kdf_parallelism: kdf.parallelism,
        email: master_password_unlock_data.salt,
        master_key_authentication_hash: master_password_authentication_data
            .master_password_authentication_hash,
        master_key_encrypted_user_key: master_password_unlock_data.master_key_wrapped_user_key,
        master_password_hint: hint,
    })
}

pub(super) fn unlock_method_error(
    method: &'static str,
) -> impl FnOnce(ServiceError) -> RotateUserKeysError {
    move |source| match source {
        ServiceError::UntrustedKey(e) => RotateUserKeysError::UntrustedKey(e),
        source => RotateUserKeysError::UnlockMethod { method, source },
    }
}

/// Update every unlock method for the new user key.
///
/// The collaborators are queried concurrently. The first failure aborts the others. A collaborator
/// with nothing to rotate contributes an empty list.
#[instrument(skip_all, err)]
pub(super) async fn reencrypt_unlock(
    services: &RotationServices,
    master_password: MasterPasswordRotation<'_>,
    trusted_organizations: &TrustedPublicKeys<OrganizationId>,
    trusted_emergency_access: &TrustedPublicKeys<EmergencyAccessId>,
    keys: &RotationKeys,
    user_id: UserId,
) -> Result<UnlockDataRequestModel, RotateUserKeysError> {
    let master_password_unlock_data = {
        let ctx = keys.store.context();
        derive_master_password_unlock(master_password, keys.new_user_key, &ctx)?
    };

    let (organizations, emergency_access, passkeys, devices) = tokio::try_join!(
        async {
            services
                .organization_recovery
                .get_rotated_unlock_data(keys, trusted_organizations, user_id)
                .await
                .map_err(unlock_method_error("organization account recovery"))
        },
        async {
            services
                .emergency_access
                .get_rotated_unlock_data(keys, trusted_emergency_access, user_id)
                .await
                .map_err(unlock_method_error("emergency access"))
        },
        async {
            services
                .passkeys
                .get_rotated_unlock_data(keys, user_id)
                .await
                .map_err(unlock_method_error("passkey"))
        },
        async {
            services
                .trusted_devices
                .get_rotated_unlock_data(keys, user_id)
                .await
                .map_err(unlock_method_error("trusted device"))
        },
    )?;

    let unlock_data = UnlockDataRequestModel {
        master_password_unlock_data,
        emergency_access_unlock_data: emergency_access.unwrap_or_default(),
        organization_account_recovery_unlock_data: organizations.unwrap_or_default(),
        passkey_unlock_data: passkeys.unwrap_or_default(),
        device_key_unlock_data: devices.unwrap_or_default(),
    };
    debug!(
        organizations = unlock_data.organization_account_recovery_unlock_data.len(),
        emergency_access = unlock_data.emergency_access_unlock_data.len(),
        passkeys = unlock_data.passkey_unlock_data.len(),
        devices = unlock_data.device_key_unlock_data.len(),
        "Re-encrypted unlock methods"
    );
    Ok(unlock_data)
}
