//! Request models for the key rotation endpoint.
//!
//! Every model serializes to camelCase JSON. Sequences are never optional: an unlock method or
//! owned data kind with nothing to rotate is sent as an empty array.

use std::collections::BTreeMap;

use bitwarden_crypto::{CryptoError, EncString, KeyStoreContext, UnsignedSharedKey};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use tracing::debug_span;
use uuid::Uuid;

use crate::{
    DeviceId, EmergencyAccessId, KeyIds, OrganizationId, PasskeyCredentialId, SymmetricKeyId,
};

/// The key derivation function used for the master password, as sent over the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
#[allow(non_camel_case_types)]
pub enum KdfType {
    #[allow(missing_docs)]
    PBKDF2_SHA256 = 0,
    #[allow(missing_docs)]
    Argon2id = 1,
}

/// The level of access an emergency contact is granted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
pub enum EmergencyAccessType {
    /// The grantee may view the grantor's vault
    View = 0,
    /// The grantee may take over the grantor's account
    Takeover = 1,
}

/// KDF parameters as stored alongside the master password.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterPasswordUnlockKdfModel {
    pub kdf_type: KdfType,
    pub iterations: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<i32>,
}

/// The master password unlock data as returned by the server on sync.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterPasswordUnlockResponseModel {
    pub kdf: MasterPasswordUnlockKdfModel,
    #[serde(default)]
    pub master_key_encrypted_user_key: Option<String>,
    #[serde(default)]
    pub salt: Option<String>,
}

/// The atomic commit payload of a key rotation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateUserAccountKeysAndDataRequestModel {
    /// Proves knowledge of the current (old) master password
    pub old_master_key_authentication_hash: String,
    /// The rotated account cryptographic state
    pub account_keys: AccountKeysRequestModel,
    /// The new unlock method set
    pub account_unlock_data: UnlockDataRequestModel,
    /// The user's owned data, re-encrypted under the new user key
    pub account_data: AccountDataRequestModel,
}

/// Account keys wrapped by the new user key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKeysRequestModel {
    /// The private key wrapped by the new user key
    pub user_key_encrypted_account_private_key: EncString,
    /// Base64 encoded SPKI DER of the account public key
    pub account_public_key: String,
    #[allow(missing_docs)]
    pub public_key_encryption_key_pair: PublicKeyEncryptionKeyPairRequestModel,
    /// Present for version 2 accounts only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_key_pair: Option<SignatureKeyPairRequestModel>,
    /// Present for version 2 accounts only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_state: Option<SecurityStateModel>,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyEncryptionKeyPairRequestModel {
    pub wrapped_private_key: EncString,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_public_key: Option<String>,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureKeyPairRequestModel {
    pub signature_algorithm: String,
    pub wrapped_signing_key: EncString,
    /// Base64 encoded verifying key
    pub verifying_key: String,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStateModel {
    pub security_state: String,
    pub security_version: i32,
}

/// Every unlock method of the account, each wrapping the new user key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockDataRequestModel {
    #[allow(missing_docs)]
    pub master_password_unlock_data: MasterPasswordUnlockAndAuthenticationDataModel,
    #[allow(missing_docs)]
    pub emergency_access_unlock_data: Vec<EmergencyAccessWithIdRequestModel>,
    #[allow(missing_docs)]
    pub organization_account_recovery_unlock_data: Vec<ResetPasswordWithOrgIdRequestModel>,
    #[allow(missing_docs)]
    pub passkey_unlock_data: Vec<WebAuthnLoginRotateKeyRequestModel>,
    #[allow(missing_docs)]
    pub device_key_unlock_data: Vec<OtherDeviceKeysUpdateRequestModel>,
}

/// The master password unlock record, with the hash used to authenticate with the new password.
#[allow(missing_docs)]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterPasswordUnlockAndAuthenticationDataModel {
    pub kdf_type: KdfType,
    pub kdf_iterations: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf_memory: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf_parallelism: Option<i32>,
    pub email: String,
    pub master_key_authentication_hash: String,
    pub master_key_encrypted_user_key: EncString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_password_hint: Option<String>,
}

/// An emergency access grant with the user key encapsulated to the grantee's public key.
#[allow(missing_docs)]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyAccessWithIdRequestModel {
    pub id: EmergencyAccessId,
    pub r#type: EmergencyAccessType,
    pub wait_time_days: i32,
    pub key_encrypted: UnsignedSharedKey,
}

/// An organization account recovery enrollment with the user key encapsulated to the
/// organization's public key.
#[allow(missing_docs)]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordWithOrgIdRequestModel {
    pub organization_id: OrganizationId,
    pub reset_password_key: UnsignedSharedKey,
}

/// A passkey that can unlock the account.
#[allow(missing_docs)]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebAuthnLoginRotateKeyRequestModel {
    pub id: PasskeyCredentialId,
    pub encrypted_public_key: EncString,
    pub encrypted_user_key: UnsignedSharedKey,
}

/// A trusted device that can unlock the account.
#[allow(missing_docs)]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherDeviceKeysUpdateRequestModel {
    pub device_id: DeviceId,
    pub encrypted_public_key: EncString,
    pub encrypted_user_key: UnsignedSharedKey,
}

/// The user's owned data, each record re-encrypted under the new user key.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDataRequestModel {
    pub ciphers: Vec<EncryptedRecord>,
    pub folders: Vec<EncryptedRecord>,
    pub sends: Vec<EncryptedRecord>,
}

/// An owned record, such as a cipher, folder or send, in its encrypted wire form.
///
/// Only the encrypted fields are carried. The server matches records by id and replaces exactly
/// the listed fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedRecord {
    #[allow(missing_docs)]
    pub id: Uuid,
    /// Encrypted fields by name
    pub fields: BTreeMap<String, EncString>,
}

impl EncryptedRecord {
    /// Decrypt every field with `old_key` and encrypt it again with `new_key`. Each field keeps
    /// its content format.
    pub fn reencrypt(
        &self,
        old_key: SymmetricKeyId,
        new_key: SymmetricKeyId,
        ctx: &KeyStoreContext<KeyIds>,
    ) -> Result<EncryptedRecord, CryptoError> {
        let _span = debug_span!("reencrypt_record", id = %self.id).entered();
        let fields = self
            .fields
            .iter()
            .map(|(name, value)| Ok((name.clone(), ctx.reencrypt_data(old_key, new_key, value)?)))
            .collect::<Result<_, CryptoError>>()?;
        Ok(EncryptedRecord {
            id: self.id,
            fields,
        })
    }
}
