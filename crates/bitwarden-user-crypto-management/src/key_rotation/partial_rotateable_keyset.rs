use bitwarden_crypto::{
    AsymmetricPublicCryptoKey, ContentFormat, CryptoError, EncString, KeyStoreContext,
    UnsignedSharedKey,
};
#[cfg(test)]
use bitwarden_key_management::AsymmetricKeyId;
use bitwarden_key_management::{
    api::models::{OtherDeviceKeysUpdateRequestModel, WebAuthnLoginRotateKeyRequestModel},
    DeviceId, KeyIds, PasskeyCredentialId, SymmetricKeyId,
};
use tracing::instrument;

/// A version of a rotateable keyset, missing the upstream-key-encrypted-private-key.
/// This can only be used to re-share the downstream-key (in this case the user-key) with the
/// key-set.
///
/// Trusted devices and passkeys with the PRF extension both hold such a keyset.
#[derive(Debug, Clone)]
pub struct PartialRotateableKeyset {
    /// The device or credential id
    pub id: uuid::Uuid,
    /// The keyset's public key (SPKI DER), encrypted with the user key
    pub encrypted_public_key: EncString,
    /// The user key, encapsulated to the keyset's public key
    pub encrypted_user_key: UnsignedSharedKey,
}

impl From<PartialRotateableKeyset> for OtherDeviceKeysUpdateRequestModel {
    fn from(val: PartialRotateableKeyset) -> Self {
        OtherDeviceKeysUpdateRequestModel {
            device_id: DeviceId::new(val.id),
            encrypted_public_key: val.encrypted_public_key,
            encrypted_user_key: val.encrypted_user_key,
        }
    }
}

impl From<PartialRotateableKeyset> for WebAuthnLoginRotateKeyRequestModel {
    fn from(val: PartialRotateableKeyset) -> Self {
        WebAuthnLoginRotateKeyRequestModel {
            id: PasskeyCredentialId::new(val.id),
            encrypted_public_key: val.encrypted_public_key,
            encrypted_user_key: val.encrypted_user_key,
        }
    }
}

impl PartialRotateableKeyset {
    /// Makes a new `PartialRotateableKeyset` by re-encrypting the user-key. Specifically,
    /// the user-key-encrypted-public-key is re-encrypted for the new user-key, and the
    /// public-key-encrypted-user-key is re-created for the new user-key.
    #[instrument(skip(self, ctx), fields(id = %self.id), err)]
    pub fn rotate_userkey(
        &self,
        current_user_key_id: SymmetricKeyId,
        new_user_key_id: SymmetricKeyId,
        ctx: &KeyStoreContext<KeyIds>,
    ) -> Result<PartialRotateableKeyset, CryptoError> {
        let pubkey_der =
            ctx.decrypt_data_with_symmetric_key(current_user_key_id, &self.encrypted_public_key)?;
        let pubkey = AsymmetricPublicCryptoKey::from_der(&pubkey_der)?;
        let reencrypted_user_key = UnsignedSharedKey::encapsulate(new_user_key_id, &pubkey, ctx)?;
        let reencrypted_public_key = ctx.encrypt_data_with_symmetric_key(
            new_user_key_id,
            &pubkey_der,
            ContentFormat::OctetStream,
        )?;
        Ok(PartialRotateableKeyset {
            id: self.id,
            encrypted_public_key: reencrypted_public_key,
            encrypted_user_key: reencrypted_user_key,
        })
    }

    /// Makes a test `PartialRotateableKeyset` for the given downstream key.
    /// The private key is stored on the context since it is not present on the partial keyset.
    #[cfg(test)]
    pub(crate) fn make_test_keyset(
        downstream_key_id: SymmetricKeyId,
        ctx: &mut KeyStoreContext<KeyIds>,
    ) -> (Self, AsymmetricKeyId) {
        use bitwarden_crypto::PublicKeyEncryptionAlgorithm;

        let private_key = ctx
            .make_private_key(PublicKeyEncryptionAlgorithm::RsaOaepSha1)
            .unwrap();
        let public_key = ctx.get_public_key(private_key).unwrap();
        let encrypted_public_key = ctx
            .encrypt_data_with_symmetric_key(
                downstream_key_id,
                &public_key.to_der().unwrap(),
                ContentFormat::OctetStream,
            )
            .unwrap();
        let encrypted_user_key =
            UnsignedSharedKey::encapsulate(downstream_key_id, &public_key, ctx).unwrap();
        (
            PartialRotateableKeyset {
                id: uuid::Uuid::new_v4(),
                encrypted_public_key,
                encrypted_user_key,
            },
            private_key,
        )
    }
}
