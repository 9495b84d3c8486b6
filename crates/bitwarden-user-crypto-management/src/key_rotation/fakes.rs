//! In-memory collaborators holding real key material, for driving complete rotations in tests.

use std::{
    collections::BTreeMap,
    num::NonZeroU32,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bitwarden_crypto::{
    AsymmetricCryptoKey, AsymmetricPublicCryptoKey, ContentFormat, Kdf, KeyStore,
    KeyStoreContext, PublicKeyEncryptionAlgorithm, SymmetricCryptoKey, SymmetricKeyAlgorithm,
    VerifyingKey,
};
use bitwarden_key_management::{
    api::{
        models::{
            EmergencyAccessType, EmergencyAccessWithIdRequestModel, EncryptedRecord,
            OtherDeviceKeysUpdateRequestModel, ResetPasswordWithOrgIdRequestModel,
            RotateUserAccountKeysAndDataRequestModel, WebAuthnLoginRotateKeyRequestModel,
        },
        UserKeyRotationApi,
    },
    AccountKeyStorage, ApiError, AsymmetricKeyId, EmergencyAccessId, KeyIds,
    MasterPasswordUnlockData, OrganizationId, SigningKeyId, StoredAccountKeys, SymmetricKeyId,
    UserId, WrappedAccountCryptographicState,
};
use uuid::Uuid;

pub(crate) use super::{
    services::{MockSessionService, MockSyncService},
    trust::MockTrustPrompt,
};
use super::{
    reencrypt_records, reshare_to_emergency_access, reshare_to_organizations, DeviceTrustService,
    EmergencyAccessGrantee, EmergencyAccessService, OrganizationMembership,
    OrganizationRecoveryService, OwnedDataService, PartialRotateableKeyset, PasskeyUnlockService,
    RotatedOwnedData, RotationKeys, RotationServices, ServiceError, TrustDecision,
    TrustedPublicKeys,
};

pub(crate) const PASSWORD: &str = "current password";
pub(crate) const SALT: &str = "test@bitwarden.com";

pub(crate) fn kdf() -> Kdf {
    Kdf::PBKDF2 {
        iterations: NonZeroU32::new(5000).unwrap(),
    }
}

/// An account with its key material as key storage would hold it.
pub(crate) struct TestAccount {
    pub(crate) user_id: UserId,
    pub(crate) user_key: SymmetricCryptoKey,
    pub(crate) state: WrappedAccountCryptographicState,
}

impl TestAccount {
    pub(crate) fn v1() -> Self {
        let store: KeyStore<KeyIds> = KeyStore::default();
        let mut ctx = store.context();
        let user_key = ctx.make_symmetric_key(SymmetricKeyAlgorithm::Aes256CbcHmac);
        let private_key = ctx
            .make_private_key(PublicKeyEncryptionAlgorithm::RsaOaepSha1)
            .unwrap();
        let state = WrappedAccountCryptographicState::V1 {
            private_key: ctx.wrap_private_key(user_key, private_key).unwrap(),
        };
        Self::new(UserId::new_v4(), user_key, state, &ctx)
    }

    pub(crate) fn v2() -> Self {
        let user_id = UserId::new_v4();
        let store: KeyStore<KeyIds> = KeyStore::default();
        let mut ctx = store.context();
        let (user_key, state) = WrappedAccountCryptographicState::make(&mut ctx, user_id).unwrap();
        Self::new(user_id, user_key, state, &ctx)
    }

    #[allow(deprecated)]
    fn new(
        user_id: UserId,
        user_key: SymmetricKeyId,
        state: WrappedAccountCryptographicState,
        ctx: &KeyStoreContext<KeyIds>,
    ) -> Self {
        Self {
            user_id,
            user_key: ctx.dangerous_get_symmetric_key(user_key).unwrap().clone(),
            state,
        }
    }

    /// A store with the account's keys in their global slots.
    pub(crate) fn key_store(&self) -> KeyStore<KeyIds> {
        let store = KeyStore::default();
        let mut ctx = store.context_mut();
        let user_key = ctx.add_local_symmetric_key(self.user_key.clone());
        self.state.set_to_context(user_key, &mut ctx).unwrap();
        drop(ctx);
        store
    }

    pub(crate) fn public_key(&self) -> AsymmetricPublicCryptoKey {
        self.key_store()
            .context()
            .get_public_key(AsymmetricKeyId::UserPrivateKey)
            .unwrap()
    }

    pub(crate) fn verifying_key(&self) -> Option<VerifyingKey> {
        let store = self.key_store();
        let ctx = store.context();
        ctx.has_signing_key(SigningKeyId::UserSigningKey)
            .then(|| ctx.get_verifying_key(SigningKeyId::UserSigningKey).unwrap())
    }

    /// A passkey or device keyset holding the current user key, and its private key.
    #[allow(deprecated)]
    fn test_keyset(&self) -> (PartialRotateableKeyset, AsymmetricCryptoKey) {
        let store = self.key_store();
        let mut ctx = store.context();
        let (keyset, private_key) =
            PartialRotateableKeyset::make_test_keyset(SymmetricKeyId::User, &mut ctx);
        let private_key = ctx
            .dangerous_get_asymmetric_key(private_key)
            .unwrap()
            .clone();
        (keyset, private_key)
    }

    pub(crate) fn stored(&self) -> StoredAccountKeys {
        let store = self.key_store();
        let unlock = MasterPasswordUnlockData::derive(
            PASSWORD,
            &kdf(),
            SALT,
            SymmetricKeyId::User,
            &store.context(),
        )
        .unwrap();
        StoredAccountKeys::from_state(self.user_key.clone(), &self.state, &unlock).unwrap()
    }
}

struct FakeKeyStorage(StoredAccountKeys);

#[async_trait]
impl AccountKeyStorage for FakeKeyStorage {
    async fn get_account_keys(&self, _user_id: UserId) -> StoredAccountKeys {
        self.0.clone()
    }
}

/// Records every commit. Rejects them all when built with [FakeApi::rejecting].
#[derive(Default)]
pub(crate) struct FakeApi {
    commits: Mutex<Vec<RotateUserAccountKeysAndDataRequestModel>>,
    reject: bool,
}

impl FakeApi {
    pub(crate) fn rejecting() -> Self {
        Self {
            reject: true,
            ..Default::default()
        }
    }

    pub(crate) fn commits(&self) -> Vec<RotateUserAccountKeysAndDataRequestModel> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserKeyRotationApi for FakeApi {
    async fn rotate_user_account_keys(
        &self,
        request: &RotateUserAccountKeysAndDataRequestModel,
    ) -> Result<(), ApiError> {
        self.commits.lock().unwrap().push(request.clone());
        if self.reject {
            let err = serde_json::from_str::<()>("rejected").unwrap_err();
            return Err(ApiError::Serde(err));
        }
        Ok(())
    }
}

/// An unlock method collaborator of [Harness].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnlockMethod {
    Organizations,
    EmergencyAccess,
    Passkeys,
    Devices,
}

fn collaborator_failure() -> ServiceError {
    ServiceError::Other("collaborator is unavailable".to_string())
}

/// Reports `memberships` for trust, and re-shares to `shared_with` once the keys are trusted.
/// The two differ when the server substitutes a key after the user confirmed it.
struct FakeOrganizations {
    memberships: Vec<OrganizationMembership>,
    shared_with: Vec<OrganizationMembership>,
    fail: bool,
}

#[async_trait]
impl OrganizationRecoveryService for FakeOrganizations {
    async fn get_trusted_public_keys(
        &self,
        _user_id: UserId,
    ) -> Result<Vec<OrganizationMembership>, ServiceError> {
        Ok(self.memberships.clone())
    }

    async fn get_rotated_unlock_data(
        &self,
        keys: &RotationKeys,
        trusted_keys: &TrustedPublicKeys<OrganizationId>,
        _user_id: UserId,
    ) -> Result<Option<Vec<ResetPasswordWithOrgIdRequestModel>>, ServiceError> {
        if self.fail {
            return Err(collaborator_failure());
        }
        if self.shared_with.is_empty() {
            return Ok(None);
        }
        reshare_to_organizations(&self.shared_with, trusted_keys, keys).map(Some)
    }
}

/// Like [FakeOrganizations], for emergency access grantees.
struct FakeEmergencyAccess {
    grantees: Vec<EmergencyAccessGrantee>,
    shared_with: Vec<EmergencyAccessGrantee>,
    fail: bool,
}

#[async_trait]
impl EmergencyAccessService for FakeEmergencyAccess {
    async fn get_trusted_public_keys(
        &self,
        _user_id: UserId,
    ) -> Result<Vec<EmergencyAccessGrantee>, ServiceError> {
        Ok(self.grantees.clone())
    }

    async fn get_rotated_unlock_data(
        &self,
        keys: &RotationKeys,
        trusted_keys: &TrustedPublicKeys<EmergencyAccessId>,
        _user_id: UserId,
    ) -> Result<Option<Vec<EmergencyAccessWithIdRequestModel>>, ServiceError> {
        if self.fail {
            return Err(collaborator_failure());
        }
        if self.shared_with.is_empty() {
            return Ok(None);
        }
        reshare_to_emergency_access(&self.shared_with, trusted_keys, keys).map(Some)
    }
}

struct FakeKeysets {
    keysets: Vec<PartialRotateableKeyset>,
    fail: bool,
}

impl FakeKeysets {
    fn rotate(
        &self,
        keys: &RotationKeys,
    ) -> Result<Option<Vec<PartialRotateableKeyset>>, ServiceError> {
        if self.fail {
            return Err(collaborator_failure());
        }
        if self.keysets.is_empty() {
            return Ok(None);
        }
        let ctx = keys.store.context();
        let rotated = self
            .keysets
            .iter()
            .map(|keyset| keyset.rotate_userkey(keys.current_user_key, keys.new_user_key, &ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(rotated))
    }
}

#[async_trait]
impl PasskeyUnlockService for FakeKeysets {
    async fn get_rotated_unlock_data(
        &self,
        keys: &RotationKeys,
        _user_id: UserId,
    ) -> Result<Option<Vec<WebAuthnLoginRotateKeyRequestModel>>, ServiceError> {
        Ok(self
            .rotate(keys)?
            .map(|keysets| keysets.into_iter().map(Into::into).collect()))
    }
}

#[async_trait]
impl DeviceTrustService for FakeKeysets {
    async fn get_rotated_unlock_data(
        &self,
        keys: &RotationKeys,
        _user_id: UserId,
    ) -> Result<Option<Vec<OtherDeviceKeysUpdateRequestModel>>, ServiceError> {
        Ok(self
            .rotate(keys)?
            .map(|keysets| keysets.into_iter().map(Into::into).collect()))
    }
}

/// `None` reports the data as unavailable.
struct FakeOwnedData(Option<Vec<EncryptedRecord>>);

#[async_trait]
impl OwnedDataService for FakeOwnedData {
    async fn get_rotated_data(
        &self,
        keys: &RotationKeys,
        _user_id: UserId,
    ) -> Result<RotatedOwnedData, ServiceError> {
        match &self.0 {
            Some(records) => Ok(RotatedOwnedData::Available(reencrypt_records(
                records, keys,
            )?)),
            None => Ok(RotatedOwnedData::Unavailable),
        }
    }
}

/// A record encrypted with the user key of `store`.
pub(crate) fn record(store: &KeyStore<KeyIds>, name: &str) -> EncryptedRecord {
    let name = store
        .context()
        .encrypt_data_with_symmetric_key(
            SymmetricKeyId::User,
            name.as_bytes(),
            ContentFormat::Utf8,
        )
        .unwrap();
    EncryptedRecord {
        id: Uuid::new_v4(),
        fields: BTreeMap::from([("name".to_string(), name)]),
    }
}

/// Every collaborator of a rotation for one [TestAccount]. Private keys of third parties are
/// kept so tests can check what was shared with them.
///
/// The mocks start without expectations. [Harness::happy_path] adds those of a run that commits.
pub(crate) struct Harness {
    pub(crate) account: TestAccount,
    /// What key storage returns, derived from `account`
    pub(crate) stored_keys: StoredAccountKeys,
    pub(crate) api: Arc<FakeApi>,
    pub(crate) organizations: Vec<(OrganizationMembership, AsymmetricCryptoKey)>,
    pub(crate) emergency_contacts: Vec<(EmergencyAccessGrantee, AsymmetricCryptoKey)>,
    pub(crate) passkeys: Vec<(PartialRotateableKeyset, AsymmetricCryptoKey)>,
    pub(crate) devices: Vec<(PartialRotateableKeyset, AsymmetricCryptoKey)>,
    pub(crate) ciphers: Option<Vec<EncryptedRecord>>,
    pub(crate) folders: Option<Vec<EncryptedRecord>>,
    pub(crate) sends: Option<Vec<EncryptedRecord>>,
    /// Organizations and grantees are re-shared to fresh keys instead of the confirmed ones
    pub(crate) substitute_keys: bool,
    pub(crate) failing: Option<UnlockMethod>,
    pub(crate) sync: MockSyncService,
    pub(crate) session: MockSessionService,
    pub(crate) prompt: MockTrustPrompt,
}

impl Harness {
    pub(crate) fn new(account: TestAccount) -> Self {
        let store = account.key_store();
        let ciphers = vec![record(&store, "Login")];
        let folders = vec![record(&store, "Work")];
        Self {
            stored_keys: account.stored(),
            account,
            api: Arc::new(FakeApi::default()),
            organizations: Vec::new(),
            emergency_contacts: Vec::new(),
            passkeys: Vec::new(),
            devices: Vec::new(),
            ciphers: Some(ciphers),
            folders: Some(folders),
            sends: Some(Vec::new()),
            substitute_keys: false,
            failing: None,
            sync: MockSyncService::new(),
            session: MockSessionService::new(),
            prompt: MockTrustPrompt::new(),
        }
    }

    /// Synced, every prompt approved, sessions logged out exactly once.
    pub(crate) fn happy_path(mut self) -> Self {
        self.sync
            .expect_has_completed_full_sync()
            .returning(|_| true);
        self.prompt
            .expect_confirm()
            .returning(|_| TrustDecision::Approved);
        self.session
            .expect_log_out_all_sessions()
            .times(1)
            .return_const(());
        self
    }

    /// Synced and every prompt approved, but the run must not log anyone out.
    pub(crate) fn aborting(mut self) -> Self {
        self.sync
            .expect_has_completed_full_sync()
            .returning(|_| true);
        self.prompt
            .expect_confirm()
            .returning(|_| TrustDecision::Approved);
        self.session.expect_log_out_all_sessions().never();
        self
    }

    pub(crate) fn with_organization(mut self, name: &str) -> Self {
        let private_key = AsymmetricCryptoKey::make().unwrap();
        self.organizations.push((
            OrganizationMembership {
                organization_id: OrganizationId::new_v4(),
                name: name.to_string(),
                public_key: private_key.to_public_key(),
            },
            private_key,
        ));
        self
    }

    pub(crate) fn with_emergency_contact(mut self, name: &str) -> Self {
        let private_key = AsymmetricCryptoKey::make().unwrap();
        self.emergency_contacts.push((
            EmergencyAccessGrantee {
                id: EmergencyAccessId::new_v4(),
                name: name.to_string(),
                public_key: private_key.to_public_key(),
                access_type: EmergencyAccessType::Takeover,
                wait_time_days: 7,
            },
            private_key,
        ));
        self
    }

    pub(crate) fn with_passkey(mut self) -> Self {
        let keyset = self.account.test_keyset();
        self.passkeys.push(keyset);
        self
    }

    pub(crate) fn with_device(mut self) -> Self {
        let keyset = self.account.test_keyset();
        self.devices.push(keyset);
        self
    }

    pub(crate) fn services(self) -> (RotationServices, TestAccount, Arc<FakeApi>) {
        let api = self.api.clone();
        let failing = self.failing;
        let fails = |method| failing == Some(method);
        let substitute_keys = self.substitute_keys;
        let substitute = |public_key: &AsymmetricPublicCryptoKey| {
            if substitute_keys {
                AsymmetricCryptoKey::make().unwrap().to_public_key()
            } else {
                public_key.clone()
            }
        };

        let memberships: Vec<_> = self.organizations.into_iter().map(|(org, _)| org).collect();
        let organizations_shared_with = memberships
            .iter()
            .map(|org| OrganizationMembership {
                public_key: substitute(&org.public_key),
                ..org.clone()
            })
            .collect();
        let grantees: Vec<_> = self
            .emergency_contacts
            .into_iter()
            .map(|(grantee, _)| grantee)
            .collect();
        let grantees_shared_with = grantees
            .iter()
            .map(|grantee| EmergencyAccessGrantee {
                public_key: substitute(&grantee.public_key),
                ..grantee.clone()
            })
            .collect();

        let services = RotationServices {
            key_storage: Arc::new(FakeKeyStorage(self.stored_keys)),
            api: self.api,
            sync: Arc::new(self.sync),
            session: Arc::new(self.session),
            trust_prompt: Arc::new(self.prompt),
            organization_recovery: Arc::new(FakeOrganizations {
                memberships,
                shared_with: organizations_shared_with,
                fail: fails(UnlockMethod::Organizations),
            }),
            emergency_access: Arc::new(FakeEmergencyAccess {
                grantees,
                shared_with: grantees_shared_with,
                fail: fails(UnlockMethod::EmergencyAccess),
            }),
            passkeys: Arc::new(FakeKeysets {
                keysets: self.passkeys.into_iter().map(|(keyset, _)| keyset).collect(),
                fail: fails(UnlockMethod::Passkeys),
            }),
            trusted_devices: Arc::new(FakeKeysets {
                keysets: self.devices.into_iter().map(|(keyset, _)| keyset).collect(),
                fail: fails(UnlockMethod::Devices),
            }),
            ciphers: Arc::new(FakeOwnedData(self.ciphers)),
            folders: Arc::new(FakeOwnedData(self.folders)),
            sends: Arc::new(FakeOwnedData(self.sends)),
        };
        (services, self.account, api)
    }
}
