#![doc = include_str!("../README.md")]

mod key_rotation;
pub use key_rotation::{
    reencrypt_records, reshare_to_emergency_access, reshare_to_organizations, DeviceTrustService,
    EmergencyAccessGrantee, EmergencyAccessService, OrganizationMembership,
    OrganizationRecoveryService, OwnedDataService, PartialRotateableKeyset, PasskeyUnlockService,
    PreconditionError, RotateUserKeysError, RotateUserKeysRequest, RotatedOwnedData,
    RotatedUserKeys, RotationKeys, RotationOutcome, RotationServices, RotationSettings,
    ServiceError, SessionService, SyncService, TrustDecision, TrustPrompt, TrustSubject,
    TrustVerification, TrustVerifier, TrustedPublicKeys, UntrustedKeyError, ValidationError,
};
mod user_crypto_management_client;
pub use user_crypto_management_client::UserCryptoManagementClient;
