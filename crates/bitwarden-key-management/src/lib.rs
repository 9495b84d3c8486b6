#![doc = include_str!("../README.md")]

mod account_cryptographic_state;
pub use account_cryptographic_state::{
    AccountCryptographicVersion, AccountCryptographyInitializationError,
    WrappedAccountCryptographicState,
};
pub mod api;
mod error;
pub use error::{ApiError, MissingFieldError};
mod flags;
pub use flags::{Flags, UpgradePolicy};
mod ids;
pub use ids::{DeviceId, EmergencyAccessId, OrganizationId, PasskeyCredentialId, UserId};
mod key_ids;
pub use key_ids::{AsymmetricKeyId, KeyIds, SigningKeyId, SymmetricKeyId};
mod master_password;
pub use master_password::{
    MasterPasswordAuthenticationData, MasterPasswordError, MasterPasswordUnlockData,
};
mod security_state;
pub use security_state::{SecurityState, SignedSecurityState};
mod state_reader;
pub use state_reader::{
    AccountKeyStorage, AccountState, CryptographicStateReader, StateReadError, StoredAccountKeys,
};
