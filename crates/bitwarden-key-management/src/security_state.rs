//! Security state is a signed object that attests to a user's (or later an organization's)
//! security state. The security goal is to prevent downgrades of specific features within the
//! user's account that are not directly tied to the key hierarchy.
//!
//! The security state carries a version. Consumers may refuse features whose minimum security
//! version is above the account's version, and since the state is signed by the account's
//! signing key, a server cannot roll the version back without being detected.

use std::{fmt::Display, str::FromStr};

use bitwarden_crypto::{CryptoError, KeyStoreContext, SignedObject, SigningNamespace, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{KeyIds, SigningKeyId, UserId};

/// The security version written by new version 2 accounts and upgrades.
const CURRENT_SECURITY_VERSION: u64 = 2;

/// The security state is a signed object attesting to the security state of a user.
///
/// It contains a version, which can only ever increment. Based on the version, old formats and
/// features are blocked. This prevents a server from downgrading a user's account features,
/// because only the owner of the signing key can create a new security state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SecurityState {
    /// The entity ID is a permanent, unchangeable, unique identifier for the object this security
    /// state applies to. For users, this is the user ID, which never changes.
    entity_id: UserId,
    /// The version of the security state gates feature availability.
    version: u64,
}

impl SecurityState {
    /// Initialize a new `SecurityState` for the given user ID, to the lowest version possible.
    /// The user needs to be a V2 encryption user.
    pub fn initialize_for_user(user_id: UserId) -> Self {
        SecurityState {
            entity_id: user_id,
            version: CURRENT_SECURITY_VERSION,
        }
    }

    /// Returns the version of the security state
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The user this security state belongs to
    pub fn entity_id(&self) -> UserId {
        self.entity_id
    }

    /// Signs the `SecurityState` with the signing key held in `ctx` under `signing_key`.
    pub fn sign(
        &self,
        signing_key: SigningKeyId,
        ctx: &KeyStoreContext<KeyIds>,
    ) -> Result<SignedSecurityState, CryptoError> {
        Ok(SignedSecurityState(ctx.sign(
            signing_key,
            self,
            &SigningNamespace::SecurityState,
        )?))
    }
}

/// A signed and serialized `SecurityState` object.
#[derive(Clone, Debug, PartialEq)]
pub struct SignedSecurityState(SignedObject);

impl SignedSecurityState {
    /// Verifies the signature of the `SignedSecurityState` using the provided `VerifyingKey`.
    pub fn verify_and_unwrap(
        &self,
        verifying_key: &VerifyingKey,
    ) -> Result<SecurityState, CryptoError> {
        self.0
            .verify_and_unwrap(verifying_key, &SigningNamespace::SecurityState)
    }
}

impl FromStr for SignedSecurityState {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SignedSecurityState(s.parse()?))
    }
}

impl Display for SignedSecurityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for SignedSecurityState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SignedSecurityState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
