//! Interactive confirmation of third-party public keys.
//!
//! Re-sharing the user key with an organization or an emergency contact encapsulates it to a
//! public key the server hands out. The server could substitute its own key, so the user has to
//! confirm each key by its fingerprint first. Only keys confirmed during the current run end up
//! in a [TrustedPublicKeys] set, and nothing outside this module can build one.

use std::{collections::HashMap, fmt::Display, hash::Hash, sync::Arc};

use async_trait::async_trait;
use bitwarden_crypto::{
    AsymmetricPublicCryptoKey, CryptoError, KeyStoreContext, PublicKeyFingerprint,
    UnsignedSharedKey,
};
use bitwarden_key_management::{EmergencyAccessId, KeyIds, OrganizationId, SymmetricKeyId};
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::services::{EmergencyAccessGrantee, OrganizationMembership, ServiceError};

/// What the user is asked to confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustSubject {
    /// Informational step listing how many parties will receive the new key
    Summary {
        #[allow(missing_docs)]
        organizations: usize,
        #[allow(missing_docs)]
        emergency_contacts: usize,
    },
    /// An organization the user is enrolled in account recovery with
    Organization {
        #[allow(missing_docs)]
        id: OrganizationId,
        #[allow(missing_docs)]
        name: String,
        #[allow(missing_docs)]
        fingerprint: PublicKeyFingerprint,
    },
    /// An emergency access grantee
    EmergencyAccess {
        #[allow(missing_docs)]
        id: EmergencyAccessId,
        #[allow(missing_docs)]
        name: String,
        #[allow(missing_docs)]
        fingerprint: PublicKeyFingerprint,
    },
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    Approved,
    Declined,
}

/// Asks the user to confirm a [TrustSubject]. May suspend for as long as the user takes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrustPrompt: Send + Sync {
    #[allow(missing_docs)]
    async fn confirm(&self, subject: TrustSubject) -> TrustDecision;
}

/// Encapsulation to a public key the user did not confirm in this run.
#[derive(Debug, Error)]
#[error("The public key of {0} was not confirmed by the user")]
pub struct UntrustedKeyError(pub String);

/// Public keys confirmed by the user, keyed by the owning entity.
#[derive(Debug, Clone)]
pub struct TrustedPublicKeys<Id> {
    keys: HashMap<Id, AsymmetricPublicCryptoKey>,
}

impl<Id> TrustedPublicKeys<Id>
where
    Id: Copy + Eq + Hash + Display,
{
    fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    fn insert(&mut self, id: Id, public_key: AsymmetricPublicCryptoKey) {
        self.keys.insert(id, public_key);
    }

    /// The confirmed key of `id`, if `public_key` is the key the user confirmed.
    pub fn get(
        &self,
        id: Id,
        public_key: &AsymmetricPublicCryptoKey,
    ) -> Result<&AsymmetricPublicCryptoKey, UntrustedKeyError> {
        match self.keys.get(&id) {
            Some(trusted) if trusted == public_key => Ok(trusted),
            Some(_) => {
                warn!(%id, "Public key differs from the key the user confirmed");
                Err(UntrustedKeyError(id.to_string()))
            }
            None => {
                warn!(%id, "No confirmed public key");
                Err(UntrustedKeyError(id.to_string()))
            }
        }
    }

    /// Encapsulates the key `user_key` to the public key of `id`. Fails unless `public_key` was
    /// confirmed for `id`.
    pub fn encapsulate(
        &self,
        id: Id,
        public_key: &AsymmetricPublicCryptoKey,
        user_key: SymmetricKeyId,
        ctx: &KeyStoreContext<KeyIds>,
    ) -> Result<UnsignedSharedKey, ServiceError> {
        let trusted = self.get(id, public_key)?;
        Ok(UnsignedSharedKey::encapsulate(user_key, trusted, ctx)?)
    }

    /// The entities with a confirmed key
    pub fn ids(&self) -> impl Iterator<Item = &Id> {
        self.keys.keys()
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// The outcome of asking the user to trust every third-party key.
#[derive(Debug)]
pub enum TrustVerification {
    /// Every key was confirmed
    Approved {
        #[allow(missing_docs)]
        organizations: TrustedPublicKeys<OrganizationId>,
        #[allow(missing_docs)]
        emergency_access: TrustedPublicKeys<EmergencyAccessId>,
    },
    /// The user declined one of the prompts. Later prompts were not shown.
    Denied,
}

/// Walks the user through confirming organization and emergency access keys.
pub struct TrustVerifier {
    prompt: Arc<dyn TrustPrompt>,
}

impl TrustVerifier {
    #[allow(missing_docs)]
    pub fn new(prompt: Arc<dyn TrustPrompt>) -> Self {
        Self { prompt }
    }

    /// Prompts, in order, for a summary (only if there is anyone to share with), each
    /// organization and each emergency contact. The first decline ends verification.
    #[instrument(
        skip_all,
        fields(
            organizations = organizations.len(),
            emergency_contacts = emergency_contacts.len()
        )
    )]
    pub async fn verify(
        &self,
        organizations: &[OrganizationMembership],
        emergency_contacts: &[EmergencyAccessGrantee],
    ) -> Result<TrustVerification, CryptoError> {
        let mut trusted_organizations = TrustedPublicKeys::new();
        let mut trusted_emergency_access = TrustedPublicKeys::new();

        if !organizations.is_empty() || !emergency_contacts.is_empty() {
            let summary = TrustSubject::Summary {
                organizations: organizations.len(),
                emergency_contacts: emergency_contacts.len(),
            };
            if self.prompt.confirm(summary).await == TrustDecision::Declined {
                info!("User declined the key sharing summary");
                return Ok(TrustVerification::Denied);
            }
        }

        for organization in organizations {
            let subject = TrustSubject::Organization {
                id: organization.organization_id,
                name: organization.name.clone(),
                fingerprint: organization.public_key.fingerprint()?,
            };
            if self.prompt.confirm(subject).await == TrustDecision::Declined {
                info!(
                    organization_id = %organization.organization_id,
                    "User declined organization key"
                );
                return Ok(TrustVerification::Denied);
            }
            trusted_organizations.insert(
                organization.organization_id,
                organization.public_key.clone(),
            );
        }

        for contact in emergency_contacts {
            let subject = TrustSubject::EmergencyAccess {
                id: contact.id,
                name: contact.name.clone(),
                fingerprint: contact.public_key.fingerprint()?,
            };
            if self.prompt.confirm(subject).await == TrustDecision::Declined {
                info!(emergency_access_id = %contact.id, "User declined emergency access key");
                return Ok(TrustVerification::Denied);
            }
            trusted_emergency_access.insert(contact.id, contact.public_key.clone());
        }

        Ok(TrustVerification::Approved {
            organizations: trusted_organizations,
            emergency_access: trusted_emergency_access,
        })
    }
}

#[cfg(test)]
pub(crate) fn trust_all(
    organizations: &[OrganizationMembership],
    emergency_contacts: &[EmergencyAccessGrantee],
) -> (
    TrustedPublicKeys<OrganizationId>,
    TrustedPublicKeys<EmergencyAccessId>,
) {
    let mut trusted_organizations = TrustedPublicKeys::new();
    for organization in organizations {
        trusted_organizations.insert(
            organization.organization_id,
            organization.public_key.clone(),
        );
    }
    let mut trusted_emergency_access = TrustedPublicKeys::new();
    for contact in emergency_contacts {
        trusted_emergency_access.insert(contact.id, contact.public_key.clone());
    }
    (trusted_organizations, trusted_emergency_access)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bitwarden_crypto::{AsymmetricCryptoKey, KeyStore, SymmetricKeyAlgorithm};
    use bitwarden_key_management::api::models::EmergencyAccessType;

    use super::*;

    fn organization(name: &str) -> OrganizationMembership {
        OrganizationMembership {
            organization_id: OrganizationId::new_v4(),
            name: name.to_string(),
            public_key: AsymmetricCryptoKey::make().unwrap().to_public_key(),
        }
    }

    fn contact(name: &str) -> EmergencyAccessGrantee {
        EmergencyAccessGrantee {
            id: EmergencyAccessId::new_v4(),
            name: name.to_string(),
            public_key: AsymmetricCryptoKey::make().unwrap().to_public_key(),
            access_type: EmergencyAccessType::Takeover,
            wait_time_days: 7,
        }
    }

    /// Records every prompt and declines the first subject matching `decline`.
    fn recording_prompt(
        decline: impl Fn(&TrustSubject) -> bool + Send + Sync + 'static,
    ) -> (MockTrustPrompt, Arc<Mutex<Vec<TrustSubject>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut prompt = MockTrustPrompt::new();
        prompt.expect_confirm().returning(move |subject| {
            let decision = if decline(&subject) {
                TrustDecision::Declined
            } else {
                TrustDecision::Approved
            };
            seen_clone.lock().unwrap().push(subject);
            decision
        });
        (prompt, seen)
    }

    #[tokio::test]
    async fn test_no_parties_skips_all_prompts() {
        let mut prompt = MockTrustPrompt::new();
        prompt.expect_confirm().never();

        let result = TrustVerifier::new(Arc::new(prompt))
            .verify(&[], &[])
            .await
            .unwrap();
        match result {
            TrustVerification::Approved {
                organizations,
                emergency_access,
            } => {
                assert!(organizations.is_empty());
                assert!(emergency_access.is_empty());
            }
            TrustVerification::Denied => panic!("Expected approval"),
        }
    }

    #[tokio::test]
    async fn test_prompts_in_order() {
        let org = organization("Acme");
        let ea = contact("Alice");
        let (prompt, seen) = recording_prompt(|_| false);

        let result = TrustVerifier::new(Arc::new(prompt))
            .verify(std::slice::from_ref(&org), std::slice::from_ref(&ea))
            .await
            .unwrap();
        assert!(matches!(result, TrustVerification::Approved { .. }));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[0],
            TrustSubject::Summary {
                organizations: 1,
                emergency_contacts: 1
            }
        );
        assert_eq!(
            seen[1],
            TrustSubject::Organization {
                id: org.organization_id,
                name: "Acme".to_string(),
                fingerprint: org.public_key.fingerprint().unwrap(),
            }
        );
        assert!(matches!(
            &seen[2],
            TrustSubject::EmergencyAccess { id, name, .. } if *id == ea.id && name == "Alice"
        ));
    }

    #[tokio::test]
    async fn test_decline_stops_later_prompts() {
        let orgs = [organization("First"), organization("Second")];
        let (prompt, seen) = recording_prompt(
            |subject| matches!(subject, TrustSubject::Organization { name, .. } if name == "First"),
        );

        let result = TrustVerifier::new(Arc::new(prompt))
            .verify(&orgs, &[contact("Alice")])
            .await
            .unwrap();
        assert!(matches!(result, TrustVerification::Denied));
        // Summary and the declined organization only
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_declined_summary() {
        let (prompt, seen) = recording_prompt(|s| matches!(s, TrustSubject::Summary { .. }));
        let result = TrustVerifier::new(Arc::new(prompt))
            .verify(&[], &[contact("Alice")])
            .await
            .unwrap();
        assert!(matches!(result, TrustVerification::Denied));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_encapsulate_to_untrusted_key_fails() {
        let org = organization("Acme");
        let (trusted, _) = trust_all(std::slice::from_ref(&org), &[]);
        let store: KeyStore<KeyIds> = KeyStore::default();
        let mut ctx = store.context();
        let user_key = ctx.make_symmetric_key(SymmetricKeyAlgorithm::Aes256CbcHmac);

        let substituted = AsymmetricCryptoKey::make().unwrap().to_public_key();
        assert!(matches!(
            trusted.encapsulate(org.organization_id, &substituted, user_key, &ctx),
            Err(ServiceError::UntrustedKey(_))
        ));
        assert!(matches!(
            trusted.encapsulate(OrganizationId::new_v4(), &org.public_key, user_key, &ctx),
            Err(ServiceError::UntrustedKey(_))
        ));
        assert!(trusted
            .encapsulate(org.organization_id, &org.public_key, user_key, &ctx)
            .is_ok());
    }
}
