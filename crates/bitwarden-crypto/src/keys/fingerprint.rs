//! This module provides functionality to generate a cryptographic fingerprint for a public key.
//! The fingerprint is the SHA-256 digest of the SubjectPublicKeyInfo DER encoding, which is a
//! canonical form of the key.
//!
//! Fingerprints are shown to users when they are asked to confirm that a public key belongs to a
//! party they trust. The rendering groups the hex digest so it can be compared by eye.

use std::fmt::Display;

use sha2::Digest;

use super::AsymmetricPublicCryptoKey;
use crate::error::Result;

const GROUP_SIZE: usize = 4;

/// A fingerprint represents a short, canonical representation of a public key.
///
/// Security assumption:
/// - The hash function has second pre-image resistance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyFingerprint {
    digest: [u8; 32],
}

impl PublicKeyFingerprint {
    /// The raw SHA-256 digest
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }
}

/// Renders the digest as lowercase hex in groups of four characters, separated by `-`.
impl Display for PublicKeyFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex: String = self.digest.iter().map(|b| format!("{b:02x}")).collect();
        let groups: Vec<&str> = hex
            .as_bytes()
            .chunks(GROUP_SIZE)
            .filter_map(|c| std::str::from_utf8(c).ok())
            .collect();
        write!(f, "{}", groups.join("-"))
    }
}

impl AsymmetricPublicCryptoKey {
    /// Returns the fingerprint of the public key.
    pub fn fingerprint(&self) -> Result<PublicKeyFingerprint> {
        let der = self.to_der()?;
        Ok(PublicKeyFingerprint {
            digest: sha2::Sha256::digest(der).into(),
        })
    }
}
