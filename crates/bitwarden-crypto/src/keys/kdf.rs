use std::num::NonZeroU32;

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use zeroize::Zeroizing;

use crate::{error::Result, util::pbkdf2, CryptoError};

/// Key Derivation Function for Bitwarden Account
///
/// In Bitwarden accounts can use multiple KDFs to derive their master key from their password. This
/// Enum represents all the possible KDFs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(missing_docs)]
pub enum Kdf {
    PBKDF2 {
        iterations: NonZeroU32,
    },
    Argon2id {
        iterations: NonZeroU32,
        /// Memory in MiB
        memory: NonZeroU32,
        parallelism: NonZeroU32,
    },
}

impl Default for Kdf {
    /// Default KDF for new accounts.
    fn default() -> Self {
        Kdf::PBKDF2 {
            iterations: default_pbkdf2_iterations(),
        }
    }
}

/// Default PBKDF2 iterations
pub fn default_pbkdf2_iterations() -> NonZeroU32 {
    NonZeroU32::new(600_000).expect("Non-zero number")
}
/// Default Argon2 iterations
pub fn default_argon2_iterations() -> NonZeroU32 {
    NonZeroU32::new(3).expect("Non-zero number")
}
/// Default Argon2 memory
pub fn default_argon2_memory() -> NonZeroU32 {
    NonZeroU32::new(64).expect("Non-zero number")
}
/// Default Argon2 parallelism
pub fn default_argon2_parallelism() -> NonZeroU32 {
    NonZeroU32::new(4).expect("Non-zero number")
}

/// Derive a 256-bit key from a secret and salt using the provided [Kdf].
///
/// PBKDF2 uses the salt as is, Argon2id uses the SHA-256 digest of the salt since it requires
/// a salt of at least 16 bytes.
pub(crate) fn derive_kdf_key(secret: &[u8], salt: &[u8], kdf: &Kdf) -> Result<Zeroizing<[u8; 32]>> {
    let hash = match kdf {
        Kdf::PBKDF2 { iterations } => Zeroizing::new(pbkdf2(secret, salt, iterations.get())?),
        Kdf::Argon2id {
            iterations,
            memory,
            parallelism,
        } => {
            // Convert MiB to KiB
            let memory = memory
                .get()
                .checked_mul(1024)
                .ok_or(CryptoError::InvalidKdfSettings)?;

            let argon = Argon2::new(
                Algorithm::Argon2id,
                Version::V0x13,
                Params::new(memory, iterations.get(), parallelism.get(), Some(32))?,
            );

            let salt_sha = sha2::Sha256::new().chain_update(salt).finalize();

            let mut hash = Zeroizing::new([0u8; 32]);
            argon.hash_password_into(secret, &salt_sha, hash.as_mut())?;
            hash
        }
    };
    Ok(hash)
}
