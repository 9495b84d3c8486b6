use base64::{engine::general_purpose::STANDARD, Engine};
use zeroize::Zeroizing;

use super::{
    kdf::{derive_kdf_key, Kdf},
    key_encryptable::{CryptoKey, KeyDecryptable, KeyEncryptable},
    symmetric_crypto_key::{Aes256CbcHmacKey, SymmetricCryptoKey},
};
use crate::{
    error::Result,
    util::{hkdf_expand, pbkdf2},
    EncString,
};

/// Master Key.
///
/// Derived from the users master password, used to protect the [crate::SymmetricCryptoKey]
/// user key and to prove knowledge of the password to the server.
pub struct MasterKey(Zeroizing<[u8; 32]>);

impl MasterKey {
    /// Derives a users master key from their password, salt and KDF.
    pub fn derive(password: &str, salt: &str, kdf: &Kdf) -> Result<Self> {
        derive_kdf_key(password.as_bytes(), salt.as_bytes(), kdf).map(Self)
    }

    /// Derive the master key hash, used for server authorization.
    pub fn derive_master_key_hash(&self, password: &[u8]) -> Result<String> {
        let hash = Zeroizing::new(pbkdf2(self.0.as_slice(), password, 1)?);
        Ok(STANDARD.encode(hash.as_slice()))
    }

    /// Wrap the user key with the stretched master key.
    pub fn encrypt_user_key(&self, user_key: &SymmetricCryptoKey) -> Result<EncString> {
        let stretched = self.stretch()?;
        user_key.encrypt_with_key(&stretched)
    }

    /// Unwrap a master-key-wrapped user key. Fails if the password used to derive this
    /// master key was not the one used to wrap the user key.
    pub fn decrypt_user_key(&self, user_key: &EncString) -> Result<SymmetricCryptoKey> {
        let stretched = self.stretch()?;
        user_key.decrypt_with_key(&stretched)
    }

    fn stretch(&self) -> Result<SymmetricCryptoKey> {
        Ok(SymmetricCryptoKey::Aes256CbcHmacKey(Aes256CbcHmacKey {
            enc_key: hkdf_expand(self.0.as_slice(), Some("enc"))?,
            mac_key: hkdf_expand(self.0.as_slice(), Some("mac"))?,
        }))
    }
}

impl CryptoKey for MasterKey {}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;

    fn test_kdf() -> Kdf {
        Kdf::PBKDF2 {
            iterations: NonZeroU32::new(600_000).unwrap(),
        }
    }

    #[test]
    fn test_master_key_hash() {
        // Known answer for the well-known test account
        let master_key = MasterKey::derive("asdfasdf", "test@bitwarden.com", &test_kdf()).unwrap();
        assert_eq!(
            master_key.derive_master_key_hash(b"asdfasdf").unwrap(),
            "l0j2NrfATaQS7IyFlGBFN83wWcrTOcriYjNJbo+VC2M="
        );
    }

    #[test]
    fn test_wrap_unwrap_user_key() {
        let kdf = Kdf::PBKDF2 {
            iterations: NonZeroU32::new(1000).unwrap(),
        };
        let master_key = MasterKey::derive("password", "test@bitwarden.com", &kdf).unwrap();
        let user_key = SymmetricCryptoKey::make_xchacha20_poly1305_key();

        let wrapped = master_key.encrypt_user_key(&user_key).unwrap();
        let unwrapped = master_key.decrypt_user_key(&wrapped).unwrap();
        assert_eq!(user_key, unwrapped);
    }

    #[test]
    fn test_unwrap_with_wrong_password_fails() {
        let kdf = Kdf::PBKDF2 {
            iterations: NonZeroU32::new(1000).unwrap(),
        };
        let master_key = MasterKey::derive("password", "test@bitwarden.com", &kdf).unwrap();
        let wrapped = master_key
            .encrypt_user_key(&SymmetricCryptoKey::make_aes256_cbc_hmac_key())
            .unwrap();

        let wrong = MasterKey::derive("wrong", "test@bitwarden.com", &kdf).unwrap();
        assert!(wrong.decrypt_user_key(&wrapped).is_err());
    }
}
