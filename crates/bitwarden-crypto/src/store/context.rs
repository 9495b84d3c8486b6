use std::{
    cell::Cell,
    sync::{RwLockReadGuard, RwLockWriteGuard},
};

use serde::Serialize;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::{backend::create_store, KeyStoreInner, StoreBackend};
use crate::{
    error::Result, AsymmetricCryptoKey, AsymmetricPublicCryptoKey, ContentFormat, CryptoError,
    EncString, KeyDecryptable, KeyEncryptable, KeyId, KeyIds, LocalId, MasterKey,
    PublicKeyEncryptionAlgorithm, SignatureAlgorithm, SignedObject, SignedPublicKey,
    SignedPublicKeyMessage, SigningKey, SigningNamespace, SymmetricCryptoKey,
    SymmetricKeyAlgorithm, VerifyingKey,
};

/// The context of a crypto operation using [super::KeyStore]
///
/// This context contains access to the keys stored in the [super::KeyStore] (sometimes referred
/// to as `global keys`) and it also contains its own individual secure backend for key storage.
/// Keys stored in this individual backend are usually referred to as `local keys`, they will be
/// cleared when this context goes out of scope and is dropped and they do not affect either the
/// global [super::KeyStore] or other instances of contexts.
///
/// Every operation that creates or unwraps a key stores it as a local key and returns its id.
/// [KeyStoreContext::persist_symmetric_key] and its siblings move a local key into a global slot,
/// which requires a context created with [super::KeyStore::context_mut].
///
/// ```rust
/// # use bitwarden_crypto::*;
/// # key_ids! {
/// #     #[symmetric]
/// #     pub enum SymmKeyId {
/// #         User,
/// #         #[local]
/// #         Local(LocalId),
/// #     }
/// #     #[asymmetric]
/// #     pub enum AsymmKeyId {
/// #         UserPrivate,
/// #         #[local]
/// #         Local(LocalId),
/// #     }
/// #     #[signing]
/// #     pub enum SigningKeyId {
/// #         UserSigning,
/// #         #[local]
/// #         Local(LocalId),
/// #     }
/// #     pub Ids => SymmKeyId, AsymmKeyId, SigningKeyId;
/// # }
/// let store: KeyStore<Ids> = KeyStore::default();
/// let mut ctx = store.context();
///
/// let wrapping_key = ctx.make_symmetric_key(SymmetricKeyAlgorithm::XChaCha20Poly1305);
/// let private_key = ctx.make_private_key(PublicKeyEncryptionAlgorithm::RsaOaepSha1).unwrap();
///
/// let wrapped = ctx.wrap_private_key(wrapping_key, private_key).unwrap();
/// let unwrapped = ctx.unwrap_private_key(wrapping_key, &wrapped).unwrap();
/// assert_eq!(
///     ctx.get_public_key(private_key).unwrap(),
///     ctx.get_public_key(unwrapped).unwrap()
/// );
/// ```
#[must_use]
pub struct KeyStoreContext<'a, Ids: KeyIds> {
    global_keys: GlobalKeys<'a, Ids>,

    local_symmetric_keys: Box<dyn StoreBackend<Ids::Symmetric>>,
    local_asymmetric_keys: Box<dyn StoreBackend<Ids::Asymmetric>>,
    local_signing_keys: Box<dyn StoreBackend<Ids::Signing>>,

    // Make sure the context is !Send & !Sync
    _phantom: std::marker::PhantomData<(Cell<()>, RwLockReadGuard<'static, ()>)>,
}

// A KeyStoreContext is usually limited to a read only access to the global keys,
// which allows us to have multiple read only contexts at the same time. We also have the option to
// create a read/write context, which allows us to modify the global keys, but only allows one
// context at a time. This is controlled by a RWLock on the global keys, and this struct stores
// both types of guards.
pub(crate) enum GlobalKeys<'a, Ids: KeyIds> {
    ReadOnly(RwLockReadGuard<'a, KeyStoreInner<Ids>>),
    ReadWrite(RwLockWriteGuard<'a, KeyStoreInner<Ids>>),
}

impl<Ids: KeyIds> GlobalKeys<'_, Ids> {
    fn get(&self) -> &KeyStoreInner<Ids> {
        match self {
            GlobalKeys::ReadOnly(keys) => keys,
            GlobalKeys::ReadWrite(keys) => keys,
        }
    }

    fn get_mut(&mut self) -> Result<&mut KeyStoreInner<Ids>> {
        match self {
            GlobalKeys::ReadOnly(_) => Err(CryptoError::ReadOnlyKeyStore),
            GlobalKeys::ReadWrite(keys) => Ok(keys),
        }
    }
}

impl<'a, Ids: KeyIds> KeyStoreContext<'a, Ids> {
    pub(super) fn new(global_keys: GlobalKeys<'a, Ids>) -> Self {
        Self {
            global_keys,
            local_symmetric_keys: create_store(),
            local_asymmetric_keys: create_store(),
            local_signing_keys: create_store(),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<Ids: KeyIds> KeyStoreContext<'_, Ids> {
    /// Clears all the local keys stored in this context. The global keys are left untouched.
    pub fn clear_local(&mut self) {
        self.local_symmetric_keys.clear();
        self.local_asymmetric_keys.clear();
        self.local_signing_keys.clear();
    }

    /// Generate a new random symmetric key of the given algorithm and store it as a local key
    pub fn make_symmetric_key(&mut self, algorithm: SymmetricKeyAlgorithm) -> Ids::Symmetric {
        let key = match algorithm {
            SymmetricKeyAlgorithm::Aes256CbcHmac => SymmetricCryptoKey::make_aes256_cbc_hmac_key(),
            SymmetricKeyAlgorithm::XChaCha20Poly1305 => {
                SymmetricCryptoKey::make_xchacha20_poly1305_key()
            }
        };
        self.add_local_symmetric_key(key)
    }

    /// Generate a new private key and store it as a local key
    pub fn make_private_key(
        &mut self,
        algorithm: PublicKeyEncryptionAlgorithm,
    ) -> Result<Ids::Asymmetric> {
        let key = match algorithm {
            PublicKeyEncryptionAlgorithm::RsaOaepSha1 => AsymmetricCryptoKey::make()?,
        };
        Ok(self.add_local_private_key(key))
    }

    /// Generate a new signing key and store it as a local key
    pub fn make_signing_key(&mut self, algorithm: SignatureAlgorithm) -> Ids::Signing {
        self.add_local_signing_key(SigningKey::make(algorithm))
    }

    /// Adds a symmetric key to the context under a new local id
    pub fn add_local_symmetric_key(&mut self, key: SymmetricCryptoKey) -> Ids::Symmetric {
        let key_id = Ids::Symmetric::new_local(LocalId::new());
        self.local_symmetric_keys.insert(key_id, key);
        key_id
    }

    /// Adds a private key to the context under a new local id
    pub fn add_local_private_key(&mut self, key: AsymmetricCryptoKey) -> Ids::Asymmetric {
        let key_id = Ids::Asymmetric::new_local(LocalId::new());
        self.local_asymmetric_keys.insert(key_id, key);
        key_id
    }

    /// Adds a signing key to the context under a new local id
    pub fn add_local_signing_key(&mut self, key: SigningKey) -> Ids::Signing {
        let key_id = Ids::Signing::new_local(LocalId::new());
        self.local_signing_keys.insert(key_id, key);
        key_id
    }

    /// Copies the symmetric key `from` into the slot `to`. Persisting into a global slot needs a
    /// context with write access to the store.
    pub fn persist_symmetric_key(
        &mut self,
        from: Ids::Symmetric,
        to: Ids::Symmetric,
    ) -> Result<()> {
        let key = self.get_symmetric_key(from)?.clone();
        #[allow(deprecated)]
        self.set_symmetric_key(to, key)
    }

    /// Copies the private key `from` into the slot `to`.
    pub fn persist_asymmetric_key(
        &mut self,
        from: Ids::Asymmetric,
        to: Ids::Asymmetric,
    ) -> Result<()> {
        let key = self.get_asymmetric_key(from)?.clone();
        #[allow(deprecated)]
        self.set_asymmetric_key(to, key)
    }

    /// Copies the signing key `from` into the slot `to`.
    pub fn persist_signing_key(&mut self, from: Ids::Signing, to: Ids::Signing) -> Result<()> {
        let key = self.get_signing_key(from)?.clone();
        #[allow(deprecated)]
        self.set_signing_key(to, key)
    }

    /// Returns `true` if the context has a symmetric key with the given id
    pub fn has_symmetric_key(&self, key_id: Ids::Symmetric) -> bool {
        self.get_symmetric_key(key_id).is_ok()
    }

    /// Returns `true` if the context has an asymmetric key with the given id
    pub fn has_asymmetric_key(&self, key_id: Ids::Asymmetric) -> bool {
        self.get_asymmetric_key(key_id).is_ok()
    }

    /// Returns `true` if the context has a signing key with the given id
    pub fn has_signing_key(&self, key_id: Ids::Signing) -> bool {
        self.get_signing_key(key_id).is_ok()
    }

    /// The algorithm of the symmetric key with the given id
    pub fn get_symmetric_key_algorithm(
        &self,
        key_id: Ids::Symmetric,
    ) -> Result<SymmetricKeyAlgorithm> {
        Ok(self.get_symmetric_key(key_id)?.algorithm())
    }

    /// Compares two symmetric keys in constant time
    pub fn symmetric_keys_match(&self, a: Ids::Symmetric, b: Ids::Symmetric) -> Result<bool> {
        let a = self.get_symmetric_key(a)?;
        let b = self.get_symmetric_key(b)?;
        Ok(a.ct_eq(b).into())
    }

    /// The public key of the private key with the given id
    pub fn get_public_key(&self, key_id: Ids::Asymmetric) -> Result<AsymmetricPublicCryptoKey> {
        Ok(self.get_asymmetric_key(key_id)?.to_public_key())
    }

    /// The verifying key of the signing key with the given id
    pub fn get_verifying_key(&self, key_id: Ids::Signing) -> Result<VerifyingKey> {
        Ok(self.get_signing_key(key_id)?.to_verifying_key())
    }

    /// Signs the public key of `private_key` with `signing_key`, binding the encryption key pair
    /// to the signing identity.
    pub fn make_signed_public_key(
        &self,
        private_key: Ids::Asymmetric,
        signing_key: Ids::Signing,
    ) -> Result<SignedPublicKey> {
        let public_key = self.get_public_key(private_key)?;
        SignedPublicKeyMessage::from_public_key(&public_key)?
            .sign(self.get_signing_key(signing_key)?)
    }

    /// Signs `message` under `namespace` with the signing key with the given id
    pub fn sign<Message: Serialize>(
        &self,
        signing_key: Ids::Signing,
        message: &Message,
        namespace: &SigningNamespace,
    ) -> Result<SignedObject> {
        self.get_signing_key(signing_key)?.sign(message, namespace)
    }

    /// Wraps `key_to_wrap` with `wrapping_key`. Both keys must exist in the context.
    pub fn wrap_symmetric_key(
        &self,
        wrapping_key: Ids::Symmetric,
        key_to_wrap: Ids::Symmetric,
    ) -> Result<EncString> {
        let wrapping_key = self.get_symmetric_key(wrapping_key)?;
        self.get_symmetric_key(key_to_wrap)?
            .encrypt_with_key(wrapping_key)
    }

    /// Unwraps a symmetric key into the context, under a new local id
    pub fn unwrap_symmetric_key(
        &mut self,
        wrapping_key: Ids::Symmetric,
        wrapped_key: &EncString,
    ) -> Result<Ids::Symmetric> {
        let key: SymmetricCryptoKey =
            wrapped_key.decrypt_with_key(self.get_symmetric_key(wrapping_key)?)?;
        Ok(self.add_local_symmetric_key(key))
    }

    /// Wraps a private key as PKCS8 with the symmetric `wrapping_key`
    pub fn wrap_private_key(
        &self,
        wrapping_key: Ids::Symmetric,
        key_to_wrap: Ids::Asymmetric,
    ) -> Result<EncString> {
        self.get_asymmetric_key(key_to_wrap)?
            .wrap(self.get_symmetric_key(wrapping_key)?)
    }

    /// Unwraps a private key into the context, under a new local id
    pub fn unwrap_private_key(
        &mut self,
        wrapping_key: Ids::Symmetric,
        wrapped_key: &EncString,
    ) -> Result<Ids::Asymmetric> {
        let key = AsymmetricCryptoKey::from_wrapped(
            wrapped_key,
            self.get_symmetric_key(wrapping_key)?,
        )?;
        Ok(self.add_local_private_key(key))
    }

    /// Wraps a signing key as a COSE key with the symmetric `wrapping_key`
    pub fn wrap_signing_key(
        &self,
        wrapping_key: Ids::Symmetric,
        key_to_wrap: Ids::Signing,
    ) -> Result<EncString> {
        self.get_signing_key(key_to_wrap)?
            .wrap(self.get_symmetric_key(wrapping_key)?)
    }

    /// Unwraps a signing key into the context, under a new local id
    pub fn unwrap_signing_key(
        &mut self,
        wrapping_key: Ids::Symmetric,
        wrapped_key: &EncString,
    ) -> Result<Ids::Signing> {
        let key = SigningKey::from_wrapped(wrapped_key, self.get_symmetric_key(wrapping_key)?)?;
        Ok(self.add_local_signing_key(key))
    }

    /// Wraps the symmetric key with the given id with a master key
    pub fn wrap_symmetric_key_with_master_key(
        &self,
        master_key: &MasterKey,
        key_to_wrap: Ids::Symmetric,
    ) -> Result<EncString> {
        master_key.encrypt_user_key(self.get_symmetric_key(key_to_wrap)?)
    }

    /// Unwraps a master-key-wrapped symmetric key into the context, under a new local id
    pub fn unwrap_symmetric_key_with_master_key(
        &mut self,
        master_key: &MasterKey,
        wrapped_key: &EncString,
    ) -> Result<Ids::Symmetric> {
        let key = master_key.decrypt_user_key(wrapped_key)?;
        Ok(self.add_local_symmetric_key(key))
    }

    /// Encrypts `data` with the symmetric key with the given id. The content format is recorded
    /// in COSE encrypted strings.
    pub fn encrypt_data_with_symmetric_key(
        &self,
        key: Ids::Symmetric,
        data: &[u8],
        content_format: ContentFormat,
    ) -> Result<EncString> {
        EncString::encrypt_with_symmetric_key(data, content_format, self.get_symmetric_key(key)?)
    }

    /// Decrypts `data` with the symmetric key with the given id
    pub fn decrypt_data_with_symmetric_key(
        &self,
        key: Ids::Symmetric,
        data: &EncString,
    ) -> Result<Vec<u8>> {
        data.decrypt_with_key(self.get_symmetric_key(key)?)
    }

    /// Decrypts `data` with `from` and encrypts the plaintext with `to`, keeping the content
    /// format. Legacy strings carry no content format; their plaintext is treated as text when it
    /// is valid UTF-8.
    pub fn reencrypt_data(
        &self,
        from: Ids::Symmetric,
        to: Ids::Symmetric,
        data: &EncString,
    ) -> Result<EncString> {
        let (plaintext, content_format) =
            data.decrypt_with_content_format(self.get_symmetric_key(from)?)?;
        let plaintext = Zeroizing::new(plaintext);
        let content_format = content_format.unwrap_or_else(|| {
            if std::str::from_utf8(&plaintext).is_ok() {
                ContentFormat::Utf8
            } else {
                ContentFormat::OctetStream
            }
        });
        self.encrypt_data_with_symmetric_key(to, &plaintext, content_format)
    }

    #[deprecated(note = "This function should ideally never be used outside this crate")]
    #[allow(missing_docs)]
    pub fn dangerous_get_symmetric_key(
        &self,
        key_id: Ids::Symmetric,
    ) -> Result<&SymmetricCryptoKey> {
        self.get_symmetric_key(key_id)
    }

    #[deprecated(note = "This function should ideally never be used outside this crate")]
    #[allow(missing_docs)]
    pub fn dangerous_get_asymmetric_key(
        &self,
        key_id: Ids::Asymmetric,
    ) -> Result<&AsymmetricCryptoKey> {
        self.get_asymmetric_key(key_id)
    }

    pub(crate) fn get_symmetric_key(&self, key_id: Ids::Symmetric) -> Result<&SymmetricCryptoKey> {
        if key_id.is_local() {
            self.local_symmetric_keys.get(key_id)
        } else {
            self.global_keys.get().symmetric_keys.get(key_id)
        }
        .ok_or_else(|| CryptoError::MissingKeyId(format!("{key_id:?}")))
    }

    pub(crate) fn get_asymmetric_key(
        &self,
        key_id: Ids::Asymmetric,
    ) -> Result<&AsymmetricCryptoKey> {
        if key_id.is_local() {
            self.local_asymmetric_keys.get(key_id)
        } else {
            self.global_keys.get().asymmetric_keys.get(key_id)
        }
        .ok_or_else(|| CryptoError::MissingKeyId(format!("{key_id:?}")))
    }

    pub(crate) fn get_signing_key(&self, key_id: Ids::Signing) -> Result<&SigningKey> {
        if key_id.is_local() {
            self.local_signing_keys.get(key_id)
        } else {
            self.global_keys.get().signing_keys.get(key_id)
        }
        .ok_or_else(|| CryptoError::MissingKeyId(format!("{key_id:?}")))
    }

    #[deprecated(note = "This function should ideally never be used outside this crate")]
    #[allow(missing_docs)]
    pub fn set_symmetric_key(
        &mut self,
        key_id: Ids::Symmetric,
        key: SymmetricCryptoKey,
    ) -> Result<()> {
        if key_id.is_local() {
            self.local_symmetric_keys.insert(key_id, key);
        } else {
            self.global_keys
                .get_mut()?
                .symmetric_keys
                .insert(key_id, key);
        }
        Ok(())
    }

    #[deprecated(note = "This function should ideally never be used outside this crate")]
    #[allow(missing_docs)]
    pub fn set_asymmetric_key(
        &mut self,
        key_id: Ids::Asymmetric,
        key: AsymmetricCryptoKey,
    ) -> Result<()> {
        if key_id.is_local() {
            self.local_asymmetric_keys.insert(key_id, key);
        } else {
            self.global_keys
                .get_mut()?
                .asymmetric_keys
                .insert(key_id, key);
        }
        Ok(())
    }

    #[deprecated(note = "This function should ideally never be used outside this crate")]
    #[allow(missing_docs)]
    pub fn set_signing_key(&mut self, key_id: Ids::Signing, key: SigningKey) -> Result<()> {
        if key_id.is_local() {
            self.local_signing_keys.insert(key_id, key);
        } else {
            self.global_keys.get_mut()?.signing_keys.insert(key_id, key);
        }
        Ok(())
    }
}
