use std::sync::{Arc, PoisonError, RwLock};

use crate::KeyIds;

mod backend;
mod context;

use backend::{create_store, StoreBackend};
use context::GlobalKeys;
pub use context::KeyStoreContext;

/// An in-memory key store that provides a safe and secure way to store keys and use them for
/// encryption/decryption operations. The store API is designed to work only on key identifiers
/// ([KeyId][crate::KeyId]). These identifiers are user-defined types that contain no key material,
/// which means the API users don't have to worry about accidentally leaking keys.
///
/// Each store is designed to be used by a single user and should not be shared between users, but
/// the store itself is thread safe and can be cloned to share between threads.
///
/// ```rust
/// # use bitwarden_crypto::*;
///
/// // We need to define our own key identifier types. We provide a macro to make this easier.
/// key_ids! {
///     #[symmetric]
///     pub enum SymmKeyId {
///         User,
///         #[local]
///         Local(LocalId),
///     }
///     #[asymmetric]
///     pub enum AsymmKeyId {
///         UserPrivate,
///         #[local]
///         Local(LocalId),
///     }
///     #[signing]
///     pub enum SigningKeyId {
///         UserSigning,
///         #[local]
///         Local(LocalId),
///     }
///     pub Ids => SymmKeyId, AsymmKeyId, SigningKeyId;
/// }
///
/// let store: KeyStore<Ids> = KeyStore::default();
///
/// let mut ctx = store.context_mut();
/// let local = ctx.make_symmetric_key(SymmetricKeyAlgorithm::XChaCha20Poly1305);
/// ctx.persist_symmetric_key(local, SymmKeyId::User).unwrap();
/// drop(ctx);
///
/// let encrypted = store
///     .context()
///     .encrypt_data_with_symmetric_key(SymmKeyId::User, b"Hello, World!", ContentFormat::OctetStream)
///     .unwrap();
/// ```
pub struct KeyStore<Ids: KeyIds> {
    // We use an Arc<> to make it easier to pass this store around, as we can
    // clone it instead of passing references
    inner: Arc<RwLock<KeyStoreInner<Ids>>>,
}

impl<Ids: KeyIds> Clone for KeyStore<Ids> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Ids: KeyIds> std::fmt::Debug for KeyStore<Ids> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore").finish()
    }
}

struct KeyStoreInner<Ids: KeyIds> {
    symmetric_keys: Box<dyn StoreBackend<Ids::Symmetric>>,
    asymmetric_keys: Box<dyn StoreBackend<Ids::Asymmetric>>,
    signing_keys: Box<dyn StoreBackend<Ids::Signing>>,
}

impl<Ids: KeyIds> Default for KeyStore<Ids> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ids: KeyIds> KeyStore<Ids> {
    /// Create a new key store with the best available implementation for the current platform.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(KeyStoreInner {
                symmetric_keys: create_store(),
                asymmetric_keys: create_store(),
                signing_keys: create_store(),
            })),
        }
    }

    /// Clear all keys from the store. This can be used to clear all keys from memory in case of
    /// lock/logout, and is equivalent to destroying the store and creating a new one.
    pub fn clear(&self) {
        let mut keys = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        keys.symmetric_keys.clear();
        keys.asymmetric_keys.clear();
        keys.signing_keys.clear();
    }

    /// Initiate an encryption/decryption context. This context will have read only access to the
    /// global keys, and will have its own local key stores with read/write access. This
    /// context-local store will be cleared up when the context is dropped.
    ///
    /// Keys stored in the context-local store only get cleared when the context is dropped, and
    /// not between operations.
    pub fn context(&'_ self) -> KeyStoreContext<'_, Ids> {
        KeyStoreContext::new(GlobalKeys::ReadOnly(
            self.inner.read().unwrap_or_else(PoisonError::into_inner),
        ))
    }

    /// Initiate an encryption/decryption context. This context will have MUTABLE access to the
    /// global keys, and will have its own local key stores with read/write access. This
    /// context-local store will be cleared up when the context is dropped.
    ///
    /// Only one mutable context can exist at a time. It must not be held across an `.await`.
    pub fn context_mut(&'_ self) -> KeyStoreContext<'_, Ids> {
        KeyStoreContext::new(GlobalKeys::ReadWrite(
            self.inner.write().unwrap_or_else(PoisonError::into_inner),
        ))
    }
}
