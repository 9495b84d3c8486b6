use zeroize::ZeroizeOnDrop;

use crate::KeyId;

mod basic;

/// This trait represents a platform that can securely store and return keys. The [basic]
/// implementation is a simple map held in process memory. Other implementations could use secure
/// enclaves or OS provided keychains.
pub(crate) trait StoreBackend<Key: KeyId>: ZeroizeOnDrop + Send + Sync {
    fn insert(&mut self, key_id: Key, key: Key::KeyValue);
    fn get(&self, key_id: Key) -> Option<&Key::KeyValue>;
    fn remove(&mut self, key_id: Key) -> Option<Key::KeyValue>;
    fn clear(&mut self);
}

/// Initializes a key store backend with the best available implementation for the current platform
pub(crate) fn create_store<Key: KeyId>() -> Box<dyn StoreBackend<Key>> {
    Box::new(basic::BasicBackend::<Key>::new())
}
