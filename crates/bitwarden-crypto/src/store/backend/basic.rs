use std::collections::HashMap;

use zeroize::ZeroizeOnDrop;

use super::StoreBackend;
use crate::KeyId;

/// This is a basic key store backend that stores keys in a HashMap memory.
/// No protections are provided for the keys stored in this backend, beyond enforcing
/// zeroization on drop.
pub(crate) struct BasicBackend<Key: KeyId> {
    keys: HashMap<Key, Key::KeyValue>,
}

impl<Key: KeyId> BasicBackend<Key> {
    pub(crate) fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }
}

impl<Key: KeyId> StoreBackend<Key> for BasicBackend<Key> {
    fn insert(&mut self, key_id: Key, key: Key::KeyValue) {
        self.keys.insert(key_id, key);
    }

    fn get(&self, key_id: Key) -> Option<&Key::KeyValue> {
        self.keys.get(&key_id)
    }

    fn remove(&mut self, key_id: Key) -> Option<Key::KeyValue> {
        self.keys.remove(&key_id)
    }

    fn clear(&mut self) {
        self.keys.clear();
    }
}

// Key::KeyValue already implements ZeroizeOnDrop,
// so we only need to ensure the map is cleared on drop.
impl<Key: KeyId> ZeroizeOnDrop for BasicBackend<Key> {}
impl<Key: KeyId> Drop for BasicBackend<Key> {
    fn drop(&mut self) {
        self.clear();
    }
}
