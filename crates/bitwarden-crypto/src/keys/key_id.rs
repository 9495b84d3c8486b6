use rand::Rng;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Key ids are random 16 byte values, the size of a UUID.
pub(crate) const KEY_ID_SIZE: usize = 16;

/// A key id is a unique identifier for a single key. There is a 1:1 mapping between key ID and key
/// bytes, so rotating the user key replaces the key with ID A by a new key with ID B.
///
/// Written into the COSE headers of everything the key encrypts or signs, so that a message is
/// only ever opened with the key that created it.
#[derive(Clone, PartialEq, Eq, Zeroize)]
pub(crate) struct KeyId([u8; KEY_ID_SIZE]);

impl ConstantTimeEq for KeyId {
    fn ct_eq(&self, other: &Self) -> subtle::Choice {
        self.0.ct_eq(&other.0)
    }
}

impl KeyId {
    /// Creates a new random key ID, sampled from the crate's CSPRNG.
    pub(crate) fn make() -> Self {
        let mut key_id = [0u8; KEY_ID_SIZE];
        rand::thread_rng().fill(&mut key_id);
        Self(key_id)
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for KeyId {
    type Error = crate::CryptoError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let key_id: [u8; KEY_ID_SIZE] = value
            .try_into()
            .map_err(|_| crate::CryptoError::InvalidKey)?;
        Ok(Self(key_id))
    }
}

impl From<&KeyId> for Vec<u8> {
    fn from(key_id: &KeyId) -> Self {
        key_id.0.to_vec()
    }
}

impl From<[u8; KEY_ID_SIZE]> for KeyId {
    fn from(bytes: [u8; KEY_ID_SIZE]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyId({})", uuid::Uuid::from_bytes(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ids_are_random() {
        assert_ne!(KeyId::make(), KeyId::make());
    }

    #[test]
    fn test_try_from_slice_checks_length() {
        assert!(KeyId::try_from([0u8; 15].as_slice()).is_err());
        let key_id = KeyId::try_from([7u8; KEY_ID_SIZE].as_slice()).unwrap();
        assert_eq!(key_id.as_slice(), &[7u8; KEY_ID_SIZE]);
    }

    #[test]
    fn test_debug_prints_uuid() {
        let key_id = KeyId::from([0u8; KEY_ID_SIZE]);
        assert_eq!(
            format!("{key_id:?}"),
            "KeyId(00000000-0000-0000-0000-000000000000)"
        );
    }
}
