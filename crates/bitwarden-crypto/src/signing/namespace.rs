use crate::{error::SignatureError, CryptoError};

/// Signing is domain-separated within bitwarden, to prevent cross protocol attacks.
///
/// A new signed entity or protocol shall use a new signing namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningNamespace {
    /// The signed security state of an account
    SecurityState = 1,
    /// A public encryption key, signed by the owner of the encryption key pair
    SignedPublicKey = 2,
    #[cfg(test)]
    Test = -1,
}

impl SigningNamespace {
    /// Numeric identifier of the namespace, as written into signed objects.
    pub fn as_i64(&self) -> i64 {
        *self as i64
    }

    /// Parses the numeric identifier written by [SigningNamespace::as_i64].
    pub fn try_from_i64(value: i64) -> Result<Self, CryptoError> {
        match value {
            1 => Ok(Self::SecurityState),
            2 => Ok(Self::SignedPublicKey),
            #[cfg(test)]
            -1 => Ok(Self::Test),
            _ => Err(SignatureError::UnknownNamespace(value).into()),
        }
    }
}
