mod key_encryptable;
pub(crate) mod key_id;
pub use key_encryptable::{CryptoKey, KeyDecryptable, KeyEncryptable};
mod master_key;
pub use master_key::MasterKey;
mod symmetric_crypto_key;
pub use symmetric_crypto_key::{
    Aes256CbcHmacKey, SymmetricCryptoKey, SymmetricKeyAlgorithm, XChaCha20Poly1305Key,
};
mod asymmetric_crypto_key;
pub use asymmetric_crypto_key::{
    AsymmetricCryptoKey, AsymmetricPublicCryptoKey, PublicKeyEncryptionAlgorithm,
};
mod signed_public_key;
pub use signed_public_key::{SignedPublicKey, SignedPublicKeyMessage};
mod fingerprint;
pub use fingerprint::PublicKeyFingerprint;
mod kdf;
pub use kdf::{
    default_argon2_iterations, default_argon2_memory, default_argon2_parallelism,
    default_pbkdf2_iterations, Kdf,
};
