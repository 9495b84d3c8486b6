use bitwarden_crypto::key_ids;

key_ids! {
    #[symmetric]
    pub enum SymmetricKeyId {
        User,
        // The user key an in-progress rotation moves the account to
        RotatedUser,
        #[local]
        Local(LocalId),
    }

    #[asymmetric]
    pub enum AsymmetricKeyId {
        UserPrivateKey,
        #[local]
        Local(LocalId),
    }

    #[signing]
    pub enum SigningKeyId {
        UserSigningKey,
        #[local]
        Local(LocalId),
    }

    pub KeyIds => SymmetricKeyId, AsymmetricKeyId, SigningKeyId;
}
