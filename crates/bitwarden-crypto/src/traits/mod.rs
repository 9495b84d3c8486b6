pub(crate) mod key_id;
pub use key_id::{KeyId, KeyIds, LocalId};

#[cfg(test)]
pub(crate) mod tests {
    use crate::key_ids;
    key_ids! {
        #[symmetric]
        pub enum TestSymmKey {
            A(u32),

            // We only support one variant value,
            // but that value can be a tuple
            B((u8, u8)),

            #[local]
            C(LocalId),
        }

        #[asymmetric]
        pub enum TestAsymmKey {
            A(u16),
            B,
            #[local]
            C(LocalId),
        }

        #[signing]
        pub enum TestSigningKey {
            A(u8),
            B,
            #[local]
            C(LocalId),
        }

       pub TestIds => TestSymmKey, TestAsymmKey, TestSigningKey;
    }
}
