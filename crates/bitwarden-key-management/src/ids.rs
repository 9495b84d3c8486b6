//! Strongly typed identifiers for the entities taking part in a key rotation.

/// Declares a newtype around [uuid::Uuid] that serializes transparently as the uuid string.
#[macro_export]
macro_rules! uuid {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            #[allow(missing_docs)]
            pub const fn new(value: ::uuid::Uuid) -> Self {
                Self(value)
            }

            /// Create a new random identifier
            pub fn new_v4() -> Self {
                Self(::uuid::Uuid::new_v4())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                ::uuid::Uuid::parse_str(s).map(Self)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid!(
    /// Identifies a user account
    UserId
);
uuid!(
    /// Identifies an organization
    OrganizationId
);
uuid!(
    /// Identifies an emergency access grant
    EmergencyAccessId
);
uuid!(
    /// Identifies a trusted device
    DeviceId
);
uuid!(
    /// Identifies a passkey (WebAuthn) login credential
    PasskeyCredentialId
);
