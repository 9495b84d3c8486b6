/// Feature flags relevant to account key management.
#[derive(Debug, Default, Clone, serde::Deserialize, serde::Serialize)]
pub struct Flags {
    /// Allow upgrading version 1 accounts to the version 2 key hierarchy during key rotation
    #[serde(default, rename = "enableUserCryptoV2Upgrade")]
    pub enable_user_crypto_v2_upgrade: bool,
}

impl Flags {
    /// Create a new `Flags` instance from a map of flag names and values.
    pub fn load_from_map(map: std::collections::HashMap<String, bool>) -> Self {
        let map = map
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::Bool(v)))
            .collect();
        // Every field is a defaulted bool, so any map of bools deserializes.
        serde_json::from_value(serde_json::Value::Object(map)).unwrap_or_default()
    }

    /// Resolve the flags into the upgrade policy for a single key rotation run.
    pub fn upgrade_policy(&self) -> UpgradePolicy {
        if self.enable_user_crypto_v2_upgrade {
            UpgradePolicy::UpgradeToV2
        } else {
            UpgradePolicy::KeepCurrentVersion
        }
    }
}

/// Whether a key rotation may move a version 1 account to the version 2 key hierarchy.
///
/// A version 2 account always stays on version 2, regardless of the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradePolicy {
    /// Rotate within the current version
    KeepCurrentVersion,
    /// Upgrade version 1 accounts to version 2 while rotating
    UpgradeToV2,
}
