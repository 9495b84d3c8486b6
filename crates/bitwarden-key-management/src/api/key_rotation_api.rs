use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::models::RotateUserAccountKeysAndDataRequestModel;
use crate::ApiError;

const ROTATE_USER_ACCOUNT_KEYS_PATH: &str = "/accounts/key-management/rotate-user-account-keys";

/// Connection settings for the key management API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiSettings {
    /// The api url of the targeted Bitwarden instance. Defaults to `https://api.bitwarden.com`
    pub api_url: String,
    /// The user_agent to sent to Bitwarden. Defaults to `Bitwarden Rust-SDK`
    pub user_agent: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.bitwarden.com".to_string(),
            user_agent: "Bitwarden Rust-SDK".to_string(),
        }
    }
}

/// The remote account service that commits a key rotation.
///
/// The server applies the whole request or nothing. It is the single commit point of a rotation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserKeyRotationApi: Send + Sync {
    /// Submit the rotated account keys, unlock data and account data in one request.
    async fn rotate_user_account_keys(
        &self,
        request: &RotateUserAccountKeysAndDataRequestModel,
    ) -> Result<(), ApiError>;
}

/// [UserKeyRotationApi] backed by the Bitwarden REST API.
pub struct HttpUserKeyRotationApi {
    http_client: reqwest::Client,
    settings: ApiSettings,
    access_token: String,
}

impl HttpUserKeyRotationApi {
    /// Create a new client authenticating with the given OAuth access token
    pub fn new(settings: ApiSettings, access_token: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            settings,
            access_token,
        }
    }
}

#[async_trait]
impl UserKeyRotationApi for HttpUserKeyRotationApi {
    #[instrument(skip_all, err)]
    async fn rotate_user_account_keys(
        &self,
        request: &RotateUserAccountKeysAndDataRequestModel,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}{}",
            self.settings.api_url.trim_end_matches('/'),
            ROTATE_USER_ACCOUNT_KEYS_PATH
        );
        let body = serde_json::to_string(request)?;

        debug!(%url, "Posting key rotation request");
        let response = self
            .http_client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, self.settings.user_agent.clone())
            .bearer_auth(&self.access_token)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await?;
        Err(ApiError::ResponseContent { status, message })
    }
}

#[cfg(test)]
mod tests {
    use bitwarden_crypto::{
        AsymmetricCryptoKey, EncString, Kdf, KeyEncryptable, MasterKey, SymmetricCryptoKey,
    };
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::api::models::{
        AccountDataRequestModel, AccountKeysRequestModel, KdfType,
        MasterPasswordUnlockAndAuthenticationDataModel, PublicKeyEncryptionKeyPairRequestModel,
        UnlockDataRequestModel,
    };

    const ACCESS_TOKEN: &str = "test_access_token";
    const EMAIL: &str = "test@bitwarden.com";

    fn request() -> RotateUserAccountKeysAndDataRequestModel {
        let user_key = SymmetricCryptoKey::make_aes256_cbc_hmac_key();
        let private_key = AsymmetricCryptoKey::make().unwrap();
        let wrapped_private_key: EncString = private_key
            .to_der()
            .unwrap()
            .as_slice()
            .encrypt_with_key(&user_key)
            .unwrap();
        let kdf = Kdf::default();
        let master_key = MasterKey::derive("new password", EMAIL, &kdf).unwrap();

        RotateUserAccountKeysAndDataRequestModel {
            old_master_key_authentication_hash: "old_hash".to_string(),
            account_keys: AccountKeysRequestModel {
                user_key_encrypted_account_private_key: wrapped_private_key.clone(),
                account_public_key: "cHVibGljIGtleQ==".to_string(),
                public_key_encryption_key_pair: PublicKeyEncryptionKeyPairRequestModel {
                    wrapped_private_key,
                    public_key: "cHVibGljIGtleQ==".to_string(),
                    signed_public_key: None,
                },
                signature_key_pair: None,
                security_state: None,
            },
            account_unlock_data: UnlockDataRequestModel {
                master_password_unlock_data: MasterPasswordUnlockAndAuthenticationDataModel {
                    kdf_type: KdfType::PBKDF2_SHA256,
                    kdf_iterations: 600_000,
                    kdf_memory: None,
                    kdf_parallelism: None,
                    email: EMAIL.to_string(),
                    master_key_authentication_hash: "new_hash".to_string(),
                    master_key_encrypted_user_key: master_key.encrypt_user_key(&user_key).unwrap(),
                    master_password_hint: None,
                },
                emergency_access_unlock_data: Vec::new(),
                organization_account_recovery_unlock_data: Vec::new(),
                passkey_unlock_data: Vec::new(),
                device_key_unlock_data: Vec::new(),
            },
            account_data: AccountDataRequestModel::default(),
        }
    }

    fn api(server: &MockServer) -> HttpUserKeyRotationApi {
        HttpUserKeyRotationApi::new(
            ApiSettings {
                api_url: format!("http://{}/api", server.address()),
                user_agent: "Bitwarden Rust-SDK [TEST]".to_string(),
            },
            ACCESS_TOKEN.to_string(),
        )
    }

    #[tokio::test]
    async fn test_rotate_user_account_keys_posts_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/accounts/key-management/rotate-user-account-keys"))
            .and(header("authorization", format!("Bearer {ACCESS_TOKEN}")))
            .and(header("content-type", "application/json"))
            .and(header("user-agent", "Bitwarden Rust-SDK [TEST]"))
            .and(body_partial_json(serde_json::json!({
                "oldMasterKeyAuthenticationHash": "old_hash",
                "accountUnlockData": {
                    "emergencyAccessUnlockData": [],
                    "organizationAccountRecoveryUnlockData": [],
                    "passkeyUnlockData": [],
                    "deviceKeyUnlockData": [],
                },
                "accountData": { "ciphers": [], "folders": [], "sends": [] },
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let result = api(&server).rotate_user_account_keys(&request()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_rotate_user_account_keys_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/accounts/key-management/rotate-user-account-keys"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid master password"))
            .expect(1)
            .mount(&server)
            .await;

        let result = api(&server).rotate_user_account_keys(&request()).await;
        match result {
            Err(ApiError::ResponseContent { status, message }) => {
                assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
                assert_eq!(message, "Invalid master password");
            }
            other => panic!("Expected a response content error, got {other:?}"),
        }
    }

    #[test]
    fn test_api_settings_defaults() {
        let settings: ApiSettings = serde_json::from_str(r#"{"apiUrl":"https://vault.test"}"#)
            .unwrap();
        assert_eq!(settings.api_url, "https://vault.test");
        assert_eq!(settings.user_agent, "Bitwarden Rust-SDK");
    }
}
