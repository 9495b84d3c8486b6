//! Client to manage the cryptographic machinery of a user account, including key-rotation

use std::sync::Arc;

use bitwarden_key_management::{Flags, UserId};
use tokio::sync::Mutex;
use tracing::warn;

use crate::key_rotation::{
    self, RotateUserKeysError, RotateUserKeysRequest, RotationOutcome, RotationServices,
    RotationSettings,
};

/// Client for managing the cryptographic machinery of a user account, including key-rotation.
///
/// Clones share the run guard, so at most one rotation runs per account at a time.
#[derive(Clone)]
pub struct UserCryptoManagementClient {
    user_id: UserId,
    services: RotationServices,
    flags: Flags,
    settings: RotationSettings,
    run_guard: Arc<Mutex<()>>,
}

impl UserCryptoManagementClient {
    #[allow(missing_docs)]
    pub fn new(
        user_id: UserId,
        services: RotationServices,
        flags: Flags,
        settings: RotationSettings,
    ) -> Self {
        Self {
            user_id,
            services,
            flags,
            settings,
            run_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Rotates the user's encryption keys and changes the master password. The user must have a
    /// master password.
    ///
    /// The upgrade policy is resolved from the flags once, when the run starts. Returns
    /// [RotationOutcome::TrustDenied] if the user declines to trust a public key. On success the
    /// new user key is returned and every session of the account has been logged out.
    pub async fn rotate_user_keys_with_password_change(
        &self,
        request: RotateUserKeysRequest,
    ) -> Result<RotationOutcome, RotateUserKeysError> {
        request.validate()?;

        let _guard = self.run_guard.try_lock().map_err(|_| {
            warn!("Rejecting key rotation, another run is in progress");
            RotateUserKeysError::RotationInProgress
        })?;

        key_rotation::rotate_user_keys(
            self.user_id,
            &self.services,
            self.flags.upgrade_policy(),
            &self.settings,
            request,
        )
        .await
    }
}
