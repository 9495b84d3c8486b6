//! Wire models and the HTTP client for committing a key rotation.

mod key_rotation_api;
pub use key_rotation_api::{ApiSettings, HttpUserKeyRotationApi, UserKeyRotationApi};
pub mod models;
