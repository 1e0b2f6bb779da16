//! Identity providers.
//!
//! Both backends speak email and password and hand out bearer tokens:
//! - [`LocalIdentity`] keeps users in process with Argon2id hashes
//! - [`FirebaseIdentity`] talks to the Firebase Identity Toolkit REST API

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use advisor::ValidationErrors;

use crate::errors::{AuthError, AuthResult};

mod firebase;
mod local;

pub use firebase::FirebaseIdentity;
pub use local::{LocalIdentity, DEFAULT_SESSION_TTL_SECS};

/// Minimum password length accepted by the sign-up and sign-in forms.
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub uid: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A signed-in user plus the bearer token for later requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: UserInfo,
    pub token: String,
}

/// Email and password identity backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &'static str;

    /// Create an account and sign it in.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AuthResult<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session>;

    /// Resolve a bearer token to its user.
    async fn verify(&self, token: &str) -> AuthResult<UserInfo>;

    async fn sign_out(&self, token: &str) -> AuthResult<()>;
}

/// Check the sign-in form before contacting a provider.
pub fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    let mut errors = ValidationErrors::new();
    if email.trim().is_empty() {
        errors.add("email", "is required");
    } else if !EMAIL_PATTERN.is_match(email.trim()) {
        errors.add("email", "must be a valid email address");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
    errors.into_result().map_err(AuthError::Validation)
}

/// Normalize an email for lookups.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
