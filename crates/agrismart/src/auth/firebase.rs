//! Firebase Authentication over the Identity Toolkit REST API.
//!
//! ID tokens are verified with `accounts:lookup` on every call, so nothing
//! is cached here and sign-out has nothing to revoke.

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use advisor::ValidationErrors;

use super::{validate_credentials, IdentityProvider, Session, UserInfo};
use crate::errors::{AuthError, AuthResult};

const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Firebase API key environment variable.
pub const FIREBASE_API_KEY_ENV: &str = "FIREBASE_API_KEY";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    email: String,
    id_token: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Firebase Authentication identity provider.
pub struct FirebaseIdentity {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FirebaseIdentity {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Read the API key from `FIREBASE_API_KEY`.
    pub fn from_env() -> Option<Self> {
        std::env::var(FIREBASE_API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .map(Self::new)
    }

    /// Point at a different endpoint (emulator or tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn call<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        operation: &str,
        body: &B,
    ) -> AuthResult<T> {
        let url = format!("{}/accounts:{operation}", self.base_url);
        debug!(operation, "Calling Identity Toolkit");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let code = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            warn!(operation, status = status.as_u16(), code = %code, "Identity Toolkit call failed");
            return Err(map_error_code(&code));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    fn name(&self) -> &'static str {
        "firebase"
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AuthResult<Session> {
        validate_credentials(email, password)?;

        let created: AuthResponse = self
            .call(
                "signUp",
                &PasswordRequest {
                    email: email.trim(),
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        let mut user = UserInfo {
            uid: created.local_id,
            email: created.email,
            display_name: None,
        };

        if let Some(name) = display_name.map(str::trim).filter(|name| !name.is_empty()) {
            // The account exists already; a failed update leaves it unnamed.
            let updated: AuthResult<serde_json::Value> = self
                .call(
                    "update",
                    &UpdateProfileRequest {
                        id_token: &created.id_token,
                        display_name: name,
                        return_secure_token: false,
                    },
                )
                .await;
            match updated {
                Ok(_) => user.display_name = Some(name.to_string()),
                Err(e) => warn!(uid = %user.uid, error = %e, "Failed to set display name"),
            }
        }

        info!(uid = %user.uid, "Firebase account created");
        Ok(Session {
            user,
            token: created.id_token,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        validate_credentials(email, password)?;

        let signed_in: AuthResponse = self
            .call(
                "signInWithPassword",
                &PasswordRequest {
                    email: email.trim(),
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        Ok(Session {
            user: UserInfo {
                uid: signed_in.local_id,
                email: signed_in.email,
                display_name: signed_in.display_name.filter(|name| !name.is_empty()),
            },
            token: signed_in.id_token,
        })
    }

    async fn verify(&self, token: &str) -> AuthResult<UserInfo> {
        let lookup: LookupResponse = self.call("lookup", &LookupRequest { id_token: token }).await?;
        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or(AuthError::InvalidToken)?;

        Ok(UserInfo {
            uid: user.local_id,
            email: user.email,
            display_name: user.display_name.filter(|name| !name.is_empty()),
        })
    }

    async fn sign_out(&self, _token: &str) -> AuthResult<()> {
        Ok(())
    }
}

/// Map an Identity Toolkit error code to an [`AuthError`].
///
/// Codes may carry a detail suffix, e.g. `WEAK_PASSWORD : Password should be
/// at least 6 characters`.
fn map_error_code(message: &str) -> AuthError {
    let code = message.split(" : ").next().unwrap_or(message).trim();
    match code {
        "EMAIL_EXISTS" => AuthError::EmailExists,
        "INVALID_LOGIN_CREDENTIALS" | "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" => {
            AuthError::InvalidCredentials
        }
        "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => {
            AuthError::InvalidToken
        }
        "USER_DISABLED" => AuthError::Provider("This account has been disabled".to_string()),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::TooManyAttempts,
        "WEAK_PASSWORD" => field_error("password", "is too weak"),
        "INVALID_EMAIL" => field_error("email", "must be a valid email address"),
        _ => AuthError::Provider(message.to_string()),
    }
}

fn field_error(field: &str, message: &str) -> AuthError {
    let mut errors = ValidationErrors::new();
    errors.add(field, message);
    AuthError::Validation(errors)
}
