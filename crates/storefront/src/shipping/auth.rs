//! Rate-provider authentication.
//!
//! Exchanges client credentials for a bearer token used on quote requests.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ShippingError;

/// Bearer token obtained from the rate provider.
#[derive(Debug, Clone)]
pub struct RateApiToken {
    /// Access token for quote requests.
    pub access_token: SecretString,
    /// Unix timestamp when the token expires.
    pub expires_at: i64,
}

/// Request body for rate-provider authentication.
#[derive(Serialize)]
struct AuthRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

/// Response from the rate-provider token endpoint.
#[derive(Deserialize)]
struct AuthResponse {
    access_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

/// Error response from the token endpoint.
#[derive(Deserialize)]
struct AuthErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Authenticate with the rate provider using client credentials.
///
/// # Errors
///
/// Returns `ShippingError::AuthenticationFailed` if the credentials are
/// invalid, `ShippingError::Request` for transport failures.
#[instrument(skip(client, client_secret))]
pub async fn authenticate(
    client: &reqwest::Client,
    base_url: &str,
    client_id: &str,
    client_secret: &SecretString,
) -> Result<RateApiToken, ShippingError> {
    let now = chrono::Utc::now().timestamp();

    let response = client
        .post(format!("{base_url}/auth/token"))
        .json(&AuthRequest {
            client_id,
            client_secret: client_secret.expose_secret(),
        })
        .send()
        .await?;

    let status = response.status();

    if status.is_success() {
        let auth_response: AuthResponse = response.json().await?;
        Ok(RateApiToken {
            access_token: SecretString::from(auth_response.access_token),
            expires_at: now + auth_response.expires_in,
        })
    } else if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        let error_response: AuthErrorResponse =
            response.json().await.unwrap_or_else(|_| AuthErrorResponse {
                error: None,
                message: Some("Invalid credentials".to_owned()),
            });

        let message = error_response
            .message
            .or(error_response.error)
            .unwrap_or_else(|| "Invalid credentials".to_owned());

        Err(ShippingError::AuthenticationFailed(message))
    } else {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_owned());

        Err(ShippingError::AuthenticationFailed(format!(
            "HTTP {status}: {error_text}"
        )))
    }
}

impl RateApiToken {
    /// Check if the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        // Consider expired if less than 60 seconds remaining
        now >= self.expires_at - 60
    }
}
