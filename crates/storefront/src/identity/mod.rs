//! Identity collaborator.
//!
//! The storefront never manages credentials itself. An external identity
//! provider exchanges a transient credential for a signed session token at
//! login and verifies that token on every authenticated request; the core
//! only consumes "is there a valid signed-in identity, and what is its
//! subject id".

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use verbena_core::UserId;

/// A verified signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: UserId,
}

/// Errors from the identity collaborator.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The credential or session token is missing, invalid, or expired.
    #[error("unauthenticated")]
    Unauthenticated,

    /// The provider call itself failed.
    #[error("identity provider failure: {0}")]
    Upstream(String),
}

/// Contract for issuing and verifying session tokens.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a session token, returning the identity it was issued for.
    async fn verify(&self, session_token: &str) -> Result<Identity, IdentityError>;

    /// Exchange a transient credential for a session token valid for `ttl`.
    async fn issue(
        &self,
        transient_credential: &str,
        ttl: Duration,
    ) -> Result<String, IdentityError>;
}

/// HTTP client for a hosted identity provider.
pub struct HttpIdentityClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    session_token: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    subject_id: String,
}

#[derive(Serialize)]
struct IssueRequest<'a> {
    credential: &'a str,
    ttl_seconds: u64,
}

#[derive(Deserialize)]
struct IssueResponse {
    session_token: String,
}

impl HttpIdentityClient {
    /// Create a client for the given provider endpoint.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityClient {
    #[instrument(skip(self, session_token))]
    async fn verify(&self, session_token: &str) -> Result<Identity, IdentityError> {
        let response = self
            .client
            .post(format!("{}/v1/sessions/verify", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&VerifyRequest { session_token })
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(IdentityError::Unauthenticated);
        }
        if !status.is_success() {
            return Err(IdentityError::Upstream(format!("HTTP {status}")));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        Ok(Identity {
            subject_id: UserId::new(body.subject_id),
        })
    }

    #[instrument(skip(self, transient_credential))]
    async fn issue(
        &self,
        transient_credential: &str,
        ttl: Duration,
    ) -> Result<String, IdentityError> {
        let response = self
            .client
            .post(format!("{}/v1/sessions/issue", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&IssueRequest {
                credential: transient_credential,
                ttl_seconds: ttl.as_secs(),
            })
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(IdentityError::Unauthenticated);
        }
        if !status.is_success() {
            return Err(IdentityError::Upstream(format!("HTTP {status}")));
        }

        let body: IssueResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        Ok(body.session_token)
    }
}

/// Fixed token-to-subject mapping. Test and local-development provider.
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, UserId>,
}

impl StaticIdentityProvider {
    /// Build a provider from `(token, subject id)` pairs.
    #[must_use]
    pub fn new(pairs: impl IntoIterator<Item = (String, UserId)>) -> Self {
        Self {
            tokens: pairs.into_iter().collect(),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify(&self, session_token: &str) -> Result<Identity, IdentityError> {
        self.tokens
            .get(session_token)
            .map(|subject_id| Identity {
                subject_id: subject_id.clone(),
            })
            .ok_or(IdentityError::Unauthenticated)
    }

    async fn issue(
        &self,
        transient_credential: &str,
        _ttl: Duration,
    ) -> Result<String, IdentityError> {
        // Credentials double as tokens in the static provider.
        if self.tokens.contains_key(transient_credential) {
            Ok(transient_credential.to_owned())
        } else {
            Err(IdentityError::Unauthenticated)
        }
    }
}
