//! HTTP client for the payment provider.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use verbena_core::PaymentId;

use crate::config::PaymentsConfig;

use super::{Payment, PaymentError, PaymentGateway, Preference, PreferenceRequest};

/// Reqwest-backed [`PaymentGateway`].
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: SecretString,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl HttpPaymentGateway {
    /// Create a gateway from configuration.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &PaymentsConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            access_token: config.access_token.clone(),
        }
    }

    async fn error_from(response: reqwest::Response) -> PaymentError {
        let status = response.status();
        let message = response
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| "unknown error".to_owned());
        PaymentError::Api(format!("HTTP {status}: {message}"))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(lines = request.line_items.len()))]
    async fn create_preference(
        &self,
        request: PreferenceRequest,
    ) -> Result<Preference, PaymentError> {
        let response = self
            .client
            .post(format!("{}/checkout/preferences", self.base_url))
            .bearer_auth(self.access_token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let preference: Preference = response
            .json()
            .await
            .map_err(|e| PaymentError::Api(e.to_string()))?;
        debug!(preference_id = %preference.id, "created payment preference");
        Ok(preference)
    }

    #[instrument(skip(self))]
    async fn fetch_payment(&self, id: &PaymentId) -> Result<Payment, PaymentError> {
        let response = self
            .client
            .get(format!("{}/v1/payments/{id}", self.base_url))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::PaymentNotFound(id.clone()));
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::Api(e.to_string()))
    }
}
