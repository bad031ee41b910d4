//! HTTP client for the shipping-rate collaborator.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::config::ShippingConfig;
use crate::models::ShippingAddress;

use super::{ParcelSpec, RateApiToken, RateProvider, RateQuote, ShippingError, authenticate};

/// Client for the shipping-rate API.
///
/// Holds the current bearer token and re-authenticates when it expires.
/// Quote failures are surfaced immediately; there is no in-process retry.
pub struct ShippingClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: SecretString,
    token: RwLock<Option<RateApiToken>>,
}

/// Origin or destination as the rate provider expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    pub zipcode: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

impl From<&ShippingAddress> for Waypoint {
    fn from(address: &ShippingAddress) -> Self {
        Self {
            zipcode: address.zipcode.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            country: address.country.clone(),
        }
    }
}

#[derive(Serialize)]
struct QuoteRequest<'a> {
    origin: &'a Waypoint,
    destination: &'a Waypoint,
    parcel: ParcelSpec,
}

#[derive(Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    rates: Vec<RateQuote>,
}

impl ShippingClient {
    /// Create a client from configuration.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &ShippingConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: RwLock::new(None),
        }
    }

    /// Get a valid access token, authenticating if needed.
    async fn access_token(&self) -> Result<SecretString, ShippingError> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref()
                && !token.is_expired()
            {
                return Ok(token.access_token.clone());
            }
        }

        let mut guard = self.token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = guard.as_ref()
            && !token.is_expired()
        {
            return Ok(token.access_token.clone());
        }

        debug!("authenticating with rate provider");
        let token = authenticate(
            &self.client,
            &self.base_url,
            &self.client_id,
            &self.client_secret,
        )
        .await?;
        let access = token.access_token.clone();
        *guard = Some(token);
        Ok(access)
    }
}

#[async_trait]
impl RateProvider for ShippingClient {
    /// Fetch carrier quotes for a shipment.
    ///
    /// Returns the provider's quotes as-is, successful or not; selection
    /// and filtering happen in [`super::select_default_quote`].
    #[instrument(skip(self, origin, destination), fields(dest_zip = %destination.zipcode))]
    async fn quote(
        &self,
        origin: &Waypoint,
        destination: &Waypoint,
        parcel: ParcelSpec,
    ) -> Result<Vec<RateQuote>, ShippingError> {
        let token = self.access_token().await?;

        let request = QuoteRequest {
            origin,
            destination,
            parcel,
        };

        let response = self
            .client
            .post(format!("{}/v1/rates", self.base_url))
            .bearer_auth(token.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_owned());
            return Err(ShippingError::Api(format!("HTTP {status}: {body}")));
        }

        let body: QuoteResponse = response.json().await?;
        debug!(count = body.rates.len(), "received rate quotes");
        Ok(body.rates)
    }
}
