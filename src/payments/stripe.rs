use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{CheckoutSession, CheckoutSessionRequest, PaymentGateway, SessionStatus};
use crate::errors::ServiceError;

/// Stripe configuration
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub publishable_key: Option<String>,
    /// `https://api.stripe.com` outside of tests
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"<redacted>")
            .field("publishable_key", &self.publishable_key)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Checkout sessions against the Stripe REST API
#[derive(Clone, Debug)]
pub struct StripeGateway {
    config: StripeConfig,
    client: reqwest::Client,
}

impl StripeGateway {
    /// Builds the gateway with a client that gives up on Stripe after 30s.
    pub fn new(config: StripeConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("failed to construct Stripe client: {}", e))
            })?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: StripeConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/v1/checkout/sessions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    async fn error_from_response(response: reqwest::Response) -> ServiceError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .and_then(|envelope| envelope.error.message)
            .unwrap_or_else(|| format!("gateway responded with {}", status));
        warn!(%status, "Stripe API error: {}", message);
        ServiceError::ExternalServiceError(message)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(line_items = request.line_items.len()))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        let response = self
            .client
            .post(self.sessions_url())
            .basic_auth(&self.config.secret_key, Some(""))
            .form(&request.form_params())
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let session: StripeSession = response.json().await.map_err(|e| {
            ServiceError::SerializationError(format!("Failed to parse Stripe response: {}", e))
        })?;

        let url = session.url.ok_or_else(|| {
            ServiceError::ExternalServiceError(format!(
                "checkout session {} has no redirect url",
                session.id
            ))
        })?;

        info!("Checkout session created: {}", session.id);
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    #[instrument(skip(self))]
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, ServiceError> {
        if !is_session_id(session_id) {
            return Err(ServiceError::ValidationError(format!(
                "malformed checkout session id '{}'",
                session_id
            )));
        }

        let response = self
            .client
            .get(format!("{}/{}", self.sessions_url(), session_id))
            .basic_auth(&self.config.secret_key, Some(""))
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let session: StripeSession = response.json().await.map_err(|e| {
            ServiceError::SerializationError(format!("Failed to parse Stripe response: {}", e))
        })?;

        Ok(SessionStatus {
            id: session.id,
            payment_status: session.payment_status.unwrap_or_default(),
        })
    }
}

/// Session ids are a single path segment such as `cs_test_a1B2`.
fn is_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}
