use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{CheckoutSession, CheckoutSessionRequest, PaymentGateway, SessionStatus, PAID};
use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct StoredSession {
    pub request: CheckoutSessionRequest,
    pub payment_status: String,
}

/// Process-local gateway: sessions live in a map and are paid by calling
/// [`InMemoryGateway::mark_paid`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    base_url: String,
    sessions: Arc<DashMap<String, StoredSession>>,
    fail_creates: Arc<AtomicBool>,
}

impl InMemoryGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn session(&self, session_id: &str) -> Option<StoredSession> {
        self.sessions.get(session_id).map(|entry| entry.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Returns false when the session is unknown.
    pub fn set_payment_status(&self, session_id: &str, status: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut entry) => {
                entry.payment_status = status.to_string();
                true
            }
            None => false,
        }
    }

    pub fn mark_paid(&self, session_id: &str) -> bool {
        self.set_payment_status(session_id, PAID)
    }

    /// Makes every following create call fail until switched back.
    pub fn fail_session_creation(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError(
                "gateway unavailable".to_string(),
            ));
        }

        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        let url = format!("{}/checkout/{}", self.base_url.trim_end_matches('/'), id);
        self.sessions.insert(
            id.clone(),
            StoredSession {
                request: request.clone(),
                payment_status: "unpaid".to_string(),
            },
        );
        info!("In-memory checkout session created: {}", id);

        Ok(CheckoutSession { id, url })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, ServiceError> {
        self.sessions
            .get(session_id)
            .map(|entry| SessionStatus {
                id: session_id.to_string(),
                payment_status: entry.payment_status.clone(),
            })
            .ok_or_else(|| {
                ServiceError::ExternalServiceError(format!(
                    "No such checkout.session: '{}'",
                    session_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            currency: "inr".into(),
            line_items: Vec::new(),
            success_url: String::new(),
            cancel_url: String::new(),
            allowed_countries: vec!["IN".into()],
            metadata: Vec::new(),
        }
    }

    #[tokio::test]
    async fn sessions_start_unpaid_and_can_be_paid() {
        let gateway = InMemoryGateway::new("http://localhost:3000/");
        let session = gateway
            .create_checkout_session(&empty_request())
            .await
            .unwrap();

        assert!(session.id.starts_with("cs_test_"));
        assert_eq!(
            session.url,
            format!("http://localhost:3000/checkout/{}", session.id)
        );
        assert!(!gateway.retrieve_session(&session.id).await.unwrap().is_paid());

        assert!(gateway.mark_paid(&session.id));
        assert!(gateway.retrieve_session(&session.id).await.unwrap().is_paid());
    }

    #[tokio::test]
    async fn unknown_session_is_an_upstream_error() {
        let gateway = InMemoryGateway::new("http://localhost");
        assert!(!gateway.mark_paid("cs_missing"));
        assert!(matches!(
            gateway.retrieve_session("cs_missing").await,
            Err(ServiceError::ExternalServiceError(_))
        ));
    }

    #[tokio::test]
    async fn creation_can_be_forced_to_fail() {
        let gateway = InMemoryGateway::new("http://localhost");
        gateway.fail_session_creation(true);
        assert!(gateway
            .create_checkout_session(&empty_request())
            .await
            .is_err());
        assert_eq!(gateway.session_count(), 0);
    }
}
