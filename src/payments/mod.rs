//! Hosted checkout sessions at a third-party payment gateway.
//!
//! The orchestrator only needs two calls: create a session for a cart and
//! read a session's payment status back when the browser returns from the
//! hosted page. [`StripeGateway`] talks to the real service over HTTPS and
//! [`InMemoryGateway`] stands in for it in development and tests.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

mod in_memory;
mod stripe;

pub use in_memory::{InMemoryGateway, StoredSession};
pub use stripe::{StripeConfig, StripeGateway};

/// Gateway-reported value meaning the customer completed payment.
pub const PAID: &str = "paid";

/// One priced line on the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayLineItem {
    pub name: String,
    /// Price in the smallest currency unit
    pub unit_amount: i64,
    pub quantity: i32,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    pub currency: String,
    pub line_items: Vec<GatewayLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub allowed_countries: Vec<String>,
    /// Kept in insertion order so the encoded form is stable
    pub metadata: Vec<(String, String)>,
}

impl CheckoutSessionRequest {
    /// Flattens the request into the gateway's bracketed form encoding.
    pub fn form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{}]", i);
            params.push((
                format!("{}[price_data][currency]", prefix),
                self.currency.clone(),
            ));
            params.push((
                format!("{}[price_data][product_data][name]", prefix),
                item.name.clone(),
            ));
            if let Some(image) = &item.image {
                params.push((
                    format!("{}[price_data][product_data][images][0]", prefix),
                    image.clone(),
                ));
            }
            params.push((
                format!("{}[price_data][unit_amount]", prefix),
                item.unit_amount.to_string(),
            ));
            params.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
        }

        for (i, country) in self.allowed_countries.iter().enumerate() {
            params.push((
                format!("shipping_address_collection[allowed_countries][{}]", i),
                country.clone(),
            ));
        }

        for (key, value) in &self.metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
        }

        params
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A freshly created hosted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub id: String,
    pub payment_status: String,
}

impl SessionStatus {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PAID
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, ServiceError>;
}

/// `price × 100` rounded half away from zero, the way the storefront has
/// always priced gateway lines.
pub fn to_minor_units(price: Decimal) -> Result<i64, ServiceError> {
    price
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|scaled| scaled.to_i64())
        .ok_or_else(|| ServiceError::ValidationError(format!("price {} is out of range", price)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minor_units_round_like_the_storefront() {
        assert_eq!(to_minor_units(dec!(500)).unwrap(), 50_000);
        assert_eq!(to_minor_units(dec!(19.99)).unwrap(), 1_999);
        assert_eq!(to_minor_units(dec!(0.125)).unwrap(), 13);
        assert_eq!(to_minor_units(dec!(10.004)).unwrap(), 1_000);
    }

    #[test]
    fn minor_units_overflow_is_a_validation_error() {
        assert!(matches!(
            to_minor_units(Decimal::MAX),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn form_params_use_bracketed_keys() {
        let request = CheckoutSessionRequest {
            currency: "inr".into(),
            line_items: vec![
                GatewayLineItem {
                    name: "Saree".into(),
                    unit_amount: 50_000,
                    quantity: 2,
                    image: Some("https://cdn.example.com/saree.jpg".into()),
                },
                GatewayLineItem {
                    name: "Dupatta".into(),
                    unit_amount: 25_050,
                    quantity: 1,
                    image: None,
                },
            ],
            success_url: "https://shop.example.com/paymentsuccess?session_id={CHECKOUT_SESSION_ID}"
                .into(),
            cancel_url: "https://shop.example.com/paymentcancel".into(),
            allowed_countries: vec!["IN".into()],
            metadata: vec![("userId".into(), "u1".into()), ("pinCode".into(), "411001".into())],
        };

        let params = request.form_params();
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("payment_method_types[0]"), Some("card"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("inr"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("50000"));
        assert_eq!(
            get("line_items[0][price_data][product_data][images][0]"),
            Some("https://cdn.example.com/saree.jpg")
        );
        assert_eq!(get("line_items[1][price_data][product_data][images][0]"), None);
        assert_eq!(get("line_items[1][quantity]"), Some("1"));
        assert_eq!(
            get("shipping_address_collection[allowed_countries][0]"),
            Some("IN")
        );
        assert_eq!(get("metadata[userId]"), Some("u1"));
        assert_eq!(request.metadata_value("pinCode"), Some("411001"));
    }
}
