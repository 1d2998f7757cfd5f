//! Checkout orchestration: cart payload -> gateway session -> pending order,
//! and the confirmation step that marks orders paid when the customer
//! returns from the hosted payment page.

use std::sync::Arc;

use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveEnum, ActiveModelTrait, ActiveValue::Set, ColumnTrait,
    DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    entities::{order, order_item, LineItemStatus, PaymentStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    payments::{
        to_minor_units, CheckoutSessionRequest, GatewayLineItem, PaymentGateway, SessionStatus,
    },
    services::orders::OrderDetails,
};

pub const INVALID_PRODUCTS: &str = "Invalid products data";

/// One cart line as the storefront submits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLineItem {
    #[serde(rename = "_id")]
    #[validate(length(min = 1, max = 64, message = "product id is required"))]
    pub product_id: String,
    #[validate(length(min = 1, message = "productName is required"))]
    pub product_name: String,
    #[validate(custom = "validate_positive_price")]
    pub product_price: Decimal,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    #[serde(default)]
    pub product_images: Vec<String>,
}

impl CheckoutLineItem {
    /// `None` when price × quantity does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        self.product_price.checked_mul(Decimal::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub products: Vec<CheckoutLineItem>,
    #[validate(length(min = 1, max = 64, message = "userId is required"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "customerName is required"))]
    pub customer_name: String,
    #[validate(length(min = 1, message = "customerContactNumber is required"))]
    pub customer_contact_number: String,
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "pinCode is required"))]
    pub pin_code: String,
}

impl CheckoutRequest {
    /// Σ price × quantity over the submitted prices.
    pub fn total_amount(&self) -> Result<Decimal, ServiceError> {
        self.products
            .iter()
            .try_fold(Decimal::ZERO, |total, item| {
                item.line_total().and_then(|line| total.checked_add(line))
            })
            .ok_or_else(|| {
                ServiceError::ValidationError("order total is out of range".to_string())
            })
    }

    fn check(&self) -> Result<(), ServiceError> {
        if self.products.is_empty() {
            return Err(ServiceError::ValidationError(
                "products must not be empty".to_string(),
            ));
        }
        self.validate()?;
        for item in &self.products {
            item.validate()?;
        }
        self.total_amount()?;
        Ok(())
    }
}

fn validate_positive_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_positive() && !price.is_zero() {
        Ok(())
    } else {
        let mut err = ValidationError::new("positive_price");
        err.message = Some("productPrice must be greater than zero".into());
        Err(err)
    }
}

/// Turns a raw body into a validated request. A missing or non-array
/// `products` field is reported separately from any other shape problem.
pub fn parse_checkout_payload(payload: Value) -> Result<CheckoutRequest, ServiceError> {
    if !matches!(payload.get("products"), Some(Value::Array(_))) {
        return Err(ServiceError::InvalidInput(INVALID_PRODUCTS.to_string()));
    }

    let request: CheckoutRequest = serde_json::from_value(payload)
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    request.check()?;
    Ok(request)
}

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: String,
    pub shipping_country: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub session_id: String,
    pub session_url: String,
    pub order: OrderDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentConfirmation {
    Paid { orders_updated: u64 },
    NotPaid { payment_status: String },
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: EventSender,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
            settings,
        }
    }

    /// Validates the cart, opens a hosted session and records a pending
    /// order keyed by the session id. Nothing is written if the gateway call
    /// fails.
    #[instrument(skip(self, payload))]
    pub async fn create_checkout_session(
        &self,
        payload: Value,
        origin: &str,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let request = parse_checkout_payload(payload).map_err(|e| {
            warn!("Rejected checkout payload: {}", e);
            counter!("storefront.checkout.failures", 1);
            e
        })?;

        let session_request = self.session_request(&request, origin)?;
        let session = self
            .gateway
            .create_checkout_session(&session_request)
            .await
            .map_err(|e| {
                error!("Failed to create checkout session: {}", e);
                counter!("storefront.checkout.failures", 1);
                e
            })?;

        let order = self
            .persist_pending_order(&request, &session.id)
            .await
            .map_err(|e| {
                counter!("storefront.checkout.failures", 1);
                e
            })?;

        counter!("storefront.checkout.sessions_created", 1);
        info!(
            order_id = %order.order.id,
            session_id = %session.id,
            "Checkout session created for {} line items",
            order.products.len()
        );
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: order.order.id,
                payment_session_id: session.id.clone(),
                total_amount: order.order.total_amount,
            })
            .await;

        Ok(CheckoutOutcome {
            session_id: session.id,
            session_url: session.url,
            order,
        })
    }

    /// Reads the session back from the gateway and marks matching orders
    /// paid. Safe to repeat.
    #[instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        session_id: &str,
    ) -> Result<PaymentConfirmation, ServiceError> {
        if session_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "session_id is required".to_string(),
            ));
        }

        let SessionStatus { payment_status, .. } =
            self.gateway.retrieve_session(session_id).await.map_err(|e| {
                error!("Failed to retrieve checkout session {}: {}", session_id, e);
                e
            })?;

        if payment_status != crate::payments::PAID {
            info!(
                "Session {} reported '{}', leaving orders pending",
                session_id, payment_status
            );
            counter!("storefront.payments.not_paid", 1);
            return Ok(PaymentConfirmation::NotPaid { payment_status });
        }

        let db = &*self.db;
        let newly_paid: Vec<Uuid> = order::Entity::find()
            .filter(order::Column::PaymentSessionId.eq(session_id))
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Pending))
            .all(db)
            .await
            .map_err(|e| {
                error!("Failed to look up orders for session {}: {}", session_id, e);
                ServiceError::DatabaseError(e)
            })?
            .into_iter()
            .map(|o| o.id)
            .collect();

        let result = order::Entity::update_many()
            .col_expr(
                order::Column::PaymentStatus,
                Expr::value(PaymentStatus::Success.to_value()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .filter(order::Column::PaymentSessionId.eq(session_id))
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Pending))
            .exec(db)
            .await
            .map_err(|e| {
                error!("Failed to mark session {} paid: {}", session_id, e);
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            let known = order::Entity::find()
                .filter(order::Column::PaymentSessionId.eq(session_id))
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .is_some();
            if known {
                info!("Session {} was already confirmed", session_id);
            } else {
                warn!("Paid session {} matches no order", session_id);
            }
        }
        counter!("storefront.payments.confirmed", 1);

        for order_id in newly_paid {
            self.event_sender
                .send_or_log(Event::OrderPaid {
                    order_id,
                    payment_session_id: session_id.to_string(),
                })
                .await;
        }

        Ok(PaymentConfirmation::Paid {
            orders_updated: result.rows_affected,
        })
    }

    fn session_request(
        &self,
        request: &CheckoutRequest,
        origin: &str,
    ) -> Result<CheckoutSessionRequest, ServiceError> {
        let line_items = request
            .products
            .iter()
            .map(|item| {
                Ok(GatewayLineItem {
                    name: item.product_name.clone(),
                    unit_amount: to_minor_units(item.product_price)?,
                    quantity: item.quantity,
                    image: item.product_images.first().cloned(),
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let product_details: Vec<Value> = request
            .products
            .iter()
            .map(|item| {
                json!({
                    "id": item.product_id,
                    "quantity": item.quantity,
                    "price": item.product_price,
                    "name": item.product_name,
                })
            })
            .collect();

        let origin = origin.trim_end_matches('/');
        Ok(CheckoutSessionRequest {
            currency: self.settings.currency.clone(),
            line_items,
            success_url: format!("{}/paymentsuccess?session_id={{CHECKOUT_SESSION_ID}}", origin),
            cancel_url: format!("{}/paymentcancel", origin),
            allowed_countries: vec![self.settings.shipping_country.clone()],
            metadata: vec![
                ("userId".to_string(), request.user_id.clone()),
                ("customerName".to_string(), request.customer_name.clone()),
                (
                    "customerContactNumber".to_string(),
                    request.customer_contact_number.clone(),
                ),
                ("address".to_string(), request.address.clone()),
                ("pinCode".to_string(), request.pin_code.clone()),
                (
                    "productDetails".to_string(),
                    serde_json::to_string(&product_details)?,
                ),
            ],
        })
    }

    async fn persist_pending_order(
        &self,
        request: &CheckoutRequest,
        session_id: &str,
    ) -> Result<OrderDetails, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let total_amount = request.total_amount()?;
        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(request.user_id.clone()),
            customer_name: Set(request.customer_name.clone()),
            customer_contact_number: Set(request.customer_contact_number.clone()),
            address: Set(request.address.clone()),
            pin_code: Set(request.pin_code.clone()),
            payment_session_id: Set(session_id.to_string()),
            payment_status: Set(PaymentStatus::Pending),
            total_amount: Set(total_amount),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!("Failed to insert order for session {}: {}", session_id, e);
            ServiceError::DatabaseError(e)
        })?;

        let mut products = Vec::with_capacity(request.products.len());
        for item in &request.products {
            let line = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id.clone()),
                product_name: Set(item.product_name.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.product_price),
                status: Set(LineItemStatus::Pending),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                error!("Failed to insert line item for order {}: {}", order_id, e);
                ServiceError::DatabaseError(e)
            })?;
            products.push(line);
        }

        txn.commit().await.map_err(|e| {
            error!("Failed to commit order {}: {}", order_id, e);
            ServiceError::DatabaseError(e)
        })?;

        Ok(OrderDetails { order, products })
    }
}
