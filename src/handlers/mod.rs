pub mod checkout;
pub mod common;
pub mod health;
pub mod orders;
pub mod products;
pub mod users;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    payments::PaymentGateway,
    services::{
        checkout::{CheckoutService, CheckoutSettings},
        order_status::OrderStatusService,
        orders::OrderService,
        products::ProductService,
        users::UserService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
    pub order: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
    pub product: Arc<ProductService>,
    pub user: Arc<UserService>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        payment_gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        let settings = CheckoutSettings {
            currency: config.checkout_currency.clone(),
            shipping_country: config.shipping_country.clone(),
        };

        let checkout = Arc::new(CheckoutService::new(
            db_pool.clone(),
            payment_gateway.clone(),
            event_sender.clone(),
            settings,
        ));
        let order = Arc::new(OrderService::new(db_pool.clone()));
        let order_status = Arc::new(OrderStatusService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let product = Arc::new(ProductService::new(db_pool.clone(), event_sender.clone()));
        let user = Arc::new(UserService::new(db_pool, event_sender));

        Self {
            checkout,
            order,
            order_status,
            product,
            user,
            payment_gateway,
        }
    }
}
