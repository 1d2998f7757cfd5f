use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::session::{AuthSession, ShippingDetails};
use crate::services::checkout::{CheckoutLineItem, CheckoutRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(rename = "_id")]
    pub product_id: String,
    pub product_name: String,
    pub product_price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    Add(CartItem),
    Remove(String),
    Increase(String),
    Decrease(String),
    Clear,
}

impl CartState {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.product_price * Decimal::from(item.quantity))
            .sum()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    fn position(&self, product_id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.product_id == product_id)
    }

    /// Builds the body posted to `/create-checkout-session`. Callers run
    /// [`super::checkout_gate`] first; an anonymous session yields an empty
    /// `userId`, which the server rejects.
    pub fn to_checkout_request(
        &self,
        session: &AuthSession,
        shipping: &ShippingDetails,
    ) -> CheckoutRequest {
        CheckoutRequest {
            products: self
                .items
                .iter()
                .map(|item| CheckoutLineItem {
                    product_id: item.product_id.clone(),
                    product_name: item.product_name.clone(),
                    product_price: item.product_price,
                    quantity: i32::try_from(item.quantity).unwrap_or(i32::MAX),
                    product_images: item.product_image.iter().cloned().collect(),
                })
                .collect(),
            user_id: session.user_id().unwrap_or_default().to_string(),
            customer_name: shipping.name.clone(),
            customer_contact_number: shipping.contact.clone(),
            address: shipping.full_address(),
            pin_code: shipping.pin_code.clone(),
        }
    }
}

/// Pure cart reducer.
pub fn reduce(mut state: CartState, action: CartAction) -> CartState {
    match action {
        CartAction::Add(item) => match state.position(&item.product_id) {
            Some(idx) => {
                let existing = &mut state.items[idx];
                existing.quantity = existing.quantity.saturating_add(item.quantity.max(1));
            }
            None => state.items.push(CartItem {
                quantity: item.quantity.max(1),
                ..item
            }),
        },
        CartAction::Remove(id) => state.items.retain(|i| i.product_id != id),
        CartAction::Increase(id) => {
            if let Some(idx) = state.position(&id) {
                state.items[idx].quantity = state.items[idx].quantity.saturating_add(1);
            }
        }
        CartAction::Decrease(id) => {
            if let Some(idx) = state.position(&id) {
                let item = &mut state.items[idx];
                if item.quantity > 1 {
                    item.quantity -= 1;
                }
            }
        }
        CartAction::Clear => state.items.clear(),
    }
    state
}
