//! Browser-side state for the storefront, kept as plain values with reducer
//! functions so screens and tests pass state explicitly.

pub mod cart;
pub mod session;

pub use cart::{reduce, CartAction, CartItem, CartState};
pub use session::{reduce_session, AuthSession, SessionAction, ShippingDetails};

/// Same rule the server applies before deleting an order.
pub use crate::services::order_status::{admin_action_label, is_cancellable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutBlocked {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Please login to continue")]
    NotSignedIn,
    #[error("Please Login with Customer Account")]
    AdminAccount,
}

/// Decides whether the checkout button may proceed.
pub fn checkout_gate(cart: &CartState, session: &AuthSession) -> Result<(), CheckoutBlocked> {
    if cart.is_empty() {
        return Err(CheckoutBlocked::EmptyCart);
    }
    match session {
        AuthSession::Anonymous => Err(CheckoutBlocked::NotSignedIn),
        signed_in if signed_in.is_admin() => Err(CheckoutBlocked::AdminAccount),
        AuthSession::SignedIn { .. } => Ok(()),
    }
}
