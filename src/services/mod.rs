// Checkout and payment confirmation
pub mod checkout;

// Order reads and the admin/customer status workflow
pub mod order_status;
pub mod orders;

// Catalog and accounts
pub mod products;
pub mod users;
