pub mod order;
pub mod order_item;
pub mod product;
pub mod user;

pub use order::PaymentStatus;
pub use order_item::LineItemStatus;
pub use user::UserRole;
