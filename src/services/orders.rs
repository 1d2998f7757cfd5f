use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::{
    entities::{order, order_item},
    errors::ServiceError,
};

/// An order row together with its line items, shaped the way the storefront
/// tables read it (`products` holds the lines).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub products: Vec<order_item::Model>,
}

impl OrderDetails {
    pub fn statuses(&self) -> impl Iterator<Item = crate::entities::LineItemStatus> + '_ {
        self.products.iter().map(|item| item.status)
    }
}

/// Read side of the order store.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Every order, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderDetails>, ServiceError> {
        let db = &*self.db;
        let orders = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .all(db)
            .await
            .map_err(|e| {
                error!("Failed to list orders: {}", e);
                ServiceError::DatabaseError(e)
            })?;

        attach_items(db, orders).await
    }

    /// Orders placed by one account, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<OrderDetails>, ServiceError> {
        let db = &*self.db;
        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(db)
            .await
            .map_err(|e| {
                error!("Failed to list orders for user {}: {}", user_id, e);
                ServiceError::DatabaseError(e)
            })?;

        attach_items(db, orders).await
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        load_order(&*self.db, order_id).await
    }
}

/// Loads one order with its lines; works inside a transaction too.
pub(crate) async fn load_order<C>(db: &C, order_id: Uuid) -> Result<OrderDetails, ServiceError>
where
    C: ConnectionTrait,
{
    let order = order::Entity::find_by_id(order_id)
        .one(db)
        .await
        .map_err(|e| {
            error!("Failed to fetch order {}: {}", order_id, e);
            ServiceError::DatabaseError(e)
        })?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

    let products = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::CreatedAt)
        .all(db)
        .await
        .map_err(|e| {
            error!("Failed to fetch items for order {}: {}", order_id, e);
            ServiceError::DatabaseError(e)
        })?;

    Ok(OrderDetails { order, products })
}

async fn attach_items<C>(
    db: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderDetails>, ServiceError>
where
    C: ConnectionTrait,
{
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(ids))
        .order_by_asc(order_item::Column::CreatedAt)
        .all(db)
        .await
        .map_err(|e| {
            error!("Failed to fetch order items: {}", e);
            ServiceError::DatabaseError(e)
        })?;

    let mut by_order: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let products = by_order.remove(&order.id).unwrap_or_default();
            OrderDetails { order, products }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{LineItemStatus, PaymentStatus};
    use crate::services::test_support::{insert_order, setup_db};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn lists_orders_with_their_lines() {
        let db = setup_db().await;
        let first = insert_order(&db, "u1", &[("Saree", dec!(500), 2)]).await;
        let second = insert_order(&db, "u2", &[("Kurta", dec!(300), 1), ("Dupatta", dec!(150), 3)]).await;

        let service = OrderService::new(db.clone());
        let all = service.list_orders().await.unwrap();
        assert_eq!(all.len(), 2);

        let found = all.iter().find(|o| o.order.id == second).unwrap();
        assert_eq!(found.products.len(), 2);
        assert!(found.statuses().all(|s| s == LineItemStatus::Pending));

        let mine = service.list_orders_for_user("u1").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].order.id, first);
        assert_eq!(mine[0].order.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let db = setup_db().await;
        let service = OrderService::new(db);
        assert!(matches!(
            service.get_order(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn serializes_lines_under_products() {
        let db = setup_db().await;
        let id = insert_order(&db, "u1", &[("Saree", dec!(500), 2)]).await;
        let details = OrderService::new(db).get_order(id).await.unwrap();

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["paymentStatus"], "pending");
        assert_eq!(json["products"][0]["productName"], "Saree");
        assert_eq!(json["products"][0]["status"], "pending");
    }
}
