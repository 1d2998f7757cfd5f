use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{order, order_item, LineItemStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::load_order,
};

/// Forward-only: each status has at most one successor.
pub fn can_transition(from: LineItemStatus, to: LineItemStatus) -> bool {
    from.next() == Some(to)
}

/// A customer may cancel only while nothing has shipped or been cancelled.
pub fn is_cancellable<I>(statuses: I) -> bool
where
    I: IntoIterator<Item = LineItemStatus>,
{
    statuses.into_iter().all(|status| {
        matches!(
            status,
            LineItemStatus::Pending | LineItemStatus::Processing | LineItemStatus::Succeeded
        )
    })
}

/// Button text on the admin orders table.
pub fn admin_action_label(status: LineItemStatus) -> Option<&'static str> {
    match status {
        LineItemStatus::Pending => Some("Process"),
        LineItemStatus::Processing => Some("Approve"),
        LineItemStatus::Succeeded => Some("Ship"),
        LineItemStatus::Delivered | LineItemStatus::Cancelled => None,
    }
}

pub fn parse_status(value: &str) -> Result<LineItemStatus, ServiceError> {
    value
        .trim()
        .parse()
        .map_err(|_| ServiceError::InvalidStatus(format!("unknown line item status '{}'", value)))
}

fn check_transition(item: &order_item::Model, to: LineItemStatus) -> Result<(), ServiceError> {
    if can_transition(item.status, to) {
        return Ok(());
    }
    warn!(
        item_id = %item.id,
        "Rejected line item transition {} -> {}",
        item.status,
        to
    );
    Err(ServiceError::InvalidStatus(format!(
        "Cannot transition line item {} from '{}' to '{}'",
        item.id, item.status, to
    )))
}

/// Admin fulfilment transitions and customer cancellation.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Moves a single line item one step along the fulfilment chain.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id, new_status = %new_status))]
    pub async fn advance_line_item(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        new_status: LineItemStatus,
    ) -> Result<order_item::Model, ServiceError> {
        let db = &*self.db;
        let item = order_item::Entity::find_by_id(item_id)
            .one(db)
            .await
            .map_err(|e| {
                error!("Failed to fetch line item {}: {}", item_id, e);
                ServiceError::DatabaseError(e)
            })?
            .filter(|item| item.order_id == order_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Line item {} not found in order {}",
                    item_id, order_id
                ))
            })?;

        check_transition(&item, new_status)?;
        let old_status = item.status;

        let mut active = item.into_active_model();
        active.status = Set(new_status);
        let updated = active.update(db).await.map_err(|e| {
            error!("Failed to update line item {}: {}", item_id, e);
            ServiceError::DatabaseError(e)
        })?;

        info!("Line item {} moved from '{}' to '{}'", item_id, old_status, new_status);
        self.event_sender
            .send_or_log(Event::LineItemStatusChanged {
                order_id,
                item_id,
                old_status,
                new_status,
            })
            .await;

        Ok(updated)
    }

    /// Applies one transition to every line of an order. Either every line
    /// moves or none does.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn advance_order(
        &self,
        order_id: Uuid,
        new_status: LineItemStatus,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let details = load_order(&txn, order_id).await?;
        if details.products.is_empty() {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} has no line items",
                order_id
            )));
        }
        for item in &details.products {
            check_transition(item, new_status)?;
        }

        let mut changes = Vec::with_capacity(details.products.len());
        let mut updated = Vec::with_capacity(details.products.len());
        for item in details.products {
            let (item_id, old_status) = (item.id, item.status);
            let mut active = item.into_active_model();
            active.status = Set(new_status);
            updated.push(active.update(&txn).await.map_err(|e| {
                error!("Failed to update line item {}: {}", item_id, e);
                ServiceError::DatabaseError(e)
            })?);
            changes.push((item_id, old_status));
        }

        txn.commit().await.map_err(|e| {
            error!("Failed to commit transaction for order {}: {}", order_id, e);
            ServiceError::DatabaseError(e)
        })?;

        info!("Order {} lines moved to '{}'", order_id, new_status);
        for (item_id, old_status) in changes {
            self.event_sender
                .send_or_log(Event::LineItemStatusChanged {
                    order_id,
                    item_id,
                    old_status,
                    new_status,
                })
                .await;
        }

        Ok(updated)
    }

    /// Removes the order outright when every line is still cancellable.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let details = load_order(&txn, order_id).await?;
        if !is_cancellable(details.statuses()) {
            warn!("Order {} has delivered or cancelled lines", order_id);
            return Err(ServiceError::Conflict(format!(
                "Order {} can no longer be cancelled",
                order_id
            )));
        }

        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await
            .map_err(|e| {
                error!("Failed to delete items of order {}: {}", order_id, e);
                ServiceError::DatabaseError(e)
            })?;
        order::Entity::delete_by_id(order_id)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!("Failed to delete order {}: {}", order_id, e);
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit cancellation of order {}: {}", order_id, e);
            ServiceError::DatabaseError(e)
        })?;

        info!("Order {} cancelled and removed", order_id);
        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::orders::OrderService;
    use crate::services::test_support::{event_sender, insert_order, set_item_status, setup_db};
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use LineItemStatus::*;

    #[rstest]
    #[case(Pending, Processing, true)]
    #[case(Processing, Succeeded, true)]
    #[case(Succeeded, Delivered, true)]
    #[case(Pending, Pending, false)]
    #[case(Pending, Succeeded, false)]
    #[case(Processing, Pending, false)]
    #[case(Delivered, Cancelled, false)]
    #[case(Cancelled, Pending, false)]
    #[case(Pending, Cancelled, false)]
    fn transition_table(
        #[case] from: LineItemStatus,
        #[case] to: LineItemStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(can_transition(from, to), allowed);
    }

    #[rstest]
    #[case(vec![Pending, Processing, Succeeded], true)]
    #[case(vec![Pending], true)]
    #[case(vec![Pending, Delivered], false)]
    #[case(vec![Cancelled], false)]
    fn cancellation_gate(#[case] statuses: Vec<LineItemStatus>, #[case] expected: bool) {
        assert_eq!(is_cancellable(statuses), expected);
    }

    #[test]
    fn action_labels() {
        assert_eq!(admin_action_label(Pending), Some("Process"));
        assert_eq!(admin_action_label(Processing), Some("Approve"));
        assert_eq!(admin_action_label(Succeeded), Some("Ship"));
        assert_eq!(admin_action_label(Delivered), None);
    }

    #[test]
    fn unknown_status_is_invalid() {
        assert!(matches!(parse_status("true"), Err(ServiceError::InvalidStatus(_))));
        assert_eq!(parse_status("delivered").unwrap(), Delivered);
    }

    #[tokio::test]
    async fn advance_order_moves_every_line() {
        let db = setup_db().await;
        let id = insert_order(&db, "u1", &[("Saree", dec!(500), 1), ("Kurta", dec!(300), 2)]).await;
        let (sender, mut rx) = event_sender();
        let service = OrderStatusService::new(db.clone(), sender);

        let updated = service.advance_order(id, Processing).await.unwrap();
        assert_eq!(updated.len(), 2);
        assert!(updated.iter().all(|i| i.status == Processing));
        assert!(matches!(
            rx.recv().await,
            Some(Event::LineItemStatusChanged { new_status: Processing, .. })
        ));
    }

    #[tokio::test]
    async fn advance_order_is_all_or_nothing() {
        let db = setup_db().await;
        let id = insert_order(&db, "u1", &[("Saree", dec!(500), 1), ("Kurta", dec!(300), 2)]).await;
        let details = OrderService::new(db.clone()).get_order(id).await.unwrap();
        set_item_status(&db, details.products[1].id, Processing).await;

        let (sender, _rx) = event_sender();
        let service = OrderStatusService::new(db.clone(), sender);
        assert!(matches!(
            service.advance_order(id, Processing).await,
            Err(ServiceError::InvalidStatus(_))
        ));

        let after = OrderService::new(db).get_order(id).await.unwrap();
        assert_eq!(after.products[0].status, Pending);
        assert_eq!(after.products[1].status, Processing);
    }

    #[tokio::test]
    async fn item_from_another_order_is_not_found() {
        let db = setup_db().await;
        let a = insert_order(&db, "u1", &[("Saree", dec!(500), 1)]).await;
        let b = insert_order(&db, "u1", &[("Kurta", dec!(300), 1)]).await;
        let item_of_b = OrderService::new(db.clone()).get_order(b).await.unwrap().products[0].id;

        let (sender, _rx) = event_sender();
        let service = OrderStatusService::new(db, sender);
        assert!(matches!(
            service.advance_line_item(a, item_of_b, Processing).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancel_removes_order_and_lines() {
        let db = setup_db().await;
        let id = insert_order(&db, "u1", &[("Saree", dec!(500), 2)]).await;
        let (sender, _rx) = event_sender();
        OrderStatusService::new(db.clone(), sender)
            .cancel_order(id)
            .await
            .unwrap();

        assert!(matches!(
            OrderService::new(db.clone()).get_order(id).await,
            Err(ServiceError::NotFound(_))
        ));
        let leftover = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(id))
            .all(&*db)
            .await
            .unwrap();
        assert!(leftover.is_empty());
    }

    #[tokio::test]
    async fn cancel_refuses_delivered_orders() {
        let db = setup_db().await;
        let id = insert_order(&db, "u1", &[("Saree", dec!(500), 1), ("Kurta", dec!(300), 1)]).await;
        let details = OrderService::new(db.clone()).get_order(id).await.unwrap();
        set_item_status(&db, details.products[0].id, Delivered).await;

        let (sender, _rx) = event_sender();
        let result = OrderStatusService::new(db.clone(), sender).cancel_order(id).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
        assert!(OrderService::new(db).get_order(id).await.is_ok());
    }
}
