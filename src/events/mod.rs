use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::LineItemStatus;

/// Domain events raised by the services after a write commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        payment_session_id: String,
        total_amount: Decimal,
    },
    OrderPaid {
        order_id: Uuid,
        payment_session_id: String,
    },
    LineItemStatusChanged {
        order_id: Uuid,
        item_id: Uuid,
        old_status: LineItemStatus,
        new_status: LineItemStatus,
    },
    OrderCancelled(Uuid),
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    UserRegistered(Uuid),
    UserDeleted(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing. The write that raised it
    /// has already committed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                payment_session_id,
                total_amount,
            } => info!(
                %order_id,
                payment_session_id = %payment_session_id,
                %total_amount,
                "order created"
            ),
            Event::OrderPaid {
                order_id,
                payment_session_id,
            } => info!(%order_id, payment_session_id = %payment_session_id, "order paid"),
            Event::LineItemStatusChanged {
                order_id,
                item_id,
                old_status,
                new_status,
            } => info!(
                %order_id,
                %item_id,
                %old_status,
                %new_status,
                "line item status changed"
            ),
            Event::OrderCancelled(order_id) => info!(%order_id, "order cancelled"),
            other => info!("Received event: {:?}", other),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender.send(Event::ProductCreated(id)).await.unwrap();
        sender.send_or_log(Event::ProductDeleted(id)).await;

        assert_eq!(rx.recv().await, Some(Event::ProductCreated(id)));
        assert_eq!(rx.recv().await, Some(Event::ProductDeleted(id)));
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::UserDeleted(Uuid::new_v4())).await.is_err());
        // Never panics or errors out
        sender.send_or_log(Event::UserDeleted(Uuid::new_v4())).await;
    }
}
