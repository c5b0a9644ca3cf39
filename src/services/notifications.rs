use crate::entities::{order, order_item};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Outbound order-confirmation channel.
///
/// Checkout calls this after the order is committed; a delivery failure is
/// logged by the caller and never unwinds the order.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn send_order_confirmation(
        &self,
        order: &order::Model,
        items: &[order_item::Model],
    ) -> Result<(), NotificationError>;
}

/// Default notifier: writes the confirmation to the structured log. Stands
/// in wherever a mail provider is not configured, including tests.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl OrderNotifier for LoggingNotifier {
    #[instrument(skip(self, order, items))]
    async fn send_order_confirmation(
        &self,
        order: &order::Model,
        items: &[order_item::Model],
    ) -> Result<(), NotificationError> {
        let lines: Vec<String> = items
            .iter()
            .map(|item| format!("{} x{} @ {}", item.product_name, item.quantity, item.price_at_purchase))
            .collect();
        info!(
            order_id = %order.id,
            recipient = %order.email,
            total = %order.total,
            items = ?lines,
            "Order confirmation"
        );
        Ok(())
    }
}
