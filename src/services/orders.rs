use crate::{
    entities::{
        order::{self, Entity as Order, OrderStatus},
        order_item::{self, Entity as OrderItem},
        order_promo_code::{self, Entity as OrderPromoCode},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::InventoryService,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// An order with both child collections loaded.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub promo_codes: Vec<order_promo_code::Model>,
}

/// Admin-facing order reads and lifecycle changes.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    inventory: InventoryService,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        inventory: InventoryService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            inventory,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order_model = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = order_model.find_related(OrderItem).all(&*self.db).await?;
        let promo_codes = order_model
            .find_related(OrderPromoCode)
            .all(&*self.db)
            .await?;
        Ok(OrderDetails {
            order: order_model,
            items,
            promo_codes,
        })
    }

    /// Newest-first page of orders plus the total row count.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let paginator = Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Moves an order along its lifecycle. The tracking number is only
    /// accepted alongside the transition to `Shipped`.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        tracking_number: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        let order_model = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order_model.status;
        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot transition order from {} to {}",
                old_status, new_status
            )));
        }

        let mut active: order::ActiveModel = order_model.into();
        active.status = Set(new_status);
        if new_status == OrderStatus::Shipped {
            if let Some(tracking) = tracking_number {
                active.tracking_number = Set(Some(tracking));
            }
        }
        let updated = active.update(&*self.db).await?;

        let _ = self
            .event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;
        info!(order_id = %order_id, %old_status, %new_status, "Order status updated");
        Ok(updated)
    }

    /// Deletes an order and its children, then returns the item quantities
    /// to sellable stock.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order_model = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = order_model.find_related(OrderItem).all(&*self.db).await?;

        let txn = self.db.begin().await?;
        OrderItem::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        OrderPromoCode::delete_many()
            .filter(order_promo_code::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        Order::delete_by_id(order_id).exec(&txn).await?;
        txn.commit().await?;

        let quantities: Vec<(Uuid, i32)> = items
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect();
        self.inventory.restock_items(&quantities).await?;

        let _ = self.event_sender.send(Event::OrderDeleted(order_id)).await;
        Ok(())
    }
}
