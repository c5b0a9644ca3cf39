use crate::{
    entities::product::{self, Entity as Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{error, instrument, warn};
use uuid::Uuid;

/// Stock movements for the products an order touches.
///
/// All counter updates are single relative SQL expressions (`stock = stock -
/// n`); stock is never read, adjusted in memory, and written back.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Applies an order's stock effect per the site-wide policy: reserve
    /// (`reserved_stock += qty`) when `reserve` is set, deduct
    /// (`stock -= qty`) otherwise.
    ///
    /// Best-effort: a failed adjustment is logged and the remaining items
    /// still get theirs. The order has already been paid for at this point.
    #[instrument(skip(self, items))]
    pub async fn apply_order_items(
        &self,
        items: &[(Uuid, i32)],
        reserve: bool,
    ) -> Result<(), ServiceError> {
        for &(product_id, quantity) in items {
            let outcome = if reserve {
                self.adjust(product_id, product::Column::ReservedStock, quantity)
                    .await
            } else {
                self.adjust(product_id, product::Column::Stock, -quantity)
                    .await
            };
            match outcome {
                Ok(true) => {
                    let event = if reserve {
                        Event::StockReserved {
                            product_id,
                            quantity,
                        }
                    } else {
                        Event::StockDeducted {
                            product_id,
                            quantity,
                        }
                    };
                    let _ = self.event_sender.send(event).await;
                }
                Ok(false) => {
                    warn!(product_id = %product_id, "Stock adjustment matched no product");
                }
                Err(err) => {
                    error!(product_id = %product_id, error = %err, "Stock adjustment failed");
                }
            }
        }
        Ok(())
    }

    /// Returns an order's quantities to sellable stock, used when an order
    /// is deleted. Best-effort in the same way as [`apply_order_items`].
    ///
    /// [`apply_order_items`]: InventoryService::apply_order_items
    #[instrument(skip(self, items))]
    pub async fn restock_items(&self, items: &[(Uuid, i32)]) -> Result<(), ServiceError> {
        for &(product_id, quantity) in items {
            match self
                .adjust(product_id, product::Column::Stock, quantity)
                .await
            {
                Ok(true) => {
                    let _ = self
                        .event_sender
                        .send(Event::StockRestocked {
                            product_id,
                            quantity,
                        })
                        .await;
                }
                Ok(false) => {
                    warn!(product_id = %product_id, "Restock matched no product");
                }
                Err(err) => {
                    error!(product_id = %product_id, error = %err, "Restock failed");
                }
            }
        }
        Ok(())
    }

    async fn adjust(
        &self,
        product_id: Uuid,
        column: product::Column,
        delta: i32,
    ) -> Result<bool, ServiceError> {
        let result = Product::update_many()
            .col_expr(column, Expr::col(column).add(delta))
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
