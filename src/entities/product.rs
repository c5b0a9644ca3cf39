use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product as consumed by the checkout and analytics pipelines.
///
/// `stock` and `reserved_stock` are independent counters: with the site-wide
/// auto-deduct toggle off, a placed order decrements `stock` immediately;
/// with it on, the order increments `reserved_stock` and `stock` keeps
/// counting the units as on-hand until they are explicitly released.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub cost_price: Decimal,
    pub shipping_cost: Decimal,
    #[sea_orm(column_type = "Json")]
    pub images: Json,
    pub stock: i32,
    pub reserved_stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// First catalog image, used for the purchase-time item snapshot.
    pub fn primary_image(&self) -> Option<String> {
        self.images
            .as_array()
            .and_then(|images| images.first())
            .and_then(|image| image.as_str())
            .map(|image| image.to_string())
    }
}
