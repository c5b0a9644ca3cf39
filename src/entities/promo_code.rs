use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// `amount` is a percentage in `0..=100`.
    #[sea_orm(string_value = "PERCENTAGE")]
    Percentage,
    /// `amount` is a fixed value in the site's base currency.
    #[sea_orm(string_value = "FIXED")]
    Fixed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promo_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Normalized (trimmed, upper-cased) code, unique across the table.
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: Decimal,
    pub minimum_order_value: Option<Decimal>,
    pub max_redemptions: Option<i32>,
    /// Incremented at most once per order, at order-creation time only.
    pub redemptions: i32,
    pub active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the code can be applied right now, before looking at a
    /// particular order's subtotal.
    pub fn is_currently_valid(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        if let Some(starts_at) = self.starts_at {
            if now < starts_at {
                return false;
            }
        }
        if let Some(ends_at) = self.ends_at {
            if now > ends_at {
                return false;
            }
        }
        if let Some(limit) = self.max_redemptions {
            if self.redemptions >= limit {
                return false;
            }
        }
        true
    }

    /// Discount this code yields for a subtotal, clamped to `[0, subtotal]`.
    /// Returns zero when the subtotal is below the minimum order value.
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        if let Some(minimum) = self.minimum_order_value {
            if subtotal < minimum {
                return Decimal::ZERO;
            }
        }
        let raw = match self.discount_type {
            DiscountType::Percentage => subtotal * self.amount / Decimal::from(100),
            DiscountType::Fixed => self.amount,
        };
        raw.max(Decimal::ZERO).min(subtotal)
    }
}
