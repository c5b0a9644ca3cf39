use crate::{
    entities::promo_code::{self, DiscountType, Entity as PromoCode},
    errors::ServiceError,
    payments::PromoCodeSnapshot,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Canonical promo-code form: trimmed and upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// A promo application resolved against the live promo-code table, ready to
/// be persisted as an order child record.
#[derive(Debug, Clone)]
pub struct AppliedPromo {
    pub promo_code_id: Option<Uuid>,
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: Decimal,
    pub discount_applied: Decimal,
}

#[derive(Clone)]
pub struct PromoCodeService {
    db: Arc<DatabaseConnection>,
}

impl PromoCodeService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Checkout-time validation: the code must exist, be active, be inside
    /// its validity window, be under its redemption cap, and the subtotal
    /// must clear its minimum order value.
    #[instrument(skip(self))]
    pub async fn validate_code(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<promo_code::Model, ServiceError> {
        let normalized = normalize_code(code);
        let promo = PromoCode::find()
            .filter(promo_code::Column::Code.eq(normalized.clone()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Promo code {} not found", normalized)))?;

        if !promo.is_currently_valid(Utc::now()) {
            return Err(ServiceError::InvalidOperation(format!(
                "Promo code {} is not currently valid",
                normalized
            )));
        }
        if let Some(minimum) = promo.minimum_order_value {
            if subtotal < minimum {
                return Err(ServiceError::InvalidOperation(format!(
                    "Order subtotal is below the {} minimum for promo code {}",
                    minimum, normalized
                )));
            }
        }
        Ok(promo)
    }

    /// Resolves promo snapshots carried in session metadata against the live
    /// promo-code table in one batch query.
    ///
    /// Live records win for `discount_type`/`amount`; the snapshot is the
    /// fallback for codes that were edited or deleted since checkout.
    /// Entries with neither a resolvable id nor a code are dropped.
    #[instrument(skip(self, snapshots))]
    pub async fn resolve_applied(
        &self,
        snapshots: &[PromoCodeSnapshot],
    ) -> Result<Vec<AppliedPromo>, ServiceError> {
        if snapshots.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = snapshots
            .iter()
            .filter_map(|s| s.id.as_deref())
            .filter_map(|id| Uuid::parse_str(id).ok())
            .collect();
        let codes: Vec<String> = snapshots
            .iter()
            .filter_map(|s| s.code.as_deref())
            .map(normalize_code)
            .collect();

        let mut condition = Condition::any();
        if !ids.is_empty() {
            condition = condition.add(promo_code::Column::Id.is_in(ids));
        }
        if !codes.is_empty() {
            condition = condition.add(promo_code::Column::Code.is_in(codes));
        }

        let live: Vec<promo_code::Model> = if condition.is_empty() {
            Vec::new()
        } else {
            PromoCode::find().filter(condition).all(&*self.db).await?
        };

        let by_id: HashMap<Uuid, &promo_code::Model> = live.iter().map(|p| (p.id, p)).collect();
        let by_code: HashMap<&str, &promo_code::Model> =
            live.iter().map(|p| (p.code.as_str(), p)).collect();

        let mut applied = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let snapshot_id = snapshot
                .id
                .as_deref()
                .and_then(|id| Uuid::parse_str(id).ok());
            let normalized = snapshot.code.as_deref().map(normalize_code);

            let record = snapshot_id
                .and_then(|id| by_id.get(&id).copied())
                .or_else(|| {
                    normalized
                        .as_deref()
                        .and_then(|code| by_code.get(code).copied())
                });

            let code = record
                .map(|r| r.code.clone())
                .or(normalized)
                .unwrap_or_default();
            if code.is_empty() {
                debug!("Skipping promo snapshot with no id and no code");
                continue;
            }

            let discount_type = record
                .map(|r| r.discount_type)
                .or_else(|| parse_discount_type(snapshot.discount_type.as_deref()))
                .unwrap_or(DiscountType::Fixed);
            let amount = record
                .map(|r| r.amount)
                .or(snapshot.amount)
                .unwrap_or(Decimal::ZERO);

            applied.push(AppliedPromo {
                promo_code_id: record.map(|r| r.id),
                code,
                discount_type,
                amount,
                discount_applied: snapshot.discount_amount.unwrap_or(Decimal::ZERO),
            });
        }

        Ok(applied)
    }

    /// Atomically increments a promo's redemption counter. Called once per
    /// order at order-creation time; never retroactively.
    #[instrument(skip(self))]
    pub async fn increment_redemptions(&self, promo_code_id: Uuid) -> Result<(), ServiceError> {
        let result = PromoCode::update_many()
            .col_expr(
                promo_code::Column::Redemptions,
                Expr::col(promo_code::Column::Redemptions).add(1),
            )
            .col_expr(
                promo_code::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(promo_code::Column::Id.eq(promo_code_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            warn!(promo_code_id = %promo_code_id, "Redemption increment matched no promo code");
        }
        Ok(())
    }
}

fn parse_discount_type(raw: Option<&str>) -> Option<DiscountType> {
    match raw?.trim().to_uppercase().as_str() {
        "PERCENTAGE" => Some(DiscountType::Percentage),
        "FIXED" => Some(DiscountType::Fixed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_normalized() {
        assert_eq!(normalize_code("  save10 "), "SAVE10");
        assert_eq!(normalize_code("Welcome5"), "WELCOME5");
    }

    #[test]
    fn discount_type_parsing_is_case_insensitive() {
        assert_eq!(
            parse_discount_type(Some("percentage")),
            Some(DiscountType::Percentage)
        );
        assert_eq!(parse_discount_type(Some("FIXED")), Some(DiscountType::Fixed));
        assert_eq!(parse_discount_type(Some("bogo")), None);
        assert_eq!(parse_discount_type(None), None);
    }
}
