use crate::{
    entities::{
        order::{self, Entity as Order, OrderStatus},
        order_item::{self, Entity as OrderItem},
        order_promo_code::{self, Entity as OrderPromoCode},
        product::{self, Entity as Product},
        user::{self, Entity as User},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    payments::{OrderAddress, PaymentSession},
    services::{
        inventory::InventoryService,
        notifications::OrderNotifier,
        promotions::{AppliedPromo, PromoCodeService},
        settings::SettingsService,
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel, ModelTrait, QueryFilter,
    SqlErr, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Result of finalizing a payment session: the order (with children) and
/// whether this call created it or found it already persisted.
#[derive(Debug, Clone)]
pub struct FinalizedOrder {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub promo_codes: Vec<order_promo_code::Model>,
    pub created: bool,
}

/// Turns completed payment sessions into persisted orders, exactly once per
/// payment reference.
///
/// There is no locking: the unique index on `orders.stripe_payment_id` is
/// the entire idempotency mechanism. Concurrent deliveries of the same
/// session race to insert; the loser's unique-violation is converted into a
/// re-fetch of the winner's row.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    promotions: PromoCodeService,
    inventory: InventoryService,
    settings: SettingsService,
    notifier: Arc<dyn OrderNotifier>,
    event_sender: EventSender,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        promotions: PromoCodeService,
        inventory: InventoryService,
        settings: SettingsService,
        notifier: Arc<dyn OrderNotifier>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            promotions,
            inventory,
            settings,
            notifier,
            event_sender,
        }
    }

    /// Finalizes a completed checkout session into exactly one order.
    ///
    /// Once the order row commits, nothing rolls it back: redemption
    /// counting, stock movement, and the confirmation email are best-effort
    /// side effects. A paid-for order with partially applied side effects
    /// beats a missing order every time.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn finalize_session(
        &self,
        session: &PaymentSession,
        fallback_user_id: Option<Uuid>,
    ) -> Result<FinalizedOrder, ServiceError> {
        let reference = session.payment_reference().to_string();

        if let Some(existing) = self.find_by_reference(&reference).await? {
            info!(order_id = %existing.order.id, "Order already finalized for this payment reference");
            return Ok(existing);
        }

        let email = resolve_email(session);
        let name = resolve_name(session);
        let address = resolve_address(session);
        let is_in_person = matches!(
            OrderAddress::parse(&address),
            OrderAddress::InPerson { .. }
        );

        let cart = session.cart_items();
        let products = self.fetch_products(&cart).await?;

        let subtotal = session.metadata_money("subtotal").unwrap_or(Decimal::ZERO);
        let metadata_discount = session.metadata_money("discount").unwrap_or(Decimal::ZERO);
        let shipping = session.metadata_money("shipping").unwrap_or(Decimal::ZERO);
        let tax = session.metadata_money("tax").unwrap_or(Decimal::ZERO);

        let promos = self
            .promotions
            .resolve_applied(&session.promo_snapshots())
            .await?;

        let user_id = match fallback_user_id {
            Some(id) => Some(id),
            None => self.lookup_user(&email).await?,
        };

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let items: Vec<order_item::Model> = cart
            .iter()
            .filter_map(|entry| {
                let product_id = entry
                    .product_id
                    .as_deref()
                    .and_then(|id| Uuid::parse_str(id).ok())?;
                let product = products.get(&product_id)?;
                Some(order_item::Model {
                    id: Uuid::new_v4(),
                    order_id,
                    product_id,
                    product_name: entry
                        .product_name
                        .clone()
                        .unwrap_or_else(|| product.name.clone()),
                    product_image: product.primary_image(),
                    quantity: entry.quantity,
                    size: entry.size.clone(),
                    color: entry.color.clone(),
                    price_at_purchase: entry.price_at_purchase.unwrap_or(product.price),
                    created_at: now,
                })
            })
            .collect();
        if items.len() < cart.len() {
            warn!(
                session_id = %session.id,
                dropped = cart.len() - items.len(),
                "Dropped cart entries without a resolvable product"
            );
        }

        // The per-promo ledger is authoritative whenever it carries a
        // positive sum; the order-level metadata figure is the fallback.
        let ledger_sum: Decimal = promos.iter().map(|p| p.discount_applied).sum();
        let discount = if ledger_sum > Decimal::ZERO {
            ledger_sum
        } else {
            metadata_discount
        }
        .max(Decimal::ZERO)
        .min(subtotal.max(Decimal::ZERO));

        let total = session.metadata_money("total").unwrap_or_else(|| {
            let after_discount = session
                .metadata_money("subtotalAfterDiscount")
                .unwrap_or_else(|| (subtotal - discount).max(Decimal::ZERO));
            after_discount + shipping + tax
        });

        let primary_promo = promos.first();
        let order_model = order::Model {
            id: order_id,
            user_id,
            email: email.clone().unwrap_or_default(),
            name,
            address,
            subtotal,
            shipping,
            tax,
            discount,
            total,
            status: OrderStatus::Pending,
            tracking_number: None,
            is_in_person,
            stripe_payment_id: Some(reference.clone()),
            promo_code_id: primary_promo.and_then(|p| p.promo_code_id),
            promo_code_code: primary_promo.map(|p| p.code.clone()),
            created_at: now,
            updated_at: Some(now),
        };

        let promo_models: Vec<order_promo_code::Model> = promos
            .iter()
            .map(|p| order_promo_code::Model {
                id: Uuid::new_v4(),
                order_id,
                promo_code_id: p.promo_code_id,
                code: p.code.clone(),
                discount_type: p.discount_type,
                amount: p.amount,
                discount_applied: p.discount_applied,
                created_at: now,
            })
            .collect();

        match self
            .insert_order_tree(&order_model, &items, &promo_models)
            .await
        {
            Ok(()) => {}
            Err(err) if is_unique_violation(&err) => {
                // Lost the race to a concurrent delivery of the same
                // session; the winner's row is the order.
                info!(payment_reference = %reference, "Concurrent finalization won the insert, re-fetching");
                return self
                    .find_by_reference(&reference)
                    .await?
                    .ok_or_else(|| ServiceError::Conflict(
                        "Order insert hit a unique violation but no order exists for the payment reference".to_string(),
                    ));
            }
            Err(err) => return Err(err.into()),
        }

        let _ = self.event_sender.send(Event::OrderCreated(order_id)).await;

        self.apply_side_effects(&order_model, &items, &promos, email.as_deref())
            .await;

        Ok(FinalizedOrder {
            order: order_model,
            items,
            promo_codes: promo_models,
            created: true,
        })
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<FinalizedOrder>, ServiceError> {
        let Some(existing) = Order::find()
            .filter(order::Column::StripePaymentId.eq(reference))
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };
        let items = existing.find_related(OrderItem).all(&*self.db).await?;
        let promo_codes = existing.find_related(OrderPromoCode).all(&*self.db).await?;
        Ok(Some(FinalizedOrder {
            order: existing,
            items,
            promo_codes,
            created: false,
        }))
    }

    async fn fetch_products(
        &self,
        cart: &[crate::payments::CartItemSnapshot],
    ) -> Result<HashMap<Uuid, product::Model>, ServiceError> {
        let ids: Vec<Uuid> = cart
            .iter()
            .filter_map(|entry| entry.product_id.as_deref())
            .filter_map(|id| Uuid::parse_str(id).ok())
            .collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let products = Product::find()
            .filter(product::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }

    async fn lookup_user(&self, email: &Option<String>) -> Result<Option<Uuid>, ServiceError> {
        let Some(email) = email else {
            return Ok(None);
        };
        let found = User::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?;
        Ok(found.map(|u| u.id))
    }

    /// Order, items, and applied promos commit or fail as one unit.
    async fn insert_order_tree(
        &self,
        order_model: &order::Model,
        items: &[order_item::Model],
        promos: &[order_promo_code::Model],
    ) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;
        Order::insert(order_model.clone().into_active_model())
            .exec(&txn)
            .await?;
        if !items.is_empty() {
            OrderItem::insert_many(
                items.iter().map(|item| item.clone().into_active_model()),
            )
            .exec(&txn)
            .await?;
        }
        if !promos.is_empty() {
            OrderPromoCode::insert_many(
                promos.iter().map(|promo| promo.clone().into_active_model()),
            )
            .exec(&txn)
            .await?;
        }
        txn.commit().await
    }

    /// Post-commit side effects. Every failure here is logged and swallowed;
    /// the order stands regardless.
    async fn apply_side_effects(
        &self,
        order_model: &order::Model,
        items: &[order_item::Model],
        promos: &[AppliedPromo],
        email: Option<&str>,
    ) {
        for promo in promos {
            let Some(promo_code_id) = promo.promo_code_id else {
                continue;
            };
            match self.promotions.increment_redemptions(promo_code_id).await {
                Ok(()) => {
                    let _ = self
                        .event_sender
                        .send(Event::PromoCodeRedeemed {
                            promo_code_id,
                            order_id: order_model.id,
                        })
                        .await;
                }
                Err(err) => {
                    error!(promo_code_id = %promo_code_id, error = %err, "Redemption increment failed");
                }
            }
        }

        let reserve = match self.settings.auto_deduct_stock().await {
            Ok(enabled) => enabled,
            Err(err) => {
                error!(error = %err, "Failed to read stock policy, deducting directly");
                false
            }
        };
        let quantities: Vec<(Uuid, i32)> = items
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect();
        if let Err(err) = self.inventory.apply_order_items(&quantities, reserve).await {
            error!(order_id = %order_model.id, error = %err, "Stock adjustment failed");
        }

        if email.is_some() {
            if let Err(err) = self
                .notifier
                .send_order_confirmation(order_model, items)
                .await
            {
                warn!(order_id = %order_model.id, error = %err, "Order confirmation failed");
            }
        }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn resolve_email(session: &PaymentSession) -> Option<String> {
    session
        .customer_email
        .as_deref()
        .filter(|email| !email.trim().is_empty())
        .or_else(|| session.metadata_str("email"))
        .map(|email| email.trim().to_lowercase())
}

fn resolve_name(session: &PaymentSession) -> String {
    session
        .metadata_str("customerName")
        .map(str::to_string)
        .or_else(|| {
            session
                .customer_details
                .as_ref()
                .and_then(|details| details.name.clone())
                .filter(|name| !name.trim().is_empty())
        })
        .unwrap_or_else(|| "Guest".to_string())
}

fn resolve_address(session: &PaymentSession) -> String {
    if let Some(raw) = session.metadata_str("address") {
        return raw.to_string();
    }
    session
        .customer_details
        .as_ref()
        .and_then(|details| details.address.as_ref())
        .and_then(|address| serde_json::to_string(address).ok())
        .unwrap_or_else(|| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(value: serde_json::Value) -> PaymentSession {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn email_prefers_session_level_and_lowercases() {
        let s = session(json!({
            "id": "cs_1",
            "customer_email": " Buyer@Example.COM ",
            "metadata": {"email": "other@example.com"},
        }));
        assert_eq!(resolve_email(&s).as_deref(), Some("buyer@example.com"));
    }

    #[test]
    fn email_falls_back_to_metadata() {
        let s = session(json!({
            "id": "cs_1",
            "metadata": {"email": "Meta@Example.com"},
        }));
        assert_eq!(resolve_email(&s).as_deref(), Some("meta@example.com"));
    }

    #[test]
    fn name_defaults_to_guest() {
        let s = session(json!({"id": "cs_1", "metadata": {}}));
        assert_eq!(resolve_name(&s), "Guest");

        let named = session(json!({
            "id": "cs_1",
            "customer_details": {"name": "Ada"},
            "metadata": {},
        }));
        assert_eq!(resolve_name(&named), "Ada");

        let metadata_wins = session(json!({
            "id": "cs_1",
            "customer_details": {"name": "Ada"},
            "metadata": {"customerName": "Grace"},
        }));
        assert_eq!(resolve_name(&metadata_wins), "Grace");
    }

    #[test]
    fn address_prefers_metadata_blob() {
        let s = session(json!({
            "id": "cs_1",
            "customer_details": {"address": {"country": "US"}},
            "metadata": {"address": "{\"country\":\"GB\"}"},
        }));
        assert_eq!(resolve_address(&s), "{\"country\":\"GB\"}");

        let fallback = session(json!({
            "id": "cs_1",
            "customer_details": {"address": {"country": "US"}},
            "metadata": {},
        }));
        assert_eq!(resolve_address(&fallback), "{\"country\":\"US\"}");
    }
}
