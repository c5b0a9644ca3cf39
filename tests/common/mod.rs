use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, Set};
use serde_json::{json, Value};
use storefront_api::{
    config::AppConfig,
    db,
    entities::{
        order, order_item,
        product::{self, Entity as Product},
        promo_code::{self, DiscountType, Entity as PromoCode},
        user::{self, Entity as User},
    },
    events,
    payments::PaymentSession,
    services::notifications::{NotificationError, OrderNotifier},
    AppState,
};
use uuid::Uuid;

/// Test harness backed by a throwaway SQLite database file.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    db_file: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_notifier(Arc::new(
            storefront_api::services::notifications::LoggingNotifier,
        ))
        .await
    }

    /// Construct the app with a custom notifier, e.g. one that always fails.
    pub async fn with_notifier(notifier: Arc<dyn OrderNotifier>) -> Self {
        let db_file = format!("storefront_test_{}.db", Uuid::new_v4().simple());
        let _ = std::fs::remove_file(&db_file);

        let mut cfg = AppConfig::new(
            format!("sqlite://{db_file}?mode=rwc"),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::with_notifier(Arc::new(pool), cfg, event_sender, notifier);
        let router = Router::new()
            .nest("/api/v1", storefront_api::handlers::api_v1_routes())
            .with_state(state.clone());

        Self {
            state,
            router,
            db_file,
            _event_task: event_task,
        }
    }

    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        cost_price: Decimal,
        shipping_cost: Decimal,
        stock: i32,
    ) -> product::Model {
        let model = product::Model {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price,
            cost_price,
            shipping_cost,
            images: json!(["https://cdn.example.com/a.jpg"]),
            stock,
            reserved_stock: 0,
            created_at: Utc::now(),
            updated_at: None,
        };
        Product::insert(product::ActiveModel {
            id: Set(model.id),
            name: Set(model.name.clone()),
            price: Set(model.price),
            cost_price: Set(model.cost_price),
            shipping_cost: Set(model.shipping_cost),
            images: Set(model.images.clone()),
            stock: Set(model.stock),
            reserved_stock: Set(model.reserved_stock),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        })
        .exec(&*self.state.db)
        .await
        .expect("failed to seed product");
        model
    }

    pub async fn seed_promo(
        &self,
        code: &str,
        discount_type: DiscountType,
        amount: Decimal,
    ) -> promo_code::Model {
        let now = Utc::now();
        let model = promo_code::Model {
            id: Uuid::new_v4(),
            code: code.to_string(),
            discount_type,
            amount,
            minimum_order_value: None,
            max_redemptions: None,
            redemptions: 0,
            active: true,
            starts_at: None,
            ends_at: None,
            created_at: now,
            updated_at: now,
        };
        PromoCode::insert(promo_code::ActiveModel {
            id: Set(model.id),
            code: Set(model.code.clone()),
            discount_type: Set(model.discount_type),
            amount: Set(model.amount),
            minimum_order_value: Set(model.minimum_order_value),
            max_redemptions: Set(model.max_redemptions),
            redemptions: Set(model.redemptions),
            active: Set(model.active),
            starts_at: Set(model.starts_at),
            ends_at: Set(model.ends_at),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        })
        .exec(&*self.state.db)
        .await
        .expect("failed to seed promo code");
        model
    }

    #[allow(dead_code)]
    pub async fn seed_user(&self, email: &str, name: &str) -> user::Model {
        let model = user::Model {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: Some(name.to_string()),
            created_at: Utc::now(),
        };
        User::insert(user::ActiveModel {
            id: Set(model.id),
            email: Set(model.email.clone()),
            name: Set(model.name.clone()),
            created_at: Set(model.created_at),
        })
        .exec(&*self.state.db)
        .await
        .expect("failed to seed user");
        model
    }

    #[allow(dead_code)]
    pub async fn reload_product(&self, id: Uuid) -> product::Model {
        Product::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("product query failed")
            .expect("product missing")
    }

    #[allow(dead_code)]
    pub async fn reload_promo(&self, id: Uuid) -> promo_code::Model {
        PromoCode::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("promo query failed")
            .expect("promo missing")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_file);
    }
}

/// Notifier that always fails delivery, for exercising the best-effort path.
#[derive(Debug, Clone, Default)]
pub struct FailingNotifier;

#[async_trait]
impl OrderNotifier for FailingNotifier {
    async fn send_order_confirmation(
        &self,
        _order: &order::Model,
        _items: &[order_item::Model],
    ) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery("smtp unreachable".to_string()))
    }
}

/// Builds a completed checkout session with the given payment intent and
/// metadata map. Metadata values must already be strings.
pub fn completed_session(payment_intent: &str, email: Option<&str>, metadata: Value) -> PaymentSession {
    let mut session = json!({
        "id": format!("cs_{}", Uuid::new_v4().simple()),
        "payment_intent": payment_intent,
        "metadata": metadata,
    });
    if let Some(email) = email {
        session["customer_email"] = json!(email);
    }
    serde_json::from_value(session).expect("session payload should deserialize")
}
