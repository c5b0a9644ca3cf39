use crate::AppState;
use axum::{
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;

pub mod analytics;
pub mod checkout;
pub mod orders;
pub mod promotions;
pub mod settings;

/// All `/api/v1` routes.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout/webhook", post(checkout::checkout_webhook))
        .route("/orders", get(orders::list_orders))
        .route(
            "/orders/:id",
            get(orders::get_order).delete(orders::delete_order),
        )
        .route("/orders/:id/status", put(orders::update_order_status))
        .route(
            "/promo-codes/validate",
            post(promotions::validate_promo_code),
        )
        .route(
            "/settings/stock-policy",
            get(settings::get_stock_policy).put(settings::update_stock_policy),
        )
        .route("/analytics/sales", get(analytics::sales_report))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
