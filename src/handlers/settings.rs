use crate::{errors::ServiceError, AppState};
use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

/// GET /api/v1/settings/stock-policy
pub async fn get_stock_policy(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let auto_deduct = state.services.settings.auto_deduct_stock().await?;
    Ok(Json(json!({ "auto_deduct_stock": auto_deduct })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStockPolicyRequest {
    pub auto_deduct_stock: bool,
}

/// PUT /api/v1/settings/stock-policy
pub async fn update_stock_policy(
    State(state): State<AppState>,
    Json(request): Json<UpdateStockPolicyRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .settings
        .set_auto_deduct_stock(request.auto_deduct_stock)
        .await?;
    Ok(Json(json!({ "auto_deduct_stock": request.auto_deduct_stock })))
}
