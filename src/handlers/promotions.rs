use crate::{errors::ServiceError, AppState};
use axum::{extract::State, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct ValidatePromoRequest {
    pub code: String,
    pub subtotal: Decimal,
}

/// POST /api/v1/promo-codes/validate
///
/// Checkout-time validation: answers whether a code applies to the given
/// subtotal and what it would deduct. Does not redeem anything.
pub async fn validate_promo_code(
    State(state): State<AppState>,
    Json(request): Json<ValidatePromoRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let promo = state
        .services
        .promotions
        .validate_code(&request.code, request.subtotal)
        .await?;
    let discount = promo.discount_for(request.subtotal);
    Ok(Json(json!({
        "valid": true,
        "code": promo.code,
        "discount_type": promo.discount_type,
        "amount": promo.amount,
        "discount": discount,
    })))
}
