use crate::{errors::ServiceError, payments::PaymentSession, AppState};
use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// POST /api/v1/checkout/webhook
///
/// Receives payment-provider events. Only `checkout.session.completed` is
/// acted on; everything else is acknowledged and dropped. Redelivery of the
/// same session is safe: finalization is idempotent on the payment
/// reference.
pub async fn checkout_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(secret) = state.config.stripe_webhook_secret.as_deref() {
        if !verify_signature(&headers, &body, secret, state.config.webhook_tolerance_secs()) {
            warn!("Checkout webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    let event: Value = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("invalid json: {}", e)))?;

    let event_type = event.get("type").and_then(|v| v.as_str()).unwrap_or("");
    if event_type != "checkout.session.completed" {
        info!(event_type, "Ignoring unhandled webhook event type");
        return Ok(Json(json!({ "received": true })));
    }

    let session_value = event
        .get("data")
        .and_then(|data| data.get("object"))
        .cloned()
        .ok_or_else(|| ServiceError::BadRequest("event missing data.object".to_string()))?;
    let session: PaymentSession = serde_json::from_value(session_value)
        .map_err(|e| ServiceError::BadRequest(format!("invalid checkout session: {}", e)))?;

    let finalized = state
        .services
        .checkout
        .finalize_session(&session, None)
        .await?;

    Ok(Json(json!({
        "received": true,
        "order_id": finalized.order.id,
        "created": finalized.created,
    })))
}

/// Verifies the webhook HMAC. Two header schemes are accepted: generic
/// `x-timestamp`/`x-signature`, and `Stripe-Signature` with `t=`/`v1=`
/// components. Both sign `"{timestamp}.{body}"` with SHA-256.
fn verify_signature(headers: &HeaderMap, payload: &Bytes, secret: &str, tolerance_secs: u64) -> bool {
    if let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) {
        if let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) {
            if let Ok(ts_i) = ts.parse::<i64>() {
                let now = chrono::Utc::now().timestamp();
                if (now - ts_i).unsigned_abs() > tolerance_secs {
                    return false;
                }
            }
            return constant_time_eq(&expected_signature(ts, payload, secret), sig);
        }
    }

    if let Some(sig) = headers
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
    {
        let mut ts = "";
        let mut v1 = "";
        for part in sig.split(',') {
            let mut it = part.trim().split('=');
            match (it.next(), it.next()) {
                (Some("t"), Some(val)) => ts = val,
                (Some("v1"), Some(val)) => v1 = val,
                _ => {}
            }
        }
        if !ts.is_empty() && !v1.is_empty() {
            if let Ok(ts_i) = ts.parse::<i64>() {
                let now = chrono::Utc::now().timestamp();
                if (now - ts_i).unsigned_abs() > tolerance_secs {
                    return false;
                }
            }
            return constant_time_eq(&expected_signature(ts, payload, secret), v1);
        }
    }
    false
}

fn expected_signature(timestamp: &str, payload: &Bytes, secret: &str) -> String {
    let signed = format!("{}.{}", timestamp, std::str::from_utf8(payload).unwrap_or(""));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signed.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
