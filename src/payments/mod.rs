//! Inbound payment-session payload and the metadata formats the checkout
//! pipeline reconstructs orders from.
//!
//! The payment provider delivers a completed checkout session whose
//! `metadata` is a flat string-keyed map. The cart snapshot, address, and
//! promo applications ride inside it as pre-serialized JSON; every parser
//! here treats malformed input as absent rather than fatal.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

/// Settled payment-intent reference: either a bare id string or an expanded
/// object carrying one.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PaymentIntentRef {
    Id(String),
    Object { id: String },
}

impl PaymentIntentRef {
    pub fn id(&self) -> &str {
        match self {
            PaymentIntentRef::Id(id) => id,
            PaymentIntentRef::Object { id } => id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<serde_json::Value>,
}

/// Completed checkout session as delivered by the payment provider webhook.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentSession {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<PaymentIntentRef>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentSession {
    /// The idempotency key: the settled payment-intent id, falling back to
    /// the session id itself.
    pub fn payment_reference(&self) -> &str {
        self.payment_intent
            .as_ref()
            .map(PaymentIntentRef::id)
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.id)
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Parses a monetary metadata field; unparsable values count as absent.
    pub fn metadata_money(&self, key: &str) -> Option<Decimal> {
        self.metadata_str(key).and_then(parse_money)
    }

    /// Parses the serialized cart snapshot. Malformed JSON is treated as an
    /// empty cart, never as a failure of the whole operation.
    pub fn cart_items(&self) -> Vec<CartItemSnapshot> {
        let Some(raw) = self.metadata_str("items") else {
            return Vec::new();
        };
        match serde_json::from_str(raw) {
            Ok(items) => items,
            Err(err) => {
                warn!(session_id = %self.id, error = %err, "Malformed cart metadata, treating as empty cart");
                Vec::new()
            }
        }
    }

    /// Promo applications: the `promoCodes` list when present, else the
    /// legacy single `promoCode`/`promoCodeId` pair.
    pub fn promo_snapshots(&self) -> Vec<PromoCodeSnapshot> {
        if let Some(raw) = self.metadata_str("promoCodes") {
            match serde_json::from_str::<Vec<PromoCodeSnapshot>>(raw) {
                Ok(snapshots) => return snapshots,
                Err(err) => {
                    warn!(session_id = %self.id, error = %err, "Malformed promoCodes metadata, falling back to legacy fields");
                }
            }
        }

        let code = self.metadata_str("promoCode");
        let id = self.metadata_str("promoCodeId");
        if code.is_none() && id.is_none() {
            return Vec::new();
        }
        vec![PromoCodeSnapshot {
            id: id.map(str::to_string),
            code: code.map(str::to_string),
            discount_type: None,
            amount: None,
            // The legacy pair carries no per-promo ledger; the order-level
            // discount figure stands in for it.
            discount_amount: self.metadata_money("discount"),
        }]
    }
}

/// Cart line captured at checkout time.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemSnapshot {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub price_at_purchase: Option<Decimal>,
}

fn default_quantity() -> i32 {
    1
}

/// Promo application captured at checkout time. Live promo records take
/// precedence over these snapshots; the snapshot is the fallback for codes
/// that no longer exist.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCodeSnapshot {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub discount_type: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub discount_amount: Option<Decimal>,
}

/// Structured postal address used by online orders.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PostalAddress {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// The address blob differs by sale channel: online orders carry a postal
/// address, in-person sales a `{"type":"in-person"}` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAddress {
    InPerson { location: Option<String> },
    Online(PostalAddress),
    Unknown,
}

impl OrderAddress {
    pub fn parse(raw: &str) -> OrderAddress {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
            return OrderAddress::Unknown;
        };
        let Some(object) = value.as_object() else {
            return OrderAddress::Unknown;
        };
        if object.get("type").and_then(|t| t.as_str()) == Some("in-person") {
            let location = object
                .get("location")
                .and_then(|l| l.as_str())
                .map(str::to_string);
            return OrderAddress::InPerson { location };
        }
        match serde_json::from_value::<PostalAddress>(value) {
            Ok(address) => OrderAddress::Online(address),
            Err(_) => OrderAddress::Unknown,
        }
    }

    /// Geographic bucket label for analytics.
    pub fn location_label(&self) -> String {
        match self {
            OrderAddress::InPerson { .. } => "In-Person".to_string(),
            OrderAddress::Online(address) => address
                .country
                .clone()
                .filter(|country| !country.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            OrderAddress::Unknown => "Unknown".to_string(),
        }
    }
}

/// Lossy money parse: decimal string first, float form second.
pub fn parse_money(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .ok()
        .or_else(|| f64::from_str(trimmed).ok().and_then(Decimal::from_f64_retain))
}
