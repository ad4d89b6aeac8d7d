//! Business entities and local-id synthesis.
//!
//! All identifiers are opaque strings. Entities created before the remote
//! store has assigned an id carry a `local:` prefix; the sync worker swaps
//! these for remote-assigned ids once the corresponding upsert lands (see
//! `db::reconcile_entity_id`).

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marker prefix for identifiers synthesized locally, never valid as a
/// remote document address.
pub const LOCAL_ID_PREFIX: &str = "local:";

pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

pub fn local_client_id() -> String {
    format!("{LOCAL_ID_PREFIX}client:{}", Uuid::new_v4())
}

pub fn local_order_id() -> String {
    format!("{LOCAL_ID_PREFIX}order:{}", Uuid::new_v4())
}

pub fn local_inventory_id() -> String {
    format!("{LOCAL_ID_PREFIX}inventory:{}", Uuid::new_v4())
}

/// Services are keyed by their (name, type, subtype) triple until the remote
/// assigns an id, so re-seeding the same catalog is idempotent.
pub fn local_service_id(name: &str, service_type: &str, subtype: Option<&str>) -> String {
    format!(
        "{LOCAL_ID_PREFIX}{name}:{service_type}:{}",
        subtype.unwrap_or("")
    )
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub subtype: Option<String>,
    pub price_cents: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Ready,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
        }
    }

    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "open" => Some(OrderStatus::Open),
            "ready" => Some(OrderStatus::Ready),
            "delivered" => Some(OrderStatus::Delivered),
            _ => None,
        }
    }
}

impl ToSql for OrderStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for OrderStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        OrderStatus::parse(s).ok_or(FromSqlError::InvalidType)
    }
}

/// Denormalized snapshot of a service at order-creation time. Immutable:
/// later price changes to the catalog never alter historical orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub service_name: String,
    pub service_type: String,
    pub service_subtype: Option<String>,
    pub unit_price_cents: i64,
    pub quantity: i64,
}

impl OrderItem {
    pub fn subtotal_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub client_id: String,
    /// UTC, ISO-8601.
    pub created_at: String,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub due_date: Option<String>,
    /// Set only on transition to delivered.
    pub delivered_at: Option<String>,
    /// Human-readable code used for QR/barcode lookup.
    pub order_code: String,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: String,
    pub amount_cents: i64,
    pub method: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub unit: String,
    /// May go negative; no floor is enforced at the data layer.
    pub quantity: i64,
}

// ---------------------------------------------------------------------------
// Read-side projections
// ---------------------------------------------------------------------------

/// One row of the orders list view (client name joined in).
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: String,
    pub order_code: String,
    pub client_name: String,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Matched against client name or phone.
    pub client_query: Option<String>,
    pub order_code_query: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyRevenue {
    /// YYYY-MM-DD (UTC).
    pub day: String,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceRevenue {
    pub service_name: String,
    pub revenue_cents: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivitySummary {
    pub orders: i64,
    pub revenue_cents: i64,
    pub received_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_id_marker() {
        assert!(is_local_id(&local_client_id()));
        assert!(is_local_id(&local_order_id()));
        assert!(!is_local_id("b7f3c2a1"));
    }

    #[test]
    fn test_local_service_id_is_stable_for_same_triple() {
        let a = local_service_id("Hem", "hem", Some("Original"));
        let b = local_service_id("Hem", "hem", Some("Original"));
        assert_eq!(a, b);
        assert_eq!(a, "local:Hem:hem:Original");
        assert_eq!(local_service_id("Dart", "dart", None), "local:Dart:dart:");
    }

    #[test]
    fn test_order_status_round_trip() {
        for status in [OrderStatus::Open, OrderStatus::Ready, OrderStatus::Delivered] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("cancelled"), None);
    }

    #[test]
    fn test_service_serializes_type_field() {
        let svc = Service {
            id: "svc-1".into(),
            name: "Hem".into(),
            service_type: "hem".into(),
            subtype: None,
            price_cents: 2500,
            active: true,
        };
        let v = serde_json::to_value(&svc).unwrap();
        assert_eq!(v["type"], "hem");
        assert!(v.get("service_type").is_none());
    }
}
