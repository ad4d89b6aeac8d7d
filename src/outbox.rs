//! Outbox queue: an ordered, durable log of pending mutations.
//!
//! Each row in `sync_queue` is a self-contained replay record decoupled from
//! the entity tables; an entity may be edited or deleted locally after its
//! entry is queued and the entry still carries everything needed to apply
//! remotely. Entries are never mutated, only appended and deleted, and are
//! drained strictly oldest-first so causally ordered mutations of the same
//! entity reach the remote in order.

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{Client, InventoryItem, Order, OrderStatus, Service};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Service,
    Client,
    Order,
    Inventory,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Service => "service",
            EntityKind::Client => "client",
            EntityKind::Order => "order",
            EntityKind::Inventory => "inventory",
        }
    }

    pub fn parse(s: &str) -> Option<EntityKind> {
        match s {
            "service" => Some(EntityKind::Service),
            "client" => Some(EntityKind::Client),
            "order" => Some(EntityKind::Order),
            "inventory" => Some(EntityKind::Inventory),
            _ => None,
        }
    }

    /// Remote collection this kind maps to.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Service => "services",
            EntityKind::Client => "clients",
            EntityKind::Order => "orders",
            EntityKind::Inventory => "inventory",
        }
    }
}

// ---------------------------------------------------------------------------
// Typed mutations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServicePriceUpdate {
    pub id: String,
    pub price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceActiveUpdate {
    pub id: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderStatusUpdate {
    pub id: String,
    pub status: OrderStatus,
    pub delivered_at: Option<String>,
}

/// Inventory adjustment. Carries the post-adjustment quantity so remote
/// replay is a plain merge write (the remote interface has no increments);
/// FIFO draining makes the last applied entry win.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryAdjustment {
    pub id: String,
    pub delta: i64,
    pub quantity: i64,
}

/// One pending mutation, strongly typed per entity kind and action. The
/// durable encoding is the (entity, action, payload) triple in `sync_queue`;
/// the variants exist so the remote adapter dispatches by exhaustive match
/// instead of string comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    ServiceUpsert(Service),
    ServicePriceUpdate(ServicePriceUpdate),
    ServiceSetActive(ServiceActiveUpdate),
    ClientUpsert(Client),
    OrderUpsert(Order),
    OrderStatusUpdate(OrderStatusUpdate),
    InventoryUpsert(InventoryItem),
    InventoryAdjust(InventoryAdjustment),
}

impl Mutation {
    pub fn kind(&self) -> EntityKind {
        match self {
            Mutation::ServiceUpsert(_)
            | Mutation::ServicePriceUpdate(_)
            | Mutation::ServiceSetActive(_) => EntityKind::Service,
            Mutation::ClientUpsert(_) => EntityKind::Client,
            Mutation::OrderUpsert(_) | Mutation::OrderStatusUpdate(_) => EntityKind::Order,
            Mutation::InventoryUpsert(_) | Mutation::InventoryAdjust(_) => EntityKind::Inventory,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Mutation::ServiceUpsert(_)
            | Mutation::ClientUpsert(_)
            | Mutation::OrderUpsert(_)
            | Mutation::InventoryUpsert(_) => "upsert",
            Mutation::ServicePriceUpdate(_) => "update_price",
            Mutation::ServiceSetActive(_) => "set_active",
            Mutation::OrderStatusUpdate(_) => "update_status",
            Mutation::InventoryAdjust(_) => "adjust",
        }
    }

    pub fn payload(&self) -> Result<Value> {
        let v = match self {
            Mutation::ServiceUpsert(s) => serde_json::to_value(s)?,
            Mutation::ServicePriceUpdate(p) => serde_json::to_value(p)?,
            Mutation::ServiceSetActive(p) => serde_json::to_value(p)?,
            Mutation::ClientUpsert(c) => serde_json::to_value(c)?,
            Mutation::OrderUpsert(o) => serde_json::to_value(o)?,
            Mutation::OrderStatusUpdate(p) => serde_json::to_value(p)?,
            Mutation::InventoryUpsert(i) => serde_json::to_value(i)?,
            Mutation::InventoryAdjust(p) => serde_json::to_value(p)?,
        };
        Ok(v)
    }

    /// Rebuild a typed mutation from a stored outbox row.
    pub fn decode(kind: &str, action: &str, payload: &str) -> Result<Mutation> {
        let parsed_kind = EntityKind::parse(kind).ok_or_else(|| Error::UnknownMutation {
            kind: kind.to_string(),
            action: action.to_string(),
        })?;
        let m = match (parsed_kind, action) {
            (EntityKind::Service, "upsert") => {
                Mutation::ServiceUpsert(serde_json::from_str(payload)?)
            }
            (EntityKind::Service, "update_price") => {
                Mutation::ServicePriceUpdate(serde_json::from_str(payload)?)
            }
            (EntityKind::Service, "set_active") => {
                Mutation::ServiceSetActive(serde_json::from_str(payload)?)
            }
            (EntityKind::Client, "upsert") => {
                Mutation::ClientUpsert(serde_json::from_str(payload)?)
            }
            (EntityKind::Order, "upsert") => Mutation::OrderUpsert(serde_json::from_str(payload)?),
            (EntityKind::Order, "update_status") => {
                Mutation::OrderStatusUpdate(serde_json::from_str(payload)?)
            }
            (EntityKind::Inventory, "upsert") => {
                Mutation::InventoryUpsert(serde_json::from_str(payload)?)
            }
            (EntityKind::Inventory, "adjust") => {
                Mutation::InventoryAdjust(serde_json::from_str(payload)?)
            }
            _ => {
                return Err(Error::UnknownMutation {
                    kind: kind.to_string(),
                    action: action.to_string(),
                })
            }
        };
        Ok(m)
    }
}

// ---------------------------------------------------------------------------
// Queue operations
// ---------------------------------------------------------------------------

/// One stored outbox row, as read back from `sync_queue`.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub id: i64,
    pub kind: String,
    pub action: String,
    pub payload: String,
    pub created_at: String,
}

impl OutboxEntry {
    pub fn mutation(&self) -> Result<Mutation> {
        Mutation::decode(&self.kind, &self.action, &self.payload)
    }
}

/// Append one mutation. The sequence id comes from the rowid, so ids are
/// monotonically increasing in enqueue order.
pub fn enqueue(conn: &Connection, mutation: &Mutation) -> Result<i64> {
    let payload = serde_json::to_string(&mutation.payload()?)?;
    conn.execute(
        "INSERT INTO sync_queue (entity, action, payload, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            mutation.kind().as_str(),
            mutation.action(),
            payload,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Read up to `limit` oldest entries without removing them.
pub fn read_batch(conn: &Connection, limit: usize) -> Result<Vec<OutboxEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, entity, action, payload, created_at
         FROM sync_queue ORDER BY id ASC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(OutboxEntry {
            id: row.get(0)?,
            kind: row.get(1)?,
            action: row.get(2)?,
            payload: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

/// Remove one entry. Idempotent: deleting a missing id is not an error.
pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id])?;
    Ok(())
}

/// Total pending entries (the operator-visible pending-sync indicator).
pub fn count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))
        .map_err(Error::from)
}

/// Rewrite a reconciled id inside every queued payload. Runs as one UPDATE
/// over the JSON text; the quoted form keeps the replacement anchored to
/// whole string values.
pub fn rewrite_id(conn: &Connection, local_id: &str, remote_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE sync_queue SET payload = replace(payload, ?1, ?2)",
        params![format!("\"{local_id}\""), format!("\"{remote_id}\"")],
    )?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
