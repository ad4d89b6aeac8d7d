//! Repository — the single entry point for all business mutations.
//!
//! Every mutating operation validates its input, performs the local-store
//! write, and appends the matching outbox entry inside one sqlite
//! transaction, so the entity write and its replay record commit or roll
//! back together. Reads go straight to the local store; the UI never talks
//! to the store or the outbox directly.

use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::{self, DbState};
use crate::error::{Error, Result};
use crate::models::{
    is_local_id, local_client_id, local_inventory_id, local_order_id, local_service_id,
    ActivitySummary, Client, DailyRevenue, InventoryItem, Order, OrderFilter, OrderItem,
    OrderStatus, OrderSummary, Payment, Service, ServiceRevenue,
};
use crate::outbox::{
    self, InventoryAdjustment, Mutation, OrderStatusUpdate, ServiceActiveUpdate,
    ServicePriceUpdate,
};

/// A first-run catalog entry for [`Repository::seed_default_services`].
#[derive(Debug, Clone)]
pub struct ServiceSeed {
    pub name: &'static str,
    pub service_type: &'static str,
    pub subtype: Option<&'static str>,
    pub price_cents: i64,
}

pub struct Repository {
    db: Arc<DbState>,
    config: Arc<AppConfig>,
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Trim a required field, rejecting empty values before any write.
fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl Repository {
    pub fn new(db: Arc<DbState>, config: Arc<AppConfig>) -> Repository {
        Repository { db, config }
    }

    // -----------------------------------------------------------------------
    // Clients
    // -----------------------------------------------------------------------

    pub fn upsert_client(
        &self,
        id: Option<&str>,
        name: &str,
        phone: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Client> {
        let client = Client {
            id: id
                .map(str::to_string)
                .unwrap_or_else(local_client_id),
            name: required("client name", name)?,
            phone: optional(phone),
            notes: optional(notes),
        };

        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        db::upsert_client(&tx, &client)?;
        outbox::enqueue(&tx, &Mutation::ClientUpsert(client.clone()))?;
        tx.commit()?;
        Ok(client)
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        let conn = self.db.lock()?;
        db::list_clients(&conn)
    }

    pub fn search_clients(&self, query: &str) -> Result<Vec<Client>> {
        let conn = self.db.lock()?;
        if query.trim().is_empty() {
            db::list_clients(&conn)
        } else {
            db::search_clients(&conn, query)
        }
    }

    pub fn get_client(&self, id: &str) -> Result<Option<Client>> {
        let conn = self.db.lock()?;
        db::get_client(&conn, id)
    }

    // -----------------------------------------------------------------------
    // Services
    // -----------------------------------------------------------------------

    pub fn upsert_service(
        &self,
        id: Option<&str>,
        name: &str,
        service_type: &str,
        subtype: Option<&str>,
        price_cents: i64,
        active: bool,
    ) -> Result<Service> {
        let name = required("service name", name)?;
        let service_type = required("service type", service_type)?;
        if price_cents < 0 {
            return Err(Error::Validation("price must not be negative".to_string()));
        }
        let subtype = optional(subtype);
        let service = Service {
            id: id.map(str::to_string).unwrap_or_else(|| {
                local_service_id(&name, &service_type, subtype.as_deref())
            }),
            name,
            service_type,
            subtype,
            price_cents,
            active,
        };

        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        db::upsert_service(&tx, &service)?;
        outbox::enqueue(&tx, &Mutation::ServiceUpsert(service.clone()))?;
        tx.commit()?;
        Ok(service)
    }

    pub fn list_services(&self, include_inactive: bool) -> Result<Vec<Service>> {
        let conn = self.db.lock()?;
        db::list_services(&conn, include_inactive)
    }

    /// Update a catalog price. While the service id is still local the
    /// remote has no document to patch, so the queued mutation falls back to
    /// a full upsert.
    pub fn update_service_price(&self, service_id: &str, price_cents: i64) -> Result<Service> {
        if price_cents < 0 {
            return Err(Error::Validation("price must not be negative".to_string()));
        }

        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        db::update_service_price(&tx, service_id, price_cents)?;
        let service = db::get_service(&tx, service_id)?.ok_or(Error::NotFound("service"))?;
        let mutation = if is_local_id(service_id) {
            Mutation::ServiceUpsert(service.clone())
        } else {
            Mutation::ServicePriceUpdate(ServicePriceUpdate {
                id: service_id.to_string(),
                price_cents,
            })
        };
        outbox::enqueue(&tx, &mutation)?;
        tx.commit()?;
        Ok(service)
    }

    pub fn set_service_active(&self, service_id: &str, active: bool) -> Result<()> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        db::set_service_active(&tx, service_id, active)?;
        let service = db::get_service(&tx, service_id)?.ok_or(Error::NotFound("service"))?;
        // Same local-id fallback as price updates.
        let mutation = if is_local_id(service_id) {
            Mutation::ServiceUpsert(service)
        } else {
            Mutation::ServiceSetActive(ServiceActiveUpdate {
                id: service_id.to_string(),
                active,
            })
        };
        outbox::enqueue(&tx, &mutation)?;
        tx.commit()?;
        Ok(())
    }

    /// First-run seeding. Writes locally without outbox entries; the catalog
    /// syncs once the operator edits it. No-op unless the table is empty.
    pub fn seed_default_services(&self, seeds: &[ServiceSeed]) -> Result<usize> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        if db::count_services(&tx)? > 0 {
            return Ok(0);
        }
        for seed in seeds {
            let service = Service {
                id: local_service_id(seed.name, seed.service_type, seed.subtype),
                name: seed.name.to_string(),
                service_type: seed.service_type.to_string(),
                subtype: seed.subtype.map(str::to_string),
                price_cents: seed.price_cents,
                active: true,
            };
            db::upsert_service(&tx, &service)?;
        }
        tx.commit()?;
        info!(count = seeds.len(), "seeded default service catalog");
        Ok(seeds.len())
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    pub fn create_order(
        &self,
        client_id: &str,
        items: Vec<OrderItem>,
        due_date: Option<String>,
    ) -> Result<Order> {
        let client_id = required("client id", client_id)?;
        if items.is_empty() {
            return Err(Error::Validation(
                "an order needs at least one item".to_string(),
            ));
        }
        for item in &items {
            if item.quantity < 1 {
                return Err(Error::Validation(
                    "item quantity must be at least 1".to_string(),
                ));
            }
            if item.unit_price_cents < 0 {
                return Err(Error::Validation("price must not be negative".to_string()));
            }
        }

        let total_cents = items.iter().map(OrderItem::subtotal_cents).sum();
        let order = Order {
            id: local_order_id(),
            client_id,
            created_at: now_iso(),
            status: OrderStatus::Open,
            total_cents,
            due_date,
            delivered_at: None,
            order_code: self.new_order_code(),
            items,
        };

        {
            let mut conn = self.db.lock()?;
            let tx = conn.transaction()?;
            db::insert_order(&tx, &order)?;
            outbox::enqueue(&tx, &Mutation::OrderUpsert(order.clone()))?;
            tx.commit()?;
        }

        self.consume_stock_for(&order);
        Ok(order)
    }

    /// `{prefix}-{yymmdd}-{random}` — scannable, unique enough per day.
    fn new_order_code(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}",
            self.config.order_code_prefix,
            Utc::now().format("%y%m%d"),
            &suffix[..8]
        )
    }

    /// Best-effort stock consumption after order creation: configured
    /// service types decrement a named inventory item by the ordered
    /// quantity. Not transactionally linked to the order; failures are
    /// logged, never propagated.
    fn consume_stock_for(&self, order: &Order) {
        for item in &order.items {
            let Some(target) = self.config.stock_rules.get(&item.service_type) else {
                continue;
            };
            if let Err(e) = self.adjust_inventory(target, -item.quantity) {
                warn!(
                    order_id = order.id,
                    inventory_id = target.as_str(),
                    error = %e,
                    "stock consumption failed"
                );
            }
        }
    }

    /// Transition an order's status. The delivered timestamp is set only on
    /// the transition into delivered and cleared otherwise.
    pub fn update_order_status(&self, order_id: &str, status: OrderStatus) -> Result<()> {
        let delivered_at = match status {
            OrderStatus::Delivered => Some(now_iso()),
            _ => None,
        };

        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        db::update_order_status(&tx, order_id, status, delivered_at.as_deref())?;
        outbox::enqueue(
            &tx,
            &Mutation::OrderStatusUpdate(OrderStatusUpdate {
                id: order_id.to_string(),
                status,
                delivered_at,
            }),
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<OrderSummary>> {
        let conn = self.db.lock()?;
        db::list_orders(&conn, filter)
    }

    pub fn get_order_with_items(&self, order_id: &str) -> Result<Option<Order>> {
        let conn = self.db.lock()?;
        db::get_order_with_items(&conn, order_id)
    }

    /// Local-only removal; no remote tombstone is queued.
    pub fn delete_order(&self, order_id: &str) -> Result<()> {
        let conn = self.db.lock()?;
        db::delete_order(&conn, order_id)
    }

    // -----------------------------------------------------------------------
    // Payments
    // -----------------------------------------------------------------------

    /// Record a payment against an order. Payments are local bookkeeping
    /// only and never enter the outbox.
    pub fn add_payment(
        &self,
        order_id: &str,
        amount_cents: i64,
        method: Option<&str>,
        note: Option<&str>,
    ) -> Result<Payment> {
        let created_at = now_iso();
        let conn = self.db.lock()?;
        let id = db::insert_payment(
            &conn,
            order_id,
            amount_cents,
            optional(method).as_deref(),
            optional(note).as_deref(),
            &created_at,
        )?;
        Ok(Payment {
            id,
            order_id: order_id.to_string(),
            amount_cents,
            method: optional(method),
            note: optional(note),
            created_at,
        })
    }

    pub fn payments_for_order(&self, order_id: &str) -> Result<Vec<Payment>> {
        let conn = self.db.lock()?;
        db::list_payments_for_order(&conn, order_id)
    }

    pub fn cash_sum_for_date(&self, date: &str) -> Result<i64> {
        let conn = self.db.lock()?;
        db::cash_sum_for_date(&conn, date)
    }

    // -----------------------------------------------------------------------
    // Inventory
    // -----------------------------------------------------------------------

    pub fn upsert_inventory_item(
        &self,
        id: Option<&str>,
        name: &str,
        unit: &str,
        quantity: i64,
    ) -> Result<InventoryItem> {
        let item = InventoryItem {
            id: id
                .map(str::to_string)
                .unwrap_or_else(local_inventory_id),
            name: required("inventory name", name)?,
            unit: required("inventory unit", unit)?,
            quantity,
        };

        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        db::upsert_inventory_item(&tx, &item)?;
        outbox::enqueue(&tx, &Mutation::InventoryUpsert(item.clone()))?;
        tx.commit()?;
        Ok(item)
    }

    /// Atomic increment/decrement. Returns the resulting quantity, which is
    /// also what the queued mutation carries for remote replay.
    pub fn adjust_inventory(&self, id: &str, delta: i64) -> Result<i64> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        db::adjust_inventory(&tx, id, delta)?;
        let item = db::get_inventory_item(&tx, id)?.ok_or(Error::NotFound("inventory item"))?;
        outbox::enqueue(
            &tx,
            &Mutation::InventoryAdjust(InventoryAdjustment {
                id: id.to_string(),
                delta,
                quantity: item.quantity,
            }),
        )?;
        tx.commit()?;
        Ok(item.quantity)
    }

    pub fn list_inventory(&self) -> Result<Vec<InventoryItem>> {
        let conn = self.db.lock()?;
        db::list_inventory(&conn)
    }

    // -----------------------------------------------------------------------
    // Dashboard projections
    // -----------------------------------------------------------------------

    pub fn revenue_by_day(&self, last_n_days: u32) -> Result<Vec<DailyRevenue>> {
        let conn = self.db.lock()?;
        db::revenue_by_day(&conn, last_n_days)
    }

    pub fn top_services_by_revenue(
        &self,
        limit: u32,
        last_n_days: Option<u32>,
    ) -> Result<Vec<ServiceRevenue>> {
        let conn = self.db.lock()?;
        db::top_services_by_revenue(&conn, limit, last_n_days)
    }

    pub fn bottom_services_by_revenue(
        &self,
        limit: u32,
        last_n_days: Option<u32>,
    ) -> Result<Vec<ServiceRevenue>> {
        let conn = self.db.lock()?;
        db::bottom_services_by_revenue(&conn, limit, last_n_days)
    }

    pub fn summary_since(&self, last_n_days: u32) -> Result<ActivitySummary> {
        let conn = self.db.lock()?;
        db::summary_since(&conn, last_n_days)
    }

    // -----------------------------------------------------------------------
    // Sync visibility
    // -----------------------------------------------------------------------

    /// Point-in-time pending-sync count; safe to poll from any thread.
    pub fn pending_sync_count(&self) -> Result<i64> {
        let conn = self.db.lock()?;
        outbox::count(&conn)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations_for_test;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn test_repo() -> Repository {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;").expect("pragma setup");
        run_migrations_for_test(&conn);
        let db = Arc::new(DbState {
            conn: Mutex::new(conn),
            db_path: ":memory:".into(),
        });
        let mut config = AppConfig::default();
        config
            .stock_rules
            .insert("zipper_replacement".into(), "zipper".into());
        Repository::new(db, Arc::new(config))
    }

    fn outbox_entries(repo: &Repository) -> Vec<crate::outbox::OutboxEntry> {
        outbox::read_batch(&repo.db.lock().unwrap(), 100).unwrap()
    }

    fn item(service_type: &str, unit_price_cents: i64, quantity: i64) -> OrderItem {
        OrderItem {
            service_name: service_type.to_string(),
            service_type: service_type.to_string(),
            service_subtype: None,
            unit_price_cents,
            quantity,
        }
    }

    #[test]
    fn test_upsert_client_trims_name_and_queues_entry() {
        let repo = test_repo();
        let client = repo.upsert_client(None, " Ana ", Some(" 555-0101 "), None).unwrap();

        assert_eq!(client.name, "Ana");
        assert_eq!(client.phone.as_deref(), Some("555-0101"));
        assert!(is_local_id(&client.id));

        // Read-your-writes.
        let stored = repo.get_client(&client.id).unwrap().expect("stored");
        assert_eq!(stored.name, "Ana");

        let entries = outbox_entries(&repo);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, "client");
        assert_eq!(entries[0].action, "upsert");
    }

    #[test]
    fn test_empty_client_name_is_rejected_before_any_write() {
        let repo = test_repo();
        let err = repo.upsert_client(None, "   ", None, None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert!(repo.list_clients().unwrap().is_empty());
        assert_eq!(repo.pending_sync_count().unwrap(), 0);
    }

    #[test]
    fn test_negative_service_price_is_rejected() {
        let repo = test_repo();
        let err = repo
            .upsert_service(None, "Hem", "hem", None, -100, true)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(repo.pending_sync_count().unwrap(), 0);
    }

    #[test]
    fn test_create_order_computes_total_and_queues_one_entry() {
        let repo = test_repo();
        let client = repo.upsert_client(None, "Ana", None, None).unwrap();

        let order = repo
            .create_order(
                &client.id,
                vec![item("hem", 4500, 1), item("dart", 5500, 1)],
                None,
            )
            .unwrap();

        assert_eq!(order.total_cents, 10000);
        assert_eq!(order.status, OrderStatus::Open);
        assert!(is_local_id(&order.id));
        assert!(order.order_code.starts_with("WS-"));

        let entries = outbox_entries(&repo);
        // client upsert + order upsert
        assert_eq!(entries.len(), 2);
        let order_entry = &entries[1];
        assert_eq!(order_entry.kind, "order");
        assert_eq!(order_entry.action, "upsert");
        let payload: serde_json::Value = serde_json::from_str(&order_entry.payload).unwrap();
        assert_eq!(payload["items"].as_array().unwrap().len(), 2);
        assert_eq!(payload["total_cents"], 10000);
    }

    #[test]
    fn test_create_order_rejects_empty_items_and_bad_quantities() {
        let repo = test_repo();
        let client = repo.upsert_client(None, "Ana", None, None).unwrap();

        assert!(matches!(
            repo.create_order(&client.id, vec![], None),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            repo.create_order(&client.id, vec![item("hem", 100, 0)], None),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_create_order_for_unknown_client_fails_at_storage() {
        let repo = test_repo();
        let err = repo
            .create_order("ghost", vec![item("hem", 100, 1)], None)
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        // Rolled back as one unit: no order entry survived.
        assert_eq!(repo.pending_sync_count().unwrap(), 0);
    }

    #[test]
    fn test_order_creation_consumes_configured_stock() {
        let repo = test_repo();
        let client = repo.upsert_client(None, "Ana", None, None).unwrap();
        repo.upsert_inventory_item(Some("zipper"), "Standard zipper", "pc", 10)
            .unwrap();

        repo.create_order(&client.id, vec![item("zipper_replacement", 5500, 3)], None)
            .unwrap();

        let stock = repo.list_inventory().unwrap();
        assert_eq!(stock[0].quantity, 7);

        let actions: Vec<String> = outbox_entries(&repo)
            .into_iter()
            .map(|e| format!("{}/{}", e.kind, e.action))
            .collect();
        assert_eq!(
            actions,
            vec![
                "client/upsert",
                "inventory/upsert",
                "order/upsert",
                "inventory/adjust"
            ]
        );
    }

    #[test]
    fn test_stock_consumption_is_best_effort() {
        let repo = test_repo();
        let client = repo.upsert_client(None, "Ana", None, None).unwrap();

        // No "zipper" inventory item exists; the order must still succeed.
        let order = repo
            .create_order(&client.id, vec![item("zipper_replacement", 5500, 1)], None)
            .unwrap();
        assert!(repo.get_order_with_items(&order.id).unwrap().is_some());
    }

    #[test]
    fn test_update_order_status_sets_delivered_at_only_when_delivered() {
        let repo = test_repo();
        let client = repo.upsert_client(None, "Ana", None, None).unwrap();
        let order = repo
            .create_order(&client.id, vec![item("hem", 100, 1)], None)
            .unwrap();

        repo.update_order_status(&order.id, OrderStatus::Ready).unwrap();
        let got = repo.get_order_with_items(&order.id).unwrap().unwrap();
        assert_eq!(got.status, OrderStatus::Ready);
        assert!(got.delivered_at.is_none());

        repo.update_order_status(&order.id, OrderStatus::Delivered).unwrap();
        let got = repo.get_order_with_items(&order.id).unwrap().unwrap();
        assert_eq!(got.status, OrderStatus::Delivered);
        assert!(got.delivered_at.is_some());
    }

    #[test]
    fn test_adjust_inventory_twice_queues_two_entries() {
        let repo = test_repo();
        repo.upsert_inventory_item(Some("zipper"), "Standard zipper", "pc", 10)
            .unwrap();

        assert_eq!(repo.adjust_inventory("zipper", -3).unwrap(), 7);
        assert_eq!(repo.adjust_inventory("zipper", -3).unwrap(), 4);

        let adjusts: Vec<_> = outbox_entries(&repo)
            .into_iter()
            .filter(|e| e.action == "adjust")
            .collect();
        assert_eq!(adjusts.len(), 2);
        let payload: serde_json::Value = serde_json::from_str(&adjusts[1].payload).unwrap();
        assert_eq!(payload["delta"], -3);
        assert_eq!(payload["quantity"], 4);
    }

    #[test]
    fn test_price_update_falls_back_to_upsert_for_local_ids() {
        let repo = test_repo();
        let local = repo
            .upsert_service(None, "Hem", "hem", None, 2500, true)
            .unwrap();
        let remote = repo
            .upsert_service(Some("rm-5"), "Dart", "dart", None, 3000, true)
            .unwrap();

        repo.update_service_price(&local.id, 2800).unwrap();
        repo.update_service_price(&remote.id, 3200).unwrap();

        let entries = outbox_entries(&repo);
        let local_entry = &entries[2];
        assert_eq!(local_entry.action, "upsert");
        let payload: serde_json::Value = serde_json::from_str(&local_entry.payload).unwrap();
        assert_eq!(payload["price_cents"], 2800);

        let remote_entry = &entries[3];
        assert_eq!(remote_entry.action, "update_price");
    }

    #[test]
    fn test_set_active_falls_back_to_upsert_for_local_ids() {
        let repo = test_repo();
        let local = repo
            .upsert_service(None, "Hem", "hem", None, 2500, true)
            .unwrap();
        repo.set_service_active(&local.id, false).unwrap();

        let entries = outbox_entries(&repo);
        assert_eq!(entries[1].action, "upsert");

        let services = repo.list_services(true).unwrap();
        assert!(!services[0].active);
        assert!(repo.list_services(false).unwrap().is_empty());
    }

    #[test]
    fn test_payments_and_cash_sum() {
        let repo = test_repo();
        let client = repo.upsert_client(None, "Ana", None, None).unwrap();
        let order = repo
            .create_order(&client.id, vec![item("hem", 10000, 1)], None)
            .unwrap();

        repo.add_payment(&order.id, 4000, Some("cash"), None).unwrap();
        repo.add_payment(&order.id, 6000, Some("card"), Some("balance")).unwrap();

        let payments = repo.payments_for_order(&order.id).unwrap();
        assert_eq!(payments.len(), 2);

        let today = Utc::now().format("%Y-%m-%d").to_string();
        assert_eq!(repo.cash_sum_for_date(&today).unwrap(), 10000);

        // Payments never enter the outbox.
        assert!(outbox_entries(&repo).iter().all(|e| e.kind != "payment"));
    }

    #[test]
    fn test_seed_default_services_runs_once_and_stays_local() {
        let repo = test_repo();
        let seeds = [
            ServiceSeed {
                name: "Hem",
                service_type: "hem",
                subtype: Some("Original"),
                price_cents: 3500,
            },
            ServiceSeed {
                name: "Zipper replacement",
                service_type: "zipper_replacement",
                subtype: None,
                price_cents: 5500,
            },
        ];

        assert_eq!(repo.seed_default_services(&seeds).unwrap(), 2);
        assert_eq!(repo.seed_default_services(&seeds).unwrap(), 0);
        assert_eq!(repo.list_services(true).unwrap().len(), 2);
        assert_eq!(repo.pending_sync_count().unwrap(), 0);
    }

    #[test]
    fn test_pending_sync_count_tracks_mutations() {
        let repo = test_repo();
        assert_eq!(repo.pending_sync_count().unwrap(), 0);
        repo.upsert_client(None, "Ana", None, None).unwrap();
        repo.upsert_client(None, "Bia", None, None).unwrap();
        assert_eq!(repo.pending_sync_count().unwrap(), 2);
    }
}
