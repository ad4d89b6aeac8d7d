//! Local SQLite store — the durable source of truth for all business
//! entities plus the outbox table.
//!
//! Uses rusqlite with WAL mode. Provides schema migrations and row-level
//! CRUD helpers that operate on a borrowed connection so the repository can
//! wrap an entity write and its outbox append in one transaction.

use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::models::{
    ActivitySummary, Client, DailyRevenue, InventoryItem, Order, OrderFilter, OrderItem,
    OrderStatus, OrderSummary, Payment, Service, ServiceRevenue,
};
use crate::outbox::EntityKind;

/// Shared handle to the database connection. The foreground repository and
/// the background sync worker serialize access through the mutex; each
/// logical operation holds the lock for one short-lived transaction and
/// never across a network call.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

impl DbState {
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Open the database at `config.db_path`, creating parent directories,
/// applying pragmas, and running any pending migrations.
pub fn init(config: &AppConfig) -> Result<DbState> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    info!("Opening database at {}", config.db_path.display());
    let conn = open_and_configure(&config.db_path)?;
    run_migrations(&conn)?;
    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: config.db_path.clone(),
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &std::path::Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Migration v1: catalog, clients, orders, and the outbox.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- service catalog
        CREATE TABLE IF NOT EXISTS services (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            subtype TEXT,
            price_cents INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );

        -- clients
        CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT,
            notes TEXT
        );

        -- orders (ON UPDATE CASCADE lets id reconciliation rewrite the
        -- parent key and have children follow)
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL REFERENCES clients(id) ON UPDATE CASCADE,
            created_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open',
            total_cents INTEGER NOT NULL,
            due_date TEXT,
            delivered_at TEXT,
            order_code TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id TEXT NOT NULL REFERENCES orders(id)
                ON UPDATE CASCADE ON DELETE CASCADE,
            service_name TEXT NOT NULL,
            service_type TEXT NOT NULL,
            service_subtype TEXT,
            unit_price_cents INTEGER NOT NULL,
            quantity INTEGER NOT NULL
        );

        -- outbox (append-only; deletion only after confirmed remote apply)
        CREATE TABLE IF NOT EXISTS sync_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity TEXT NOT NULL,
            action TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        -- Indexes
        CREATE INDEX IF NOT EXISTS idx_clients_name ON clients(name);
        CREATE INDEX IF NOT EXISTS idx_clients_phone ON clients(phone);
        CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
        CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at);
        CREATE INDEX IF NOT EXISTS idx_orders_code ON orders(order_code);
        CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id);

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| {
        error!("Migration v1 failed: {e}");
        e
    })?;

    info!("Applied migration v1");
    Ok(())
}

/// Migration v2: payments and inventory.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS payments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id TEXT NOT NULL REFERENCES orders(id)
                ON UPDATE CASCADE ON DELETE CASCADE,
            amount_cents INTEGER NOT NULL,
            method TEXT,
            note TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS inventory (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            unit TEXT NOT NULL,
            quantity INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_payments_order ON payments(order_id);
        CREATE INDEX IF NOT EXISTS idx_payments_created_at ON payments(created_at);

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )
    .map_err(|e| {
        error!("Migration v2 failed: {e}");
        e
    })?;

    info!("Applied migration v2 (payments, inventory)");
    Ok(())
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

pub fn upsert_service(conn: &Connection, service: &Service) -> Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, type, subtype, price_cents, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             type = excluded.type,
             subtype = excluded.subtype,
             price_cents = excluded.price_cents,
             active = excluded.active",
        params![
            service.id,
            service.name,
            service.service_type,
            service.subtype,
            service.price_cents,
            service.active,
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> Result<Option<Service>> {
    conn.query_row(
        "SELECT id, name, type, subtype, price_cents, active FROM services WHERE id = ?1",
        params![id],
        service_from_row,
    )
    .optional()
    .map_err(Error::from)
}

pub fn list_services(conn: &Connection, include_inactive: bool) -> Result<Vec<Service>> {
    let sql = if include_inactive {
        "SELECT id, name, type, subtype, price_cents, active FROM services ORDER BY name ASC"
    } else {
        "SELECT id, name, type, subtype, price_cents, active FROM services
         WHERE active = 1 ORDER BY name ASC"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], service_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

pub fn count_services(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0))
        .map_err(Error::from)
}

pub fn update_service_price(conn: &Connection, id: &str, price_cents: i64) -> Result<()> {
    conn.execute(
        "UPDATE services SET price_cents = ?1 WHERE id = ?2",
        params![price_cents, id],
    )?;
    Ok(())
}

pub fn set_service_active(conn: &Connection, id: &str, active: bool) -> Result<()> {
    conn.execute(
        "UPDATE services SET active = ?1 WHERE id = ?2",
        params![active, id],
    )?;
    Ok(())
}

fn service_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        service_type: row.get(2)?,
        subtype: row.get(3)?,
        price_cents: row.get(4)?,
        active: row.get(5)?,
    })
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

pub fn upsert_client(conn: &Connection, client: &Client) -> Result<()> {
    conn.execute(
        "INSERT INTO clients (id, name, phone, notes)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             phone = excluded.phone,
             notes = excluded.notes",
        params![client.id, client.name, client.phone, client.notes],
    )?;
    Ok(())
}

pub fn get_client(conn: &Connection, id: &str) -> Result<Option<Client>> {
    conn.query_row(
        "SELECT id, name, phone, notes FROM clients WHERE id = ?1",
        params![id],
        client_from_row,
    )
    .optional()
    .map_err(Error::from)
}

pub fn list_clients(conn: &Connection) -> Result<Vec<Client>> {
    let mut stmt =
        conn.prepare("SELECT id, name, phone, notes FROM clients ORDER BY name ASC")?;
    let rows = stmt.query_map([], client_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

pub fn search_clients(conn: &Connection, query: &str) -> Result<Vec<Client>> {
    let like = format!("%{}%", query.trim());
    let mut stmt = conn.prepare(
        "SELECT id, name, phone, notes FROM clients
         WHERE name LIKE ?1 OR phone LIKE ?1
         ORDER BY name ASC",
    )?;
    let rows = stmt.query_map(params![like], client_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

fn client_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        notes: row.get(3)?,
    })
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

pub fn insert_order(conn: &Connection, order: &Order) -> Result<()> {
    conn.execute(
        "INSERT INTO orders
             (id, client_id, created_at, status, total_cents, due_date, delivered_at, order_code)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            order.id,
            order.client_id,
            order.created_at,
            order.status,
            order.total_cents,
            order.due_date,
            order.delivered_at,
            order.order_code,
        ],
    )?;
    for item in &order.items {
        conn.execute(
            "INSERT INTO order_items
                 (order_id, service_name, service_type, service_subtype,
                  unit_price_cents, quantity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                order.id,
                item.service_name,
                item.service_type,
                item.service_subtype,
                item.unit_price_cents,
                item.quantity,
            ],
        )?;
    }
    Ok(())
}

pub fn update_order_status(
    conn: &Connection,
    order_id: &str,
    status: OrderStatus,
    delivered_at: Option<&str>,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE orders SET status = ?1, delivered_at = ?2 WHERE id = ?3",
        params![status, delivered_at, order_id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound("order"));
    }
    Ok(())
}

pub fn list_orders(conn: &Connection, filter: &OrderFilter) -> Result<Vec<OrderSummary>> {
    let mut sql = String::from(
        "SELECT o.id, o.order_code, COALESCE(c.name, ''), o.status, o.total_cents, o.due_date
         FROM orders o LEFT JOIN clients c ON c.id = o.client_id",
    );
    let mut clauses: Vec<&str> = Vec::new();
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        clauses.push("o.status = ?");
        args.push(Box::new(status.as_str().to_string()));
    }
    if let Some(q) = filter.client_query.as_deref().filter(|q| !q.trim().is_empty()) {
        clauses.push("(c.name LIKE ? OR c.phone LIKE ?)");
        let like = format!("%{}%", q.trim());
        args.push(Box::new(like.clone()));
        args.push(Box::new(like));
    }
    if let Some(q) = filter
        .order_code_query
        .as_deref()
        .filter(|q| !q.trim().is_empty())
    {
        clauses.push("o.order_code LIKE ?");
        args.push(Box::new(format!("%{}%", q.trim())));
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY o.created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |row| {
        Ok(OrderSummary {
            id: row.get(0)?,
            order_code: row.get(1)?,
            client_name: row.get(2)?,
            status: row.get(3)?,
            total_cents: row.get(4)?,
            due_date: row.get(5)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

pub fn get_order_with_items(conn: &Connection, order_id: &str) -> Result<Option<Order>> {
    let header = conn
        .query_row(
            "SELECT id, client_id, created_at, status, total_cents, due_date,
                    delivered_at, order_code
             FROM orders WHERE id = ?1",
            params![order_id],
            |row| {
                Ok(Order {
                    id: row.get(0)?,
                    client_id: row.get(1)?,
                    created_at: row.get(2)?,
                    status: row.get(3)?,
                    total_cents: row.get(4)?,
                    due_date: row.get(5)?,
                    delivered_at: row.get(6)?,
                    order_code: row.get(7)?,
                    items: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut order) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT service_name, service_type, service_subtype, unit_price_cents, quantity
         FROM order_items WHERE order_id = ?1 ORDER BY id ASC",
    )?;
    let items = stmt.query_map(params![order_id], |row| {
        Ok(OrderItem {
            service_name: row.get(0)?,
            service_type: row.get(1)?,
            service_subtype: row.get(2)?,
            unit_price_cents: row.get(3)?,
            quantity: row.get(4)?,
        })
    })?;
    order.items = items.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Some(order))
}

/// Delete an order locally. Items and payments cascade.
pub fn delete_order(conn: &Connection, order_id: &str) -> Result<()> {
    conn.execute("DELETE FROM orders WHERE id = ?1", params![order_id])?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

pub fn insert_payment(
    conn: &Connection,
    order_id: &str,
    amount_cents: i64,
    method: Option<&str>,
    note: Option<&str>,
    created_at: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO payments (order_id, amount_cents, method, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![order_id, amount_cents, method, note, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_payments_for_order(conn: &Connection, order_id: &str) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(
        "SELECT id, order_id, amount_cents, method, note, created_at
         FROM payments WHERE order_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![order_id], |row| {
        Ok(Payment {
            id: row.get(0)?,
            order_id: row.get(1)?,
            amount_cents: row.get(2)?,
            method: row.get(3)?,
            note: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

/// Total received on one UTC date (YYYY-MM-DD). Zero for empty ranges.
pub fn cash_sum_for_date(conn: &Connection, date: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM payments
         WHERE substr(created_at, 1, 10) = ?1",
        params![date],
        |row| row.get(0),
    )
    .map_err(Error::from)
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

pub fn upsert_inventory_item(conn: &Connection, item: &InventoryItem) -> Result<()> {
    conn.execute(
        "INSERT INTO inventory (id, name, unit, quantity)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             unit = excluded.unit,
             quantity = excluded.quantity",
        params![item.id, item.name, item.unit, item.quantity],
    )?;
    Ok(())
}

pub fn get_inventory_item(conn: &Connection, id: &str) -> Result<Option<InventoryItem>> {
    conn.query_row(
        "SELECT id, name, unit, quantity FROM inventory WHERE id = ?1",
        params![id],
        inventory_from_row,
    )
    .optional()
    .map_err(Error::from)
}

pub fn list_inventory(conn: &Connection) -> Result<Vec<InventoryItem>> {
    let mut stmt =
        conn.prepare("SELECT id, name, unit, quantity FROM inventory ORDER BY name ASC")?;
    let rows = stmt.query_map([], inventory_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

/// Atomic in-database increment; never read-then-write from the caller.
pub fn adjust_inventory(conn: &Connection, id: &str, delta: i64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE inventory SET quantity = quantity + ?1 WHERE id = ?2",
        params![delta, id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound("inventory item"));
    }
    Ok(())
}

fn inventory_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem {
        id: row.get(0)?,
        name: row.get(1)?,
        unit: row.get(2)?,
        quantity: row.get(3)?,
    })
}

// ---------------------------------------------------------------------------
// Aggregates (dashboard projections; empty ranges yield empty/zero results)
// ---------------------------------------------------------------------------

fn cutoff_for_days(last_n_days: Option<u32>) -> Option<String> {
    last_n_days.map(|n| {
        (chrono::Utc::now() - chrono::Duration::days(i64::from(n)))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    })
}

pub fn revenue_by_day(conn: &Connection, last_n_days: u32) -> Result<Vec<DailyRevenue>> {
    let cutoff = cutoff_for_days(Some(last_n_days)).unwrap_or_default();
    let mut stmt = conn.prepare(
        "SELECT substr(created_at, 1, 10) AS day, SUM(total_cents)
         FROM orders WHERE created_at >= ?1
         GROUP BY day ORDER BY day DESC",
    )?;
    let rows = stmt.query_map(params![cutoff], |row| {
        Ok(DailyRevenue {
            day: row.get(0)?,
            total_cents: row.get(1)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

pub fn top_services_by_revenue(
    conn: &Connection,
    limit: u32,
    last_n_days: Option<u32>,
) -> Result<Vec<ServiceRevenue>> {
    services_by_revenue(conn, limit, last_n_days, "DESC")
}

pub fn bottom_services_by_revenue(
    conn: &Connection,
    limit: u32,
    last_n_days: Option<u32>,
) -> Result<Vec<ServiceRevenue>> {
    services_by_revenue(conn, limit, last_n_days, "ASC")
}

fn services_by_revenue(
    conn: &Connection,
    limit: u32,
    last_n_days: Option<u32>,
    direction: &str,
) -> Result<Vec<ServiceRevenue>> {
    let cutoff = cutoff_for_days(last_n_days).unwrap_or_default();
    let sql = format!(
        "SELECT i.service_name,
                SUM(i.unit_price_cents * i.quantity) AS revenue,
                SUM(i.quantity)
         FROM order_items i JOIN orders o ON o.id = i.order_id
         WHERE o.created_at >= ?1
         GROUP BY i.service_name
         ORDER BY revenue {direction}
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![cutoff, limit], |row| {
        Ok(ServiceRevenue {
            service_name: row.get(0)?,
            revenue_cents: row.get(1)?,
            quantity: row.get(2)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
}

pub fn summary_since(conn: &Connection, last_n_days: u32) -> Result<ActivitySummary> {
    let cutoff = cutoff_for_days(Some(last_n_days)).unwrap_or_default();
    let (orders, revenue_cents) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(total_cents), 0) FROM orders WHERE created_at >= ?1",
        params![cutoff],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let received_cents = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM payments WHERE created_at >= ?1",
        params![cutoff],
        |row| row.get(0),
    )?;
    Ok(ActivitySummary {
        orders,
        revenue_cents,
        received_cents,
    })
}

// ---------------------------------------------------------------------------
// Id reconciliation
// ---------------------------------------------------------------------------

/// Replace a locally synthesized id with the remote-assigned one after the
/// entity's upsert has been applied. Child rows follow via ON UPDATE
/// CASCADE; queued outbox payloads are rewritten separately
/// (`outbox::rewrite_id`).
pub fn reconcile_entity_id(
    conn: &Connection,
    kind: EntityKind,
    local_id: &str,
    remote_id: &str,
) -> Result<()> {
    let table = match kind {
        EntityKind::Service => "services",
        EntityKind::Client => "clients",
        EntityKind::Order => "orders",
        EntityKind::Inventory => "inventory",
    };
    conn.execute(
        &format!("UPDATE {table} SET id = ?1 WHERE id = ?2"),
        params![remote_id, local_id],
    )?;
    Ok(())
}

#[cfg(test)]
pub fn run_migrations_for_test(conn: &Connection) {
    run_migrations(conn).expect("run_migrations should succeed in test");
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    /// Open an in-memory database and apply pragmas (mirrors open_and_configure).
    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .expect("pragma setup");
        run_migrations_for_test(&conn);
        conn
    }

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("prepare table list");
        stmt.query_map([], |row| row.get(0))
            .expect("query tables")
            .filter_map(|r| r.ok())
            .collect()
    }

    fn sample_client(conn: &Connection, id: &str, name: &str) -> Client {
        let client = Client {
            id: id.to_string(),
            name: name.to_string(),
            phone: Some("555-0101".into()),
            notes: None,
        };
        upsert_client(conn, &client).expect("upsert client");
        client
    }

    fn sample_order(conn: &Connection, id: &str, client_id: &str, created_at: &str) -> Order {
        let order = Order {
            id: id.to_string(),
            client_id: client_id.to_string(),
            created_at: created_at.to_string(),
            status: OrderStatus::Open,
            total_cents: 7000,
            due_date: None,
            delivered_at: None,
            order_code: format!("WS-260828-{id}"),
            items: vec![
                OrderItem {
                    service_name: "Hem".into(),
                    service_type: "hem".into(),
                    service_subtype: None,
                    unit_price_cents: 2500,
                    quantity: 1,
                },
                OrderItem {
                    service_name: "Zipper replacement".into(),
                    service_type: "zipper_replacement".into(),
                    service_subtype: None,
                    unit_price_cents: 4500,
                    quantity: 1,
                },
            ],
        };
        insert_order(conn, &order).expect("insert order");
        order
    }

    #[test]
    fn test_migrations_create_all_tables() {
        let conn = test_conn();
        let tables = table_names(&conn);
        for expected in [
            "services",
            "clients",
            "orders",
            "order_items",
            "sync_queue",
            "payments",
            "inventory",
            "schema_version",
        ] {
            assert!(
                tables.contains(&expected.to_string()),
                "missing table {expected}"
            );
        }
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = test_conn();
        run_migrations(&conn).expect("second run should be a no-op");
        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, CURRENT_SCHEMA_VERSION as i64);
    }

    #[test]
    fn test_upsert_client_overwrites_by_id() {
        let conn = test_conn();
        sample_client(&conn, "c1", "Ana");
        let updated = Client {
            id: "c1".into(),
            name: "Ana Maria".into(),
            phone: None,
            notes: Some("prefers pickup".into()),
        };
        upsert_client(&conn, &updated).unwrap();

        let got = get_client(&conn, "c1").unwrap().expect("client exists");
        assert_eq!(got.name, "Ana Maria");
        assert_eq!(got.phone, None);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM clients", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_list_clients_orders_by_name() {
        let conn = test_conn();
        sample_client(&conn, "c1", "Zelia");
        sample_client(&conn, "c2", "Ana");
        sample_client(&conn, "c3", "Marta");

        let names: Vec<String> = list_clients(&conn)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Ana", "Marta", "Zelia"]);
    }

    #[test]
    fn test_search_clients_matches_name_or_phone() {
        let conn = test_conn();
        sample_client(&conn, "c1", "Ana");
        let other = Client {
            id: "c2".into(),
            name: "Bruno".into(),
            phone: Some("777-1234".into()),
            notes: None,
        };
        upsert_client(&conn, &other).unwrap();

        let by_name = search_clients(&conn, "an").unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "Ana");

        let by_phone = search_clients(&conn, "777").unwrap();
        assert_eq!(by_phone.len(), 1);
        assert_eq!(by_phone[0].name, "Bruno");
    }

    #[test]
    fn test_order_round_trip_with_items() {
        let conn = test_conn();
        sample_client(&conn, "c1", "Ana");
        sample_order(&conn, "local:order:abc", "c1", "2026-08-28T10:00:00Z");

        let got = get_order_with_items(&conn, "local:order:abc")
            .unwrap()
            .expect("order exists");
        assert_eq!(got.items.len(), 2);
        assert_eq!(got.items[0].service_name, "Hem");
        assert_eq!(got.total_cents, 7000);
        assert_eq!(got.status, OrderStatus::Open);
    }

    #[test]
    fn test_list_orders_newest_first_with_filters() {
        let conn = test_conn();
        sample_client(&conn, "c1", "Ana");
        sample_order(&conn, "o1", "c1", "2026-08-27T10:00:00Z");
        sample_order(&conn, "o2", "c1", "2026-08-28T10:00:00Z");
        update_order_status(&conn, "o1", OrderStatus::Ready, None).unwrap();

        let all = list_orders(&conn, &OrderFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "o2", "newest creation time first");

        let ready = list_orders(
            &conn,
            &OrderFilter {
                status: Some(OrderStatus::Ready),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, "o1");

        let by_code = list_orders(
            &conn,
            &OrderFilter {
                order_code_query: Some("260828-o2".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_code.len(), 1);
        assert_eq!(by_code[0].id, "o2");
    }

    #[test]
    fn test_update_status_of_missing_order_is_not_found() {
        let conn = test_conn();
        let err = update_order_status(&conn, "ghost", OrderStatus::Ready, None).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_delete_order_cascades_to_items_and_payments() {
        let conn = test_conn();
        sample_client(&conn, "c1", "Ana");
        sample_order(&conn, "o1", "c1", "2026-08-28T10:00:00Z");
        insert_payment(&conn, "o1", 2000, Some("cash"), None, "2026-08-28T11:00:00Z").unwrap();

        delete_order(&conn, "o1").unwrap();

        let items: i64 = conn
            .query_row("SELECT COUNT(*) FROM order_items", [], |r| r.get(0))
            .unwrap();
        let payments: i64 = conn
            .query_row("SELECT COUNT(*) FROM payments", [], |r| r.get(0))
            .unwrap();
        assert_eq!(items, 0);
        assert_eq!(payments, 0);
    }

    #[test]
    fn test_adjust_inventory_is_in_database_increment() {
        let conn = test_conn();
        upsert_inventory_item(
            &conn,
            &InventoryItem {
                id: "zipper".into(),
                name: "Standard zipper".into(),
                unit: "pc".into(),
                quantity: 10,
            },
        )
        .unwrap();

        adjust_inventory(&conn, "zipper", -3).unwrap();
        adjust_inventory(&conn, "zipper", -3).unwrap();

        let item = get_inventory_item(&conn, "zipper").unwrap().unwrap();
        assert_eq!(item.quantity, 4);

        // No floor at the data layer.
        adjust_inventory(&conn, "zipper", -10).unwrap();
        let item = get_inventory_item(&conn, "zipper").unwrap().unwrap();
        assert_eq!(item.quantity, -6);
    }

    #[test]
    fn test_adjust_missing_inventory_item_is_not_found() {
        let conn = test_conn();
        let err = adjust_inventory(&conn, "ghost", 1).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_cash_sum_for_date_bounds_and_empty() {
        let conn = test_conn();
        sample_client(&conn, "c1", "Ana");
        sample_order(&conn, "o1", "c1", "2026-08-28T10:00:00Z");
        insert_payment(&conn, "o1", 3000, Some("cash"), None, "2026-08-28T11:00:00Z").unwrap();
        insert_payment(&conn, "o1", 1500, Some("card"), None, "2026-08-28T18:00:00Z").unwrap();
        insert_payment(&conn, "o1", 9999, None, None, "2026-08-27T09:00:00Z").unwrap();

        assert_eq!(cash_sum_for_date(&conn, "2026-08-28").unwrap(), 4500);
        assert_eq!(cash_sum_for_date(&conn, "2026-08-27").unwrap(), 9999);
        assert_eq!(cash_sum_for_date(&conn, "1999-01-01").unwrap(), 0);
    }

    #[test]
    fn test_aggregates_tolerate_empty_ranges() {
        let conn = test_conn();
        assert!(revenue_by_day(&conn, 30).unwrap().is_empty());
        assert!(top_services_by_revenue(&conn, 10, Some(30))
            .unwrap()
            .is_empty());
        let summary = summary_since(&conn, 30).unwrap();
        assert_eq!(summary.orders, 0);
        assert_eq!(summary.revenue_cents, 0);
        assert_eq!(summary.received_cents, 0);
    }

    #[test]
    fn test_service_revenue_rankings() {
        let conn = test_conn();
        sample_client(&conn, "c1", "Ana");
        let now = chrono::Utc::now().to_rfc3339();
        sample_order(&conn, "o1", "c1", &now);
        sample_order(&conn, "o2", "c1", &now);

        let top = top_services_by_revenue(&conn, 10, Some(7)).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].service_name, "Zipper replacement");
        assert_eq!(top[0].revenue_cents, 9000);
        assert_eq!(top[0].quantity, 2);

        let bottom = bottom_services_by_revenue(&conn, 10, Some(7)).unwrap();
        assert_eq!(bottom[0].service_name, "Hem");
    }

    #[test]
    fn test_reconcile_order_id_cascades_to_children() {
        let conn = test_conn();
        sample_client(&conn, "c1", "Ana");
        sample_order(&conn, "local:order:x", "c1", "2026-08-28T10:00:00Z");
        insert_payment(
            &conn,
            "local:order:x",
            1000,
            None,
            None,
            "2026-08-28T11:00:00Z",
        )
        .unwrap();

        reconcile_entity_id(&conn, EntityKind::Order, "local:order:x", "rm-42").unwrap();

        let order = get_order_with_items(&conn, "rm-42").unwrap().unwrap();
        assert_eq!(order.items.len(), 2);
        let payments = list_payments_for_order(&conn, "rm-42").unwrap();
        assert_eq!(payments.len(), 1);
        assert!(get_order_with_items(&conn, "local:order:x")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_reconcile_client_id_updates_order_references() {
        let conn = test_conn();
        sample_client(&conn, "local:client:y", "Ana");
        sample_order(&conn, "o1", "local:client:y", "2026-08-28T10:00:00Z");

        reconcile_entity_id(&conn, EntityKind::Client, "local:client:y", "rm-7").unwrap();

        let order = get_order_with_items(&conn, "o1").unwrap().unwrap();
        assert_eq!(order.client_id, "rm-7");
    }
}
