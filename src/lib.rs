//! Atelier POS — offline-first persistence and synchronization engine for a
//! small workshop point of sale.
//!
//! The local SQLite database is the source of truth: every mutation commits
//! locally first and, in the same transaction, appends an entry to an
//! append-only outbox. A background worker drains the outbox oldest-first to
//! a remote document store whenever the network is reachable, reconciling
//! locally-generated ids with the ids the remote assigns. Reads never touch
//! the network.
//!
//! Typical wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//! use atelier_pos::{AppConfig, HttpRemote, Repository, SyncWorker};
//!
//! let config = Arc::new(AppConfig::default());
//! let db = Arc::new(atelier_pos::db::init(&config).unwrap());
//! let repo = Repository::new(db.clone(), config.clone());
//! let remote = Arc::new(HttpRemote::new(
//!     "https://store.example.com/api",
//!     Some("secret".to_string()),
//!     config.remote_timeout,
//! ).unwrap());
//! let worker = SyncWorker::start(db, remote, config).unwrap();
//! // ... use `repo` ...
//! worker.stop();
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod outbox;
pub mod remote;
pub mod repository;
pub mod sync;

pub use config::AppConfig;
pub use db::DbState;
pub use error::{Error, Result};
pub use models::{
    ActivitySummary, Client, DailyRevenue, InventoryItem, Order, OrderFilter, OrderItem,
    OrderStatus, OrderSummary, Payment, Service, ServiceRevenue,
};
pub use outbox::{EntityKind, Mutation, OutboxEntry};
pub use remote::{HttpRemote, Outcome, RemoteError, RemoteStore};
pub use repository::{Repository, ServiceSeed};
pub use sync::{flush_now, is_online, SyncWorker};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured console logging. Honors `RUST_LOG`; defaults to
/// `info` globally with `debug` for this crate. Call once at startup.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atelier_pos=debug"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}
