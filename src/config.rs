//! Process-wide configuration, built once at startup and passed by reference
//! to the repository, the sync worker, and the remote adapter. There is no
//! ambient global state; hosts construct an [`AppConfig`], adjust fields, and
//! share it behind an `Arc`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Location of the SQLite file. Parent directories are created on init.
    pub db_path: PathBuf,

    /// Short prefix for human-readable order codes (`{prefix}-{yymmdd}-{rand}`).
    pub order_code_prefix: String,

    /// Fixed tick of the background sync loop.
    pub sync_interval: Duration,

    /// Entries drained per periodic cycle.
    pub sync_batch_size: usize,

    /// Entries drained by an on-demand flush.
    pub flush_batch_size: usize,

    /// Host probed to decide whether a remote path is reachable.
    pub probe_addr: SocketAddr,

    /// Budget for one connectivity probe.
    pub probe_timeout: Duration,

    /// Per-request budget for remote document-store calls.
    pub remote_timeout: Duration,

    /// How long `SyncWorker::stop` waits for the loop to exit.
    pub stop_timeout: Duration,

    /// Stock consumption rules: ordering a service of the key type decrements
    /// the named inventory item by the ordered quantity (best effort).
    pub stock_rules: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from("atelier.db"),
            order_code_prefix: "WS".to_string(),
            sync_interval: Duration::from_secs(5),
            sync_batch_size: 50,
            flush_batch_size: 500,
            // DNS port of a well-known public resolver; any TCP connect
            // success counts as "online".
            probe_addr: SocketAddr::from(([8, 8, 8, 8], 53)),
            probe_timeout: Duration::from_secs(2),
            remote_timeout: Duration::from_secs(10),
            stop_timeout: Duration::from_secs(3),
            stock_rules: HashMap::new(),
        }
    }
}
