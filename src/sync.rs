//! Background synchronizer.
//!
//! A single worker thread ticks at a fixed interval, checks connectivity,
//! and drains the outbox: read a batch oldest-first, apply each entry
//! through the remote adapter, delete on success, keep on failure. A
//! failing entry never blocks the rest of its batch and is retried on the
//! next cycle; the worker never panics on a bad payload. Stopping is
//! cooperative with a bounded join so a stuck remote call cannot hang
//! shutdown.

use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::db::{self, DbState};
use crate::error::Result;
use crate::outbox;
use crate::remote::{self, Outcome, RemoteStore};

/// Cheap reachability probe: one short-lived TCP connect to a well-known
/// host. Any failure means "offline"; this never errors or panics.
pub fn is_online(probe_addr: SocketAddr, timeout: Duration) -> bool {
    TcpStream::connect_timeout(&probe_addr, timeout).is_ok()
}

/// Drain up to `limit` outbox entries once, synchronously. Returns how many
/// were applied. The connection lock is released around every remote call.
pub fn run_cycle(db: &DbState, remote: &dyn RemoteStore, limit: usize) -> Result<usize> {
    let mut batch = {
        let conn = db.lock()?;
        outbox::read_batch(&conn, limit)?
    };
    if batch.is_empty() {
        return Ok(0);
    }

    let mut applied = 0;
    for i in 0..batch.len() {
        let entry = batch[i].clone();
        let outcome = match entry.mutation() {
            Ok(mutation) => remote::apply(remote, &mutation),
            Err(e) => {
                // Undecodable rows are adapter failures: keep and retry.
                warn!(entry_id = entry.id, error = %e, "undecodable outbox payload");
                continue;
            }
        };

        match outcome {
            Ok(outcome) => {
                let mut conn = db.lock()?;
                let tx = conn.transaction()?;
                if let Outcome::Created {
                    kind,
                    local_id,
                    remote_id,
                } = &outcome
                {
                    // The remote assigned an id: swap it into the entity
                    // tables and every queued payload before the entry is
                    // retired, all in one commit.
                    db::reconcile_entity_id(&tx, *kind, local_id, remote_id)?;
                    outbox::rewrite_id(&tx, local_id, remote_id)?;
                    // The rest of this batch was read before the rewrite;
                    // the in-memory copies need the new id too.
                    let from = format!("\"{local_id}\"");
                    let to = format!("\"{remote_id}\"");
                    for later in batch.iter_mut().skip(i + 1) {
                        later.payload = later.payload.replace(&from, &to);
                    }
                    info!(
                        kind = kind.as_str(),
                        local_id = local_id.as_str(),
                        remote_id = remote_id.as_str(),
                        "reconciled local id"
                    );
                }
                outbox::delete(&tx, entry.id)?;
                tx.commit()?;
                applied += 1;
            }
            Err(e) => {
                debug!(
                    entry_id = entry.id,
                    kind = %entry.kind,
                    action = %entry.action,
                    error = %e,
                    "remote apply failed; entry stays queued"
                );
            }
        }
    }
    Ok(applied)
}

/// On-demand flush: one large draining cycle, run synchronously on the
/// caller's thread. Reports how many entries were applied.
pub fn flush_now(db: &DbState, remote: &dyn RemoteStore, config: &AppConfig) -> Result<usize> {
    let applied = run_cycle(db, remote, config.flush_batch_size)?;
    info!(applied, "manual flush complete");
    Ok(applied)
}

// ---------------------------------------------------------------------------
// Worker thread
// ---------------------------------------------------------------------------

/// Handle to the background sync loop. Dropping the handle closes the stop
/// channel, so the loop exits on its next tick; `stop` additionally waits
/// for that exit with a bounded timeout.
pub struct SyncWorker {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    stop_timeout: Duration,
}

impl SyncWorker {
    /// Spawn the worker. Each tick: skip the cycle entirely when offline
    /// (draining would only burn the batch read), otherwise drain one small
    /// batch. Per-entry failures are retried forever on later ticks.
    pub fn start(
        db: Arc<DbState>,
        remote: Arc<dyn RemoteStore>,
        config: Arc<AppConfig>,
    ) -> std::io::Result<SyncWorker> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let stop_timeout = config.stop_timeout;

        let handle = std::thread::Builder::new()
            .name("sync-worker".to_string())
            .spawn(move || {
                info!(interval = ?config.sync_interval, "sync worker started");
                loop {
                    // The stop channel doubles as the timer: a message (or a
                    // dropped sender) ends the loop, a timeout starts a cycle.
                    match stop_rx.recv_timeout(config.sync_interval) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }

                    if !is_online(config.probe_addr, config.probe_timeout) {
                        debug!("offline; keeping queue pending");
                        continue;
                    }

                    match run_cycle(&db, remote.as_ref(), config.sync_batch_size) {
                        Ok(applied) if applied > 0 => {
                            info!(applied, "sync cycle complete");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "sync cycle failed"),
                    }
                }
                info!("sync worker stopped");
                let _ = done_tx.send(());
            })?;

        Ok(SyncWorker {
            stop_tx,
            done_rx,
            handle: Some(handle),
            stop_timeout,
        })
    }

    /// Request a cooperative stop and wait, bounded. The worker finishes
    /// any in-flight batch; if it does not exit within the timeout (a stuck
    /// remote call), the thread is left to finish detached.
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        match self.done_rx.recv_timeout(self.stop_timeout) {
            Ok(()) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
            }
            Err(_) => {
                warn!(
                    timeout = ?self.stop_timeout,
                    "sync worker did not stop in time; detaching"
                );
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
