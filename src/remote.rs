//! Remote document-store adapter.
//!
//! The remote side is a black box behind [`RemoteStore`]: create a document
//! (remote assigns the id), set a document with merge semantics, or patch a
//! handful of fields. [`apply`] translates one typed outbox mutation into
//! those calls. Every failure is a retry signal for the sync worker, never a
//! reason to drop the entry.

use reqwest::blocking::Client as HttpClient;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::is_local_id;
use crate::outbox::{EntityKind, Mutation};

#[derive(Debug, Error)]
#[error("{0}")]
pub struct RemoteError(pub String);

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            RemoteError("remote unreachable".to_string())
        } else if err.is_timeout() {
            RemoteError("remote call timed out".to_string())
        } else {
            RemoteError(format!("remote call failed: {err}"))
        }
    }
}

/// The full remote surface the core consumes.
pub trait RemoteStore: Send + Sync {
    /// Create a new document; the remote assigns and returns its id.
    fn create_document(&self, collection: &str, body: &Value) -> Result<String, RemoteError>;

    /// Merge write: update the supplied fields of the addressed document,
    /// leaving other fields untouched.
    fn set_document(&self, collection: &str, id: &str, body: &Value) -> Result<(), RemoteError>;

    /// Patch only the named fields.
    fn update_fields(&self, collection: &str, id: &str, fields: &Value)
        -> Result<(), RemoteError>;
}

/// What a successful application did, so the sync worker knows when a
/// locally generated id was replaced by a remote-assigned one.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied,
    Created {
        kind: EntityKind,
        local_id: String,
        remote_id: String,
    },
}

/// Apply one mutation against the remote store.
///
/// Upsert-style mutations whose id still carries the local marker create a
/// new remote document — the local id is a synthetic key, never a valid
/// remote address. Partial updates addressed at an unreconciled local id
/// fail and stay queued; FIFO draining guarantees the preceding upsert runs
/// first and rewrites the queued payloads.
pub fn apply(remote: &dyn RemoteStore, mutation: &Mutation) -> Result<Outcome, RemoteError> {
    match mutation {
        Mutation::ServiceUpsert(service) => {
            let body = doc_body(mutation)?;
            upsert_document(remote, EntityKind::Service, &service.id, &body)
        }
        Mutation::ClientUpsert(client) => {
            let body = doc_body(mutation)?;
            upsert_document(remote, EntityKind::Client, &client.id, &body)
        }
        Mutation::OrderUpsert(order) => {
            let body = doc_body(mutation)?;
            upsert_document(remote, EntityKind::Order, &order.id, &body)
        }
        Mutation::InventoryUpsert(item) => {
            let body = doc_body(mutation)?;
            upsert_document(remote, EntityKind::Inventory, &item.id, &body)
        }
        Mutation::ServicePriceUpdate(update) => patch(
            remote,
            EntityKind::Service,
            &update.id,
            json!({ "price_cents": update.price_cents }),
        ),
        Mutation::ServiceSetActive(update) => patch(
            remote,
            EntityKind::Service,
            &update.id,
            json!({ "active": update.active }),
        ),
        Mutation::OrderStatusUpdate(update) => patch(
            remote,
            EntityKind::Order,
            &update.id,
            json!({
                "status": update.status,
                "delivered_at": update.delivered_at,
            }),
        ),
        Mutation::InventoryAdjust(adjustment) => patch(
            remote,
            EntityKind::Inventory,
            &adjustment.id,
            json!({ "quantity": adjustment.quantity }),
        ),
    }
}

/// Serialize the mutation payload minus the `id` field, which addresses the
/// document rather than living inside it.
fn doc_body(mutation: &Mutation) -> Result<Value, RemoteError> {
    let mut body = mutation
        .payload()
        .map_err(|e| RemoteError(format!("unencodable payload: {e}")))?;
    if let Some(map) = body.as_object_mut() {
        map.remove("id");
    }
    Ok(body)
}

fn upsert_document(
    remote: &dyn RemoteStore,
    kind: EntityKind,
    id: &str,
    body: &Value,
) -> Result<Outcome, RemoteError> {
    if is_local_id(id) {
        let remote_id = remote.create_document(kind.collection(), body)?;
        debug!(
            collection = kind.collection(),
            local_id = id,
            remote_id,
            "created remote document"
        );
        Ok(Outcome::Created {
            kind,
            local_id: id.to_string(),
            remote_id,
        })
    } else {
        remote.set_document(kind.collection(), id, body)?;
        Ok(Outcome::Applied)
    }
}

fn patch(
    remote: &dyn RemoteStore,
    kind: EntityKind,
    id: &str,
    fields: Value,
) -> Result<Outcome, RemoteError> {
    if is_local_id(id) {
        return Err(RemoteError(format!(
            "cannot patch unreconciled local id {id}"
        )));
    }
    remote.update_fields(kind.collection(), id, &fields)?;
    Ok(Outcome::Applied)
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// `RemoteStore` over a REST document-store API:
/// `POST /{collection}` creates, `PUT /{collection}/{id}?merge=true` merges,
/// `PATCH /{collection}/{id}` patches fields. Calls run only on the sync
/// worker thread with a bounded per-request timeout.
pub struct HttpRemote {
    base_url: String,
    api_key: Option<String>,
    client: HttpClient,
}

impl HttpRemote {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<HttpRemote, RemoteError> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError(format!("failed to create HTTP client: {e}")))?;
        Ok(HttpRemote {
            base_url: normalize_base_url(base_url),
            api_key,
            client,
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &Value,
    ) -> Result<Value, RemoteError> {
        let url = format!("{}/{path}", self.base_url);
        let mut req = self.client.request(method, &url).json(body);
        if let Some(key) = &self.api_key {
            req = req.header("X-Api-Key", key);
        }
        let resp = req.send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RemoteError(status_error(status)));
        }
        // Tolerate empty bodies on write acknowledgements.
        Ok(resp.json::<Value>().unwrap_or(Value::Null))
    }
}

impl RemoteStore for HttpRemote {
    fn create_document(&self, collection: &str, body: &Value) -> Result<String, RemoteError> {
        let resp = self.request(reqwest::Method::POST, collection, body)?;
        resp.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RemoteError("create response carried no document id".to_string()))
    }

    fn set_document(&self, collection: &str, id: &str, body: &Value) -> Result<(), RemoteError> {
        self.request(
            reqwest::Method::PUT,
            &format!("{collection}/{id}?merge=true"),
            body,
        )?;
        Ok(())
    }

    fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: &Value,
    ) -> Result<(), RemoteError> {
        self.request(reqwest::Method::PATCH, &format!("{collection}/{id}"), fields)?;
        Ok(())
    }
}

/// Normalise the remote base URL: ensure a scheme, strip trailing slashes.
fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }
    while url.ends_with('/') {
        url.pop();
    }
    url
}

fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "API key is invalid or expired".to_string(),
        403 => "client not authorized".to_string(),
        404 => "remote document not found".to_string(),
        s if s >= 500 => format!("remote server error (HTTP {s})"),
        s => format!("unexpected remote response (HTTP {s})"),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
