//! Remote store adapters
//!
//! A generic CRUD + realtime-subscribe capability per collection. The
//! [`RemoteStore`] trait works on raw JSON rows; [`Table`] layers typed
//! decoding on top so nothing untyped reaches the view model.
//!
//! ## Adapters
//!
//! - [`SupabaseRemote`]: PostgREST over HTTP, realtime over websocket
//! - [`MemoryRemote`]: in-process store with realtime fan-out

mod error;
mod memory;
mod realtime;
mod rest;
mod table;

pub use error::RemoteError;
pub use memory::MemoryRemote;
pub use rest::SupabaseRemote;
pub use table::{decode_change, Record, RecordChange, Table};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Config;
use crate::models::Collection;

/// Kind of row change delivered by a realtime subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Wire name (`INSERT`, `UPDATE`, `DELETE`)
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }

    /// Parse a wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// Which change kinds a subscription wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Only(ChangeKind),
}

impl EventFilter {
    pub fn matches(self, kind: ChangeKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(wanted) => wanted == kind,
        }
    }

    /// Wire form used by realtime joins (`*` or a kind name)
    pub fn as_str(self) -> &'static str {
        match self {
            EventFilter::All => "*",
            EventFilter::Only(kind) => kind.as_str(),
        }
    }
}

/// A raw change event as delivered by the remote store
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub new: Option<Value>,
    pub old: Option<Value>,
}

impl ChangeEvent {
    pub fn insert(row: Value) -> Self {
        Self {
            kind: ChangeKind::Insert,
            new: Some(row),
            old: None,
        }
    }

    pub fn update(row: Value) -> Self {
        Self {
            kind: ChangeKind::Update,
            new: Some(row),
            old: None,
        }
    }

    pub fn delete(id: &str) -> Self {
        Self {
            kind: ChangeKind::Delete,
            new: None,
            old: Some(serde_json::json!({ "id": id })),
        }
    }
}

/// Opaque handle of an open subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", &self.0.to_string()[..8])
    }
}

/// An open realtime subscription
///
/// Events arrive on `events` until the subscription is released with
/// [`RemoteStore::unsubscribe`] or the remote side goes away.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub collection: Collection,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

/// CRUD + realtime capability of the remote store
///
/// Rows are JSON objects keyed by `id`. Implementations must be safe to
/// share between the session and the outbound push worker.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch every row of a collection (students newest first)
    async fn fetch_all(&self, collection: Collection) -> Result<Vec<Value>, RemoteError>;

    /// Fetch the single row of a singleton collection
    async fn fetch_one(&self, collection: Collection) -> Result<Option<Value>, RemoteError>;

    /// Insert or replace rows by `id`
    async fn upsert(&self, collection: Collection, rows: Vec<Value>) -> Result<(), RemoteError>;

    /// Delete rows by `id`; unknown ids are ignored
    async fn delete(&self, collection: Collection, ids: Vec<String>) -> Result<(), RemoteError>;

    /// Open a realtime subscription on a collection
    async fn subscribe(
        &self,
        collection: Collection,
        filter: EventFilter,
    ) -> Result<Subscription, RemoteError>;

    /// Release a subscription
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), RemoteError>;
}

/// Build the remote store selected by the configuration
///
/// Returns `Ok(None)` when the remote store is disabled or has no URL.
pub fn open(config: &Config) -> Result<Option<Arc<dyn RemoteStore>>, RemoteError> {
    if !config.remote_ready() {
        return Ok(None);
    }
    let Some(url) = config.remote_url.as_deref() else {
        return Ok(None);
    };
    let key = config.remote_key.as_deref().unwrap_or_default();
    Ok(Some(Arc::new(SupabaseRemote::new(url, key)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches() {
        assert!(EventFilter::All.matches(ChangeKind::Delete));
        assert!(EventFilter::Only(ChangeKind::Update).matches(ChangeKind::Update));
        assert!(!EventFilter::Only(ChangeKind::Update).matches(ChangeKind::Insert));
        assert_eq!(EventFilter::All.as_str(), "*");
    }

    #[test]
    fn test_change_kind_wire_names() {
        for kind in [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete] {
            assert_eq!(ChangeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ChangeKind::parse("TRUNCATE"), None);
    }

    #[test]
    fn test_open_respects_remote_enabled() {
        let mut config = Config {
            remote_url: Some("https://abc.supabase.co".into()),
            ..Config::default()
        };
        assert!(open(&config).unwrap().is_none());

        config.remote_enabled = true;
        assert!(open(&config).unwrap().is_some());
    }

    #[test]
    fn test_subscription_ids_are_distinct() {
        let a = SubscriptionId::new();
        let b = SubscriptionId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("sub-"));
    }
}
