//! In-process remote store
//!
//! Behaves like the hosted store from the session's point of view: rows
//! keyed by `id`, students ordered newest first, and every accepted write
//! fanned out to open subscriptions. It can be switched unreachable to
//! exercise offline paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{
    ChangeEvent, ChangeKind, EventFilter, RemoteError, RemoteStore, Subscription, SubscriptionId,
};
use crate::models::Collection;

struct Subscriber {
    collection: Collection,
    filter: EventFilter,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

struct Inner {
    reachable: bool,
    reject_writes: bool,
    tables: HashMap<Collection, Vec<Value>>,
    subscribers: HashMap<SubscriptionId, Subscriber>,
    writes: usize,
}

/// Shared in-memory remote store
///
/// Clones share the same tables, so a test can keep one handle while the
/// session owns another.
#[derive(Clone)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                reachable: true,
                reject_writes: false,
                tables: HashMap::new(),
                subscribers: HashMap::new(),
                writes: 0,
            })),
        }
    }

    /// A store that fails every call as unreachable
    pub fn unreachable() -> Self {
        let remote = Self::new();
        remote.set_reachable(false);
        remote
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Make upserts and deletes fail with a server error
    pub fn set_reject_writes(&self, reject: bool) {
        self.lock().reject_writes = reject;
    }

    /// Replace a table's rows without notifying subscribers
    pub fn seed(&self, collection: Collection, rows: Vec<Value>) {
        self.lock().tables.insert(collection, rows);
    }

    /// Current rows of a table, in fetch order
    pub fn rows(&self, collection: Collection) -> Vec<Value> {
        self.lock()
            .tables
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of accepted upsert and delete calls
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Deliver an event to subscribers as if another client caused it
    ///
    /// The table itself is left untouched.
    pub fn emit(&self, collection: Collection, event: ChangeEvent) {
        let mut inner = self.lock();
        broadcast(&mut inner, collection, event);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test thread must not wedge every other handle
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_reachable(inner: &Inner) -> Result<(), RemoteError> {
        if inner.reachable {
            Ok(())
        } else {
            Err(RemoteError::Unreachable("memory remote is offline".into()))
        }
    }

    fn check_writable(inner: &Inner, collection: Collection) -> Result<(), RemoteError> {
        Self::check_reachable(inner)?;
        if inner.reject_writes {
            return Err(RemoteError::Status {
                collection,
                status: 500,
                body: "writes rejected".into(),
            });
        }
        Ok(())
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn broadcast(inner: &mut Inner, collection: Collection, event: ChangeEvent) {
    // Receivers that went away are pruned on the way
    inner.subscribers.retain(|_, sub| {
        if sub.collection != collection || !sub.filter.matches(event.kind) {
            return true;
        }
        sub.tx.send(event.clone()).is_ok()
    });
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch_all(&self, collection: Collection) -> Result<Vec<Value>, RemoteError> {
        let inner = self.lock();
        Self::check_reachable(&inner)?;
        Ok(inner.tables.get(&collection).cloned().unwrap_or_default())
    }

    async fn fetch_one(&self, collection: Collection) -> Result<Option<Value>, RemoteError> {
        let inner = self.lock();
        Self::check_reachable(&inner)?;
        Ok(inner
            .tables
            .get(&collection)
            .and_then(|rows| rows.first())
            .cloned())
    }

    async fn upsert(&self, collection: Collection, rows: Vec<Value>) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        Self::check_writable(&inner, collection)?;
        inner.writes += 1;

        let mut events = Vec::new();
        {
            let table = inner.tables.entry(collection).or_default();
            for row in rows {
                let Some(id) = row_id(&row).map(str::to_string) else {
                    return Err(RemoteError::Status {
                        collection,
                        status: 400,
                        body: "row without id".into(),
                    });
                };
                match table.iter().position(|r| row_id(r) == Some(id.as_str())) {
                    Some(index) if table[index] == row => {}
                    Some(index) => {
                        table[index] = row.clone();
                        events.push(ChangeEvent::update(row));
                    }
                    None => {
                        // Newest students come first, like `order=created_at.desc`
                        if collection == Collection::Students {
                            table.insert(0, row.clone());
                        } else {
                            table.push(row.clone());
                        }
                        events.push(ChangeEvent::insert(row));
                    }
                }
            }
        }

        for event in events {
            broadcast(&mut inner, collection, event);
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, ids: Vec<String>) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        Self::check_writable(&inner, collection)?;
        inner.writes += 1;

        let mut removed = Vec::new();
        if let Some(table) = inner.tables.get_mut(&collection) {
            table.retain(|row| match row_id(row) {
                Some(id) if ids.iter().any(|wanted| wanted == id) => {
                    removed.push(id.to_string());
                    false
                }
                _ => true,
            });
        }

        for id in removed {
            broadcast(&mut inner, collection, ChangeEvent::delete(&id));
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: Collection,
        filter: EventFilter,
    ) -> Result<Subscription, RemoteError> {
        let mut inner = self.lock();
        if !inner.reachable {
            return Err(RemoteError::Subscription {
                collection,
                reason: "memory remote is offline".into(),
            });
        }

        let id = SubscriptionId::new();
        let (tx, events) = mpsc::unbounded_channel();
        inner.subscribers.insert(
            id,
            Subscriber {
                collection,
                filter,
                tx,
            },
        );
        Ok(Subscription {
            id,
            collection,
            events,
        })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), RemoteError> {
        match self.lock().subscribers.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RemoteError::UnknownSubscription(id)),
        }
    }
}
