//! Sync coordinator
//!
//! Reconciles the local cache, the remote store and realtime push into the
//! view model:
//!
//! 1. **Boot**: hydrate from the remote store, decide connectivity, open
//!    realtime subscriptions when connected
//! 2. **Inbound**: realtime events from every subscription are funnelled
//!    into one channel and applied by the session in arrival order
//! 3. **Outbound**: mutations enqueue pushes on the [`Outbox`]
//! 4. **Teardown**: subscriptions are released explicitly
//!
//! Fetch, subscribe and push failures never escape the coordinator; they
//! degrade the session flags or are logged. Push-all and teacher save are
//! the exceptions and report to the caller.

pub mod hydrate;
pub mod merge;
pub mod outbox;

pub use hydrate::{hydrate, FetchOutcome, HydrationReport};
pub use merge::{merge_change, merge_teacher, InsertAt};
pub use outbox::{Outbox, OutboxStats};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{PortalError, PortalResult};
use crate::models::{Collection, CustomSection, QuickLink, Student, TeacherProfile};
use crate::remote::{
    decode_change, ChangeEvent, ChangeKind, EventFilter, Record, RemoteError, RemoteStore,
    Subscription, SubscriptionId, Table,
};
use crate::store::PortalStore;

/// Collections that receive realtime updates, with the events wanted
///
/// Sections are only refreshed at boot.
pub const REALTIME_FEEDS: [(Collection, EventFilter); 3] = [
    (Collection::Students, EventFilter::All),
    (Collection::TeacherProfile, EventFilter::Only(ChangeKind::Update)),
    (Collection::Links, EventFilter::All),
];

/// A realtime event tagged with its collection
#[derive(Debug, Clone)]
pub struct Inbound {
    pub collection: Collection,
    pub event: ChangeEvent,
}

/// What one realtime event did to the view model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedChange {
    pub collection: Collection,
    pub kind: ChangeKind,
    /// False when the event matched the committed state already
    pub changed: bool,
}

struct ActiveSubscription {
    id: SubscriptionId,
    collection: Collection,
    forwarder: JoinHandle<()>,
}

/// Owns the remote handle, the outbox and the realtime subscriptions
pub struct SyncCoordinator {
    remote: Option<Arc<dyn RemoteStore>>,
    trust_empty_remote: bool,
    outbox: Option<Outbox>,
    subscriptions: Vec<ActiveSubscription>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    report: Option<HydrationReport>,
}

impl SyncCoordinator {
    pub fn new(remote: Option<Arc<dyn RemoteStore>>, trust_empty_remote: bool) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            remote,
            trust_empty_remote,
            outbox: None,
            subscriptions: Vec::new(),
            inbound_tx,
            inbound_rx,
            report: None,
        }
    }

    #[cfg(test)]
    fn local_only() -> Self {
        Self::new(None, false)
    }

    /// Outcome of the last boot's hydration, if a remote was tried
    pub fn hydration_report(&self) -> Option<&HydrationReport> {
        self.report.as_ref()
    }

    pub fn outbox_stats(&self) -> Option<OutboxStats> {
        self.outbox.as_ref().map(Outbox::stats)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Run the boot sequence
    ///
    /// Returns whether the session is connected to the remote store.
    pub async fn boot(&mut self, store: &mut PortalStore) -> bool {
        if !self.subscriptions.is_empty() {
            self.teardown().await;
        }
        store.flags_mut().is_syncing = true;

        let connected = match self.remote.clone() {
            Some(remote) => {
                let report = hydrate(Arc::clone(&remote), store, self.trust_empty_remote).await;
                let connected = report.connected();
                self.report = Some(report);
                if connected {
                    if self.outbox.is_none() {
                        self.outbox = Some(Outbox::spawn(Arc::clone(&remote)));
                    }
                    self.open_subscriptions(remote.as_ref()).await;
                } else {
                    warn!("Remote store unreachable, running local-only");
                }
                connected
            }
            None => {
                info!("Remote store disabled, running local-only");
                false
            }
        };

        store.flags_mut().is_db_connected = connected;
        store.flags_mut().is_syncing = false;
        connected
    }

    async fn open_subscriptions(&mut self, remote: &dyn RemoteStore) {
        for (collection, filter) in REALTIME_FEEDS {
            match remote.subscribe(collection, filter).await {
                Ok(subscription) => {
                    let id = subscription.id;
                    let forwarder = tokio::spawn(forward(subscription, self.inbound_tx.clone()));
                    self.subscriptions.push(ActiveSubscription {
                        id,
                        collection,
                        forwarder,
                    });
                }
                Err(e) => warn!("Realtime updates for {} unavailable: {}", collection, e),
            }
        }
        info!("Listening for realtime changes on {} collections", self.subscriptions.len());
    }

    /// Release every realtime subscription
    pub async fn teardown(&mut self) {
        let subscriptions = std::mem::take(&mut self.subscriptions);
        if subscriptions.is_empty() {
            return;
        }
        let Some(remote) = self.remote.clone() else {
            return;
        };

        let count = subscriptions.len();
        for sub in subscriptions {
            sub.forwarder.abort();
            if let Err(e) = remote.unsubscribe(sub.id).await {
                warn!("Failed to release {} subscription: {}", sub.collection, e);
            }
        }
        info!("Released {} realtime subscriptions", count);
    }

    // ==================== Outbound ====================

    /// Queue a push of a whole collection; skipped while disconnected
    pub fn push<T: Record>(&self, records: &[T]) {
        match &self.outbox {
            Some(outbox) => outbox.enqueue_upsert(records),
            None => debug!("Offline, not pushing {}", T::COLLECTION),
        }
    }

    /// Queue removal of one record; skipped while disconnected
    pub fn push_delete(&self, collection: Collection, id: &str) {
        match &self.outbox {
            Some(outbox) => outbox.enqueue_delete(collection, vec![id.to_string()]),
            None => debug!("Offline, not deleting {} from {}", id, collection),
        }
    }

    /// Wait for queued pushes to finish
    pub async fn flush(&self) {
        if let Some(outbox) = &self.outbox {
            outbox.flush().await;
        }
    }

    /// Upsert all four collections and report which ones failed
    pub async fn push_all(&self, store: &PortalStore) -> PortalResult<()> {
        let remote = self.remote.clone().ok_or(PortalError::Offline)?;
        // Earlier best-effort pushes must not land after this one
        self.flush().await;

        let results: [(Collection, Result<(), RemoteError>); 4] = [
            (
                Collection::TeacherProfile,
                Table::<TeacherProfile>::new(Arc::clone(&remote))
                    .upsert(std::slice::from_ref(store.teacher()))
                    .await,
            ),
            (
                Collection::Students,
                Table::<Student>::new(Arc::clone(&remote))
                    .upsert(store.students())
                    .await,
            ),
            (
                Collection::Links,
                Table::<QuickLink>::new(Arc::clone(&remote))
                    .upsert(store.links())
                    .await,
            ),
            (
                Collection::Sections,
                Table::<CustomSection>::new(remote)
                    .upsert(store.sections())
                    .await,
            ),
        ];

        let mut failed = Vec::new();
        for (collection, result) in results {
            if let Err(e) = result {
                warn!("Push-all: {} failed: {}", collection, e);
                failed.push(collection);
            }
        }
        if failed.is_empty() {
            info!("Pushed all collections");
            Ok(())
        } else {
            Err(PortalError::BulkPush { failed })
        }
    }

    /// Upsert the teacher profile and wait for the result
    pub async fn save_teacher(&self, teacher: &TeacherProfile) -> PortalResult<()> {
        let remote = self.remote.clone().ok_or(PortalError::Offline)?;
        Table::<TeacherProfile>::new(remote)
            .upsert(std::slice::from_ref(teacher))
            .await?;
        info!("Teacher profile saved to remote store");
        Ok(())
    }

    // ==================== Inbound ====================

    /// Apply every realtime event that has already arrived
    pub fn drain(&mut self, store: &mut PortalStore) -> Vec<AppliedChange> {
        let mut applied = Vec::new();
        while let Ok(inbound) = self.inbound_rx.try_recv() {
            applied.extend(apply_inbound(store, inbound));
        }
        applied
    }

    /// Wait for the next realtime event and apply it
    ///
    /// Undecodable events are dropped and waiting continues.
    pub async fn next_change(&mut self, store: &mut PortalStore) -> Option<AppliedChange> {
        loop {
            let inbound = self.inbound_rx.recv().await?;
            if let Some(applied) = apply_inbound(store, inbound) {
                return Some(applied);
            }
        }
    }
}

async fn forward(subscription: Subscription, inbound_tx: mpsc::UnboundedSender<Inbound>) {
    let Subscription {
        collection,
        mut events,
        ..
    } = subscription;
    while let Some(event) = events.recv().await {
        if inbound_tx.send(Inbound { collection, event }).is_err() {
            break;
        }
    }
    debug!("Realtime feed for {} ended", collection);
}

/// Decode and merge one realtime event into the view model
///
/// Returns `None` when the payload could not be decoded.
pub fn apply_inbound(store: &mut PortalStore, inbound: Inbound) -> Option<AppliedChange> {
    let Inbound { collection, event } = inbound;
    let kind = event.kind;

    let result = match collection {
        Collection::TeacherProfile => decode_change::<TeacherProfile>(event).map(|change| {
            match merge_teacher(store.teacher(), change) {
                Some(profile) => {
                    store.set_teacher(profile);
                    true
                }
                None => false,
            }
        }),
        Collection::Students => decode_change::<Student>(event).map(|change| {
            match merge_change(store.students(), change) {
                Some(students) => {
                    store.set_students(students);
                    true
                }
                None => false,
            }
        }),
        Collection::Links => decode_change::<QuickLink>(event).map(|change| {
            match merge_change(store.links(), change) {
                Some(links) => {
                    store.set_links(links);
                    true
                }
                None => false,
            }
        }),
        Collection::Sections => decode_change::<CustomSection>(event).map(|change| {
            match merge_change(store.sections(), change) {
                Some(sections) => {
                    store.set_sections(sections);
                    true
                }
                None => false,
            }
        }),
    };

    match result {
        Ok(changed) => {
            debug!("Realtime {} on {} (changed={})", kind.as_str(), collection, changed);
            Some(AppliedChange {
                collection,
                kind,
                changed,
            })
        }
        Err(e) => {
            warn!("Dropping realtime {} event: {}", kind.as_str(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::MemoryStore;
    use crate::remote::MemoryRemote;
    use serde_json::json;

    fn store() -> PortalStore {
        PortalStore::load(Box::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_boot_without_remote() {
        let mut store = store();
        let mut sync = SyncCoordinator::local_only();

        assert!(!sync.boot(&mut store).await);
        assert!(!store.flags().is_db_connected);
        assert!(!store.flags().is_syncing);
        assert!(sync.hydration_report().is_none());
    }

    #[tokio::test]
    async fn test_boot_subscribes_when_connected() {
        let remote = MemoryRemote::new();
        let mut store = store();
        let mut sync = SyncCoordinator::new(Some(Arc::new(remote.clone())), false);

        assert!(sync.boot(&mut store).await);
        assert!(store.flags().is_db_connected);
        assert_eq!(sync.subscription_count(), 3);
        assert_eq!(remote.subscriber_count(), 3);

        sync.teardown().await;
        assert_eq!(sync.subscription_count(), 0);
        assert_eq!(remote.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_realtime_events_reach_store() {
        let remote = MemoryRemote::new();
        let mut store = store();
        let mut sync = SyncCoordinator::new(Some(Arc::new(remote.clone())), false);
        sync.boot(&mut store).await;

        remote.emit(Collection::Students, ChangeEvent::delete("2"));
        let applied = sync.next_change(&mut store).await.unwrap();

        assert_eq!(applied.kind, ChangeKind::Delete);
        assert!(applied.changed);
        assert!(store.student("2").is_none());
    }

    #[tokio::test]
    async fn test_teacher_feed_only_takes_updates() {
        let remote = MemoryRemote::new();
        let mut store = store();
        let mut sync = SyncCoordinator::new(Some(Arc::new(remote.clone())), false);
        sync.boot(&mut store).await;

        let mut row = crate::seed::teacher().to_row().unwrap();
        row["tagline"] = json!("New tagline");
        remote.emit(Collection::TeacherProfile, ChangeEvent::insert(row.clone()));
        remote.emit(Collection::TeacherProfile, ChangeEvent::update(row));
        tokio::task::yield_now().await;

        let applied = sync.next_change(&mut store).await.unwrap();
        assert_eq!(applied.kind, ChangeKind::Update);
        assert_eq!(store.teacher().tagline, "New tagline");
    }

    #[test]
    fn test_undecodable_event_is_dropped() {
        let mut store = store();
        let inbound = Inbound {
            collection: Collection::Links,
            event: ChangeEvent::insert(json!({ "id": "5" })),
        };
        assert!(apply_inbound(&mut store, inbound).is_none());
        assert_eq!(store.links().len(), 3);
    }

    #[tokio::test]
    async fn test_push_skipped_while_offline() {
        let remote = MemoryRemote::unreachable();
        let mut store = store();
        let mut sync = SyncCoordinator::new(Some(Arc::new(remote.clone())), false);
        sync.boot(&mut store).await;

        sync.push(store.links());
        sync.flush().await;
        assert!(sync.outbox_stats().is_none());
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_push_all_reports_failures() {
        let remote = MemoryRemote::new();
        let mut store = store();
        let mut sync = SyncCoordinator::new(Some(Arc::new(remote.clone())), false);
        sync.boot(&mut store).await;

        sync.push_all(&store).await.unwrap();
        assert_eq!(remote.rows(Collection::Students).len(), 4);
        assert_eq!(remote.rows(Collection::TeacherProfile)[0]["id"], "main");

        remote.set_reject_writes(true);
        match sync.push_all(&store).await {
            Err(PortalError::BulkPush { failed }) => assert_eq!(failed.len(), 4),
            other => panic!("expected bulk push failure, got {:?}", other),
        }
    }
}
