//! Scenario: realtime changes from other clients
//!
//! - UPDATE events are idempotent
//! - DELETE of an id that is not present changes nothing
//! - A client's own inserts echoed back never duplicate
//! - Applied events are written through to local storage

mod common;

use common::*;
use portal_core::local::MemoryStore;
use portal_core::models::{Collection, QuickLink, Student};
use portal_core::remote::{ChangeEvent, ChangeKind, MemoryRemote, Record};

#[tokio::test]
async fn update_applied_twice_equals_once() {
    let local = MemoryStore::new();
    let remote = MemoryRemote::new();
    let mut portal = portal(&local, Some(&remote));
    portal.boot().await;

    let mut priya = portal.store().student("2").unwrap().clone();
    priya.set_mark("Mathematics", 99.0);
    let event = ChangeEvent::update(priya.to_row().unwrap());

    remote.emit(Collection::Students, event.clone());
    let first = portal.next_realtime().await.unwrap();
    let after_once = portal.students().to_vec();

    remote.emit(Collection::Students, event);
    let second = portal.next_realtime().await.unwrap();

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(portal.students(), after_once.as_slice());
    assert_eq!(portal.store().student("2").unwrap().total_marks(), 99.0 + 90.0 + 91.0);
}

#[tokio::test]
async fn delete_of_absent_id_is_noop() {
    let local = MemoryStore::new();
    let remote = MemoryRemote::new();
    let mut portal = portal(&local, Some(&remote));
    portal.boot().await;
    let before = portal.students().to_vec();

    remote.emit(Collection::Students, ChangeEvent::delete("does-not-exist"));
    let applied = portal.next_realtime().await.unwrap();

    assert_eq!(applied.kind, ChangeKind::Delete);
    assert!(!applied.changed);
    assert_eq!(portal.students(), before.as_slice());
}

#[tokio::test]
async fn inserts_from_other_clients_follow_collection_order() {
    let local = MemoryStore::new();
    let remote = MemoryRemote::new();
    let mut portal = portal(&local, Some(&remote));
    portal.boot().await;

    let newcomer = Student::with_id("500", "Arjun Das", "ROLL-5000", "Class 9", "2024");
    remote.emit(Collection::Students, ChangeEvent::insert(newcomer.to_row().unwrap()));
    let link = QuickLink::with_id("600", "Formula Sheet", "https://docs.google.com/f");
    remote.emit(Collection::Links, ChangeEvent::insert(link.to_row().unwrap()));

    portal.next_realtime().await.unwrap();
    portal.next_realtime().await.unwrap();

    assert_eq!(portal.students()[0].id, "500");
    assert_eq!(portal.links().last().unwrap().id, "600");

    // Written through
    let offline = common::portal(&local, None);
    assert_eq!(offline.students()[0].id, "500");
}

#[tokio::test]
async fn own_insert_echo_does_not_duplicate() {
    let local = MemoryStore::new();
    let remote = MemoryRemote::new();
    let mut portal = admin_portal(&local, Some(&remote)).await;

    let id = portal
        .create_link("Mock Tests", "https://tests")
        .unwrap()
        .unwrap();
    portal.flush().await;

    // The remote store echoes every pushed row back as an INSERT event
    for _ in 0..portal.links().len() {
        let change = portal.next_realtime().await.unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
        assert!(!change.changed);
    }
    assert!(portal.drain_realtime().is_empty());

    let matching = portal.links().iter().filter(|l| l.id == id).count();
    assert_eq!(matching, 1);
}

#[tokio::test]
async fn malformed_events_are_dropped() {
    let local = MemoryStore::new();
    let remote = MemoryRemote::new();
    let mut portal = portal(&local, Some(&remote));
    portal.boot().await;

    remote.emit(
        Collection::Links,
        ChangeEvent::insert(serde_json::json!({ "id": "bad", "title": 7 })),
    );
    remote.emit(Collection::Links, ChangeEvent::delete("1"));

    // The bad event is skipped; the next good one is applied
    let applied = portal.next_realtime().await.unwrap();
    assert_eq!(applied.kind, ChangeKind::Delete);
    assert_eq!(ids(portal.links()), vec!["2", "3"]);
}

#[tokio::test]
async fn shutdown_releases_subscriptions() {
    let local = MemoryStore::new();
    let remote = MemoryRemote::new();
    let mut portal = portal(&local, Some(&remote));
    portal.boot().await;
    assert_eq!(remote.subscriber_count(), 3);

    portal.shutdown().await;
    assert_eq!(remote.subscriber_count(), 0);
}
