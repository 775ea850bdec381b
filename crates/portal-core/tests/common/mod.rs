//! Shared fixtures for portal scenario tests

#![allow(dead_code)]

use std::sync::Arc;

use portal_core::local::MemoryStore;
use portal_core::remote::{MemoryRemote, Record};
use portal_core::{Config, Portal};

pub const ADMIN_EMAIL: &str = "admin@mathportal.com";

/// A session over shared in-memory adapters
pub fn portal(local: &MemoryStore, remote: Option<&MemoryRemote>) -> Portal {
    portal_with_config(Config::default(), local, remote)
}

pub fn portal_with_config(
    config: Config,
    local: &MemoryStore,
    remote: Option<&MemoryRemote>,
) -> Portal {
    let remote = remote.map(|r| Arc::new(r.clone()) as Arc<dyn portal_core::RemoteStore>);
    Portal::new(config, Box::new(local.clone()), remote)
}

/// A booted session already in admin mode
pub async fn admin_portal(local: &MemoryStore, remote: Option<&MemoryRemote>) -> Portal {
    let mut portal = portal(local, remote);
    portal.boot().await;
    assert!(portal.enter_admin(ADMIN_EMAIL));
    portal
}

/// Encode records as remote rows
pub fn rows<T: Record>(records: &[T]) -> Vec<serde_json::Value> {
    records
        .iter()
        .map(|r| r.to_row().expect("record encodes"))
        .collect()
}

pub fn ids<T: Record>(records: &[T]) -> Vec<String> {
    records.iter().map(|r| r.record_id().to_string()).collect()
}
