//! Boot-time hydration from the remote store
//!
//! All four collections are fetched concurrently. A non-empty result
//! replaces the local collection wholesale; an empty or failed fetch keeps
//! what local storage (or the seed) provided.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::{Collection, CustomSection, QuickLink, Student, TeacherProfile};
use crate::remote::{RemoteError, RemoteStore, Table};
use crate::store::PortalStore;

/// Result of fetching one collection
#[derive(Debug)]
pub enum FetchOutcome {
    /// Remote data replaced the local collection
    Applied(usize),
    /// The remote collection was empty; local data kept
    Empty,
    /// The fetch failed; local data kept
    Failed(RemoteError),
}

impl FetchOutcome {
    fn reached_remote(&self) -> bool {
        !matches!(self, FetchOutcome::Failed(e) if e.is_connectivity())
    }
}

/// Per-collection outcome of a hydration pass
#[derive(Debug)]
pub struct HydrationReport {
    pub outcomes: Vec<(Collection, FetchOutcome)>,
}

impl HydrationReport {
    /// Whether at least one fetch reached the remote store
    pub fn connected(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| outcome.reached_remote())
    }

    pub fn outcome(&self, collection: Collection) -> Option<&FetchOutcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == collection)
            .map(|(_, outcome)| outcome)
    }

    /// Collections whose remote data won
    pub fn applied(&self) -> Vec<Collection> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, FetchOutcome::Applied(_)))
            .map(|(c, _)| *c)
            .collect()
    }
}

/// Fetch every collection and commit the ones the remote store wins
///
/// With `trust_empty_remote`, an empty remote list also replaces local
/// data.
pub async fn hydrate(
    remote: Arc<dyn RemoteStore>,
    store: &mut PortalStore,
    trust_empty_remote: bool,
) -> HydrationReport {
    let teacher = Table::<TeacherProfile>::new(Arc::clone(&remote));
    let students = Table::<Student>::new(Arc::clone(&remote));
    let links = Table::<QuickLink>::new(Arc::clone(&remote));
    let sections = Table::<CustomSection>::new(remote);

    let (teacher, students, links, sections) = tokio::join!(
        teacher.fetch_one(),
        students.fetch_all(),
        links.fetch_all(),
        sections.fetch_all(),
    );

    let teacher = match teacher {
        Ok(Some(profile)) => {
            store.set_teacher(profile);
            FetchOutcome::Applied(1)
        }
        Ok(None) => {
            debug!("Remote teacher profile missing, keeping local");
            FetchOutcome::Empty
        }
        Err(e) => {
            warn!("Failed to fetch {}: {}", Collection::TeacherProfile, e);
            FetchOutcome::Failed(e)
        }
    };
    let students = settle(Collection::Students, students, trust_empty_remote, |rows| {
        store.set_students(rows)
    });
    let links = settle(Collection::Links, links, trust_empty_remote, |rows| {
        store.set_links(rows)
    });
    let sections = settle(Collection::Sections, sections, trust_empty_remote, |rows| {
        store.set_sections(rows)
    });

    let report = HydrationReport {
        outcomes: vec![
            (Collection::TeacherProfile, teacher),
            (Collection::Students, students),
            (Collection::Links, links),
            (Collection::Sections, sections),
        ],
    };
    info!(
        "Hydration finished: connected={}, remote won for {:?}",
        report.connected(),
        report.applied()
    );
    report
}

fn settle<T>(
    collection: Collection,
    result: Result<Vec<T>, RemoteError>,
    trust_empty_remote: bool,
    commit: impl FnOnce(Vec<T>),
) -> FetchOutcome {
    match result {
        Ok(rows) if rows.is_empty() && !trust_empty_remote => {
            debug!("Remote {} is empty, keeping local", collection);
            FetchOutcome::Empty
        }
        Ok(rows) => {
            let count = rows.len();
            commit(rows);
            FetchOutcome::Applied(count)
        }
        Err(e) => {
            warn!("Failed to fetch {}: {}", collection, e);
            FetchOutcome::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::MemoryStore;
    use crate::remote::{MemoryRemote, Record};

    fn rows<T: Record>(records: &[T]) -> Vec<serde_json::Value> {
        records.iter().map(|r| r.to_row().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_unreachable_keeps_local_and_disconnects() {
        let mut store = PortalStore::load(Box::new(MemoryStore::new()));
        let report = hydrate(Arc::new(MemoryRemote::unreachable()), &mut store, false).await;

        assert!(!report.connected());
        assert!(report.applied().is_empty());
        assert_eq!(store.students().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_remote_keeps_local_unless_trusted() {
        let remote = MemoryRemote::new();

        let mut store = PortalStore::load(Box::new(MemoryStore::new()));
        let report = hydrate(Arc::new(remote.clone()), &mut store, false).await;
        assert!(report.connected());
        assert!(matches!(report.outcome(Collection::Links), Some(FetchOutcome::Empty)));
        assert_eq!(store.links().len(), 3);

        let mut store = PortalStore::load(Box::new(MemoryStore::new()));
        hydrate(Arc::new(remote), &mut store, true).await;
        assert!(store.links().is_empty());
        // A missing profile never blanks the teacher
        assert_eq!(store.teacher().name, "Sir Sandeep Baghel");
    }

    #[tokio::test]
    async fn test_remote_rows_win() {
        let remote = MemoryRemote::new();
        let mut teacher = crate::seed::teacher();
        teacher.name = "Dr. R. Iyer".into();
        remote.seed(Collection::TeacherProfile, rows(&[teacher.clone()]));
        remote.seed(
            Collection::Links,
            rows(&[QuickLink::with_id("8", "Timetable", "https://t")]),
        );

        let mut store = PortalStore::load(Box::new(MemoryStore::new()));
        let report = hydrate(Arc::new(remote), &mut store, false).await;

        assert_eq!(store.teacher(), &teacher);
        assert_eq!(store.links().len(), 1);
        assert_eq!(
            report.applied(),
            vec![Collection::TeacherProfile, Collection::Links]
        );
    }

    #[tokio::test]
    async fn test_malformed_rows_keep_local() {
        let remote = MemoryRemote::new();
        remote.seed(Collection::Students, vec![serde_json::json!({"id": 5})]);

        let mut store = PortalStore::load(Box::new(MemoryStore::new()));
        let report = hydrate(Arc::new(remote), &mut store, false).await;

        assert!(report.connected());
        assert!(matches!(
            report.outcome(Collection::Students),
            Some(FetchOutcome::Failed(RemoteError::Decode { .. }))
        ));
        assert_eq!(store.students().len(), 4);
    }
}
