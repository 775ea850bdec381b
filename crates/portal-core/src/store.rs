//! View model store
//!
//! Holds the four collections plus the session flags. Reads return the
//! latest committed value. Every write replaces a whole collection and is
//! then written through to the local store under the collection's key.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = PortalStore::load(Box::new(MemoryStore::new()));
//!
//! let mut students = store.students().to_vec();
//! students.retain(|s| s.id != "1");
//! store.set_students(students);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::local::{read_snapshot, write_snapshot, LocalStore};
use crate::models::{Collection, CustomSection, QuickLink, Student, TeacherProfile};
use crate::seed;

/// Ephemeral session flags (never persisted)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFlags {
    pub is_admin: bool,
    pub is_db_connected: bool,
    pub is_syncing: bool,
}

/// The committed view model and its write-through target
pub struct PortalStore {
    teacher: TeacherProfile,
    students: Vec<Student>,
    links: Vec<QuickLink>,
    sections: Vec<CustomSection>,
    flags: SessionFlags,
    local: Box<dyn LocalStore>,
    failed_writes: usize,
}

impl PortalStore {
    /// Build the view model from local storage
    ///
    /// Each key falls back to seed data when it is missing or cannot be
    /// decoded.
    pub fn load(local: Box<dyn LocalStore>) -> Self {
        let teacher = load_or_seed(local.as_ref(), Collection::TeacherProfile, seed::teacher);
        let students = load_or_seed(local.as_ref(), Collection::Students, seed::students);
        let links = load_or_seed(local.as_ref(), Collection::Links, seed::links);
        let sections = load_or_seed(local.as_ref(), Collection::Sections, seed::sections);

        Self {
            teacher,
            students,
            links,
            sections,
            flags: SessionFlags::default(),
            local,
            failed_writes: 0,
        }
    }

    // ==================== Reads ====================

    pub fn teacher(&self) -> &TeacherProfile {
        &self.teacher
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn links(&self) -> &[QuickLink] {
        &self.links
    }

    pub fn sections(&self) -> &[CustomSection] {
        &self.sections
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn link(&self, id: &str) -> Option<&QuickLink> {
        self.links.iter().find(|l| l.id == id)
    }

    pub fn section(&self, id: &str) -> Option<&CustomSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut SessionFlags {
        &mut self.flags
    }

    /// Number of local writes that failed since the store was loaded
    pub fn failed_writes(&self) -> usize {
        self.failed_writes
    }

    // ==================== Commits ====================

    pub fn set_teacher(&mut self, teacher: TeacherProfile) {
        self.teacher = teacher;
        self.persist(Collection::TeacherProfile);
    }

    pub fn set_students(&mut self, students: Vec<Student>) {
        self.students = students;
        self.persist(Collection::Students);
    }

    pub fn set_links(&mut self, links: Vec<QuickLink>) {
        self.links = links;
        self.persist(Collection::Links);
    }

    pub fn set_sections(&mut self, sections: Vec<CustomSection>) {
        self.sections = sections;
        self.persist(Collection::Sections);
    }

    /// Write the committed value of `collection` to local storage
    ///
    /// A failed write is logged and counted; the in-memory commit stands.
    fn persist(&mut self, collection: Collection) {
        let key = collection.local_key();
        let local = self.local.as_ref();
        let result = match collection {
            Collection::TeacherProfile => write_snapshot(local, key, &self.teacher),
            Collection::Students => write_snapshot(local, key, &self.students),
            Collection::Links => write_snapshot(local, key, &self.links),
            Collection::Sections => write_snapshot(local, key, &self.sections),
        };

        match result {
            Ok(()) => debug!("Saved {} snapshot", key),
            Err(e) => {
                self.failed_writes += 1;
                match e.recovery_suggestion() {
                    Some(hint) => error!("Failed to save {} snapshot: {} ({})", key, e, hint),
                    None => error!("Failed to save {} snapshot: {}", key, e),
                }
            }
        }
    }
}

fn load_or_seed<T, F>(local: &dyn LocalStore, collection: Collection, seed: F) -> T
where
    T: DeserializeOwned + Serialize,
    F: FnOnce() -> T,
{
    let key = collection.local_key();
    match read_snapshot(local, key) {
        Ok(Some(value)) => value,
        Ok(None) => {
            debug!("No {} snapshot, using seed data", key);
            seed()
        }
        Err(e) => {
            warn!("Ignoring unreadable {} snapshot: {}", key, e);
            seed()
        }
    }
}
