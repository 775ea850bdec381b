//! The portal session
//!
//! `Portal` is the single writer of the view model. It owns the
//! [`PortalStore`], the [`SyncCoordinator`], the pending-confirmation
//! state and the student editor, and every change goes through one of its
//! `&mut self` methods.
//!
//! Each admin mutation builds the next collection value, commits it
//! (which writes it through to local storage) and queues a best-effort
//! push. Validation failures are silent: the method returns `Ok(None)` or
//! `Ok(false)` and leaves state untouched.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::Config;
use crate::confirm::{Confirmation, PendingAction, PendingKind};
use crate::error::{PortalError, PortalResult};
use crate::local::{self, LocalStore};
use crate::models::{
    next_id, Collection, CustomSection, NewStudent, QuickLink, SectionPatch, Student,
    TeacherProfile,
};
use crate::remote::{self, RemoteStore};
use crate::store::{PortalStore, SessionFlags};
use crate::sync::{AppliedChange, HydrationReport, OutboxStats, SyncCoordinator};

pub struct Portal {
    config: Config,
    store: PortalStore,
    sync: SyncCoordinator,
    confirmation: Confirmation,
    editor: Option<Student>,
}

impl Portal {
    /// Open a session with the adapters selected by the configuration
    pub fn open(config: &Config) -> Result<Self> {
        let local = local::open(config).context("Failed to open local storage")?;
        let remote = remote::open(config).context("Failed to set up remote store")?;
        Ok(Self::new(config.clone(), local, remote))
    }

    /// Build a session from explicit adapters
    ///
    /// The view model is loaded from `local` immediately; nothing touches
    /// the network until [`Portal::boot`].
    pub fn new(
        config: Config,
        local: Box<dyn LocalStore>,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Self {
        let store = PortalStore::load(local);
        let sync = SyncCoordinator::new(remote, config.trust_empty_remote);
        Self {
            config,
            store,
            sync,
            confirmation: Confirmation::default(),
            editor: None,
        }
    }

    /// Hydrate from the remote store and start realtime updates
    pub async fn boot(&mut self) -> bool {
        let connected = self.sync.boot(&mut self.store).await;
        info!("Portal ready (connected={})", connected);
        connected
    }

    /// Wait for queued pushes, then release realtime subscriptions
    pub async fn shutdown(&mut self) {
        self.sync.flush().await;
        self.sync.teardown().await;
    }

    // ==================== Reads ====================

    pub fn store(&self) -> &PortalStore {
        &self.store
    }

    pub fn teacher(&self) -> &TeacherProfile {
        self.store.teacher()
    }

    pub fn students(&self) -> &[Student] {
        self.store.students()
    }

    pub fn links(&self) -> &[QuickLink] {
        self.store.links()
    }

    pub fn sections(&self) -> &[CustomSection] {
        self.store.sections()
    }

    pub fn flags(&self) -> SessionFlags {
        self.store.flags()
    }

    pub fn is_admin(&self) -> bool {
        self.store.flags().is_admin
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.confirmation.pending()
    }

    /// The draft of the student open for editing
    pub fn editing(&self) -> Option<&Student> {
        self.editor.as_ref()
    }

    pub fn hydration_report(&self) -> Option<&HydrationReport> {
        self.sync.hydration_report()
    }

    pub fn outbox_stats(&self) -> Option<OutboxStats> {
        self.sync.outbox_stats()
    }

    // ==================== Admin gate ====================

    /// Enter admin mode if `email` is on the allowlist
    pub fn enter_admin(&mut self, email: &str) -> bool {
        let allowed = self.config.is_admin(email);
        if allowed {
            info!("Admin mode entered by {}", email);
        } else {
            info!("Admin mode refused for {}", email);
        }
        self.store.flags_mut().is_admin = allowed;
        allowed
    }

    /// Leave admin mode, dropping any open editor or pending action
    pub fn exit_admin(&mut self) {
        self.store.flags_mut().is_admin = false;
        self.editor = None;
        self.confirmation.cancel();
    }

    fn require_admin(&self) -> PortalResult<()> {
        if !self.is_admin() {
            return Err(PortalError::NotAdmin);
        }
        self.confirmation.ensure_idle()
    }

    // ==================== Realtime ====================

    /// Apply realtime events that have already arrived
    pub fn drain_realtime(&mut self) -> Vec<AppliedChange> {
        self.sync.drain(&mut self.store)
    }

    /// Wait for the next realtime event and apply it
    pub async fn next_realtime(&mut self) -> Option<AppliedChange> {
        self.sync.next_change(&mut self.store).await
    }

    /// Wait for queued pushes to finish
    pub async fn flush(&self) {
        self.sync.flush().await;
    }

    /// Upsert every collection, reporting failures to the caller
    pub async fn push_all(&self) -> PortalResult<()> {
        self.require_admin()?;
        self.sync.push_all(&self.store).await
    }

    // ==================== Students ====================

    /// Create a student from the entry form, newest first
    ///
    /// Returns the new id, or `None` if name or class is missing or a
    /// score is not finite.
    pub fn create_student(&mut self, form: NewStudent) -> PortalResult<Option<String>> {
        self.require_admin()?;
        let Some(student) = form.build() else {
            debug!("Ignoring invalid student form");
            return Ok(None);
        };
        let id = student.id.clone();

        let mut students = Vec::with_capacity(self.store.students().len() + 1);
        students.push(student);
        students.extend_from_slice(self.store.students());
        self.commit_students(students);
        info!("Created student {}", id);
        Ok(Some(id))
    }

    /// Replace a student record by id
    pub fn update_student(&mut self, student: Student) -> PortalResult<bool> {
        self.require_admin()?;
        self.replace_student(student)
    }

    fn replace_student(&mut self, student: Student) -> PortalResult<bool> {
        if self.store.student(&student.id).is_none() {
            return Ok(false);
        }
        let students = self
            .store
            .students()
            .iter()
            .map(|s| if s.id == student.id { student.clone() } else { s.clone() })
            .collect();
        self.commit_students(students);
        debug!("Updated student {}", student.id);
        Ok(true)
    }

    /// Flip visibility; returns the new value
    pub fn toggle_visible(&mut self, id: &str) -> PortalResult<bool> {
        self.require_admin()?;
        let mut student = self.find_student(id)?.clone();
        student.is_visible = !student.is_visible;
        let visible = student.is_visible;
        self.replace_student(student)?;
        Ok(visible)
    }

    /// Flip the featured flag; returns the new value
    pub fn toggle_featured(&mut self, id: &str) -> PortalResult<bool> {
        self.require_admin()?;
        let mut student = self.find_student(id)?.clone();
        student.is_featured = !student.is_featured;
        let featured = student.is_featured;
        self.replace_student(student)?;
        Ok(featured)
    }

    pub fn request_delete_student(&mut self, id: &str) -> PortalResult<&PendingAction> {
        self.require_admin()?;
        let action = PendingAction::delete_student(self.find_student(id)?);
        self.confirmation.request(action)
    }

    fn find_student(&self, id: &str) -> PortalResult<&Student> {
        self.store.student(id).ok_or_else(|| PortalError::NotFound {
            collection: Collection::Students,
            id: id.to_string(),
        })
    }

    fn commit_students(&mut self, students: Vec<Student>) {
        self.store.set_students(students);
        self.sync.push(self.store.students());
    }

    // ==================== Student editor ====================

    /// Open a draft copy of a student for editing
    pub fn begin_edit(&mut self, id: &str) -> PortalResult<&mut Student> {
        self.require_admin()?;
        let draft = self.find_student(id)?.clone();
        Ok(self.editor.insert(draft))
    }

    /// The open draft, for subject and link edits
    pub fn editing_mut(&mut self) -> PortalResult<&mut Student> {
        self.require_admin()?;
        self.editor.as_mut().ok_or(PortalError::NotEditing)
    }

    /// Save the draft as a full-record update and close the editor
    pub fn apply_edit(&mut self) -> PortalResult<bool> {
        self.require_admin()?;
        let draft = self.editor.take().ok_or(PortalError::NotEditing)?;
        self.replace_student(draft)
    }

    /// Ask to throw the draft away
    pub fn request_discard_edit(&mut self) -> PortalResult<&PendingAction> {
        self.require_admin()?;
        if self.editor.is_none() {
            return Err(PortalError::NotEditing);
        }
        self.confirmation
            .request(PendingAction::discard_student_edit())
    }

    // ==================== Links ====================

    /// Append a link; `None` if title or URL is empty
    pub fn create_link(
        &mut self,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> PortalResult<Option<String>> {
        self.save_link(QuickLink::with_id("", title, url))
    }

    /// Save a link: an empty id creates it, a known id updates it in place
    ///
    /// Returns the saved link's id, or `None` when nothing was saved.
    pub fn save_link(&mut self, mut link: QuickLink) -> PortalResult<Option<String>> {
        self.require_admin()?;
        if !link.is_valid() {
            debug!("Ignoring link without title or url");
            return Ok(None);
        }

        let links: Vec<QuickLink> = if link.id.is_empty() {
            link.id = next_id();
            let mut links = self.store.links().to_vec();
            links.push(link.clone());
            links
        } else if self.store.link(&link.id).is_some() {
            self.store
                .links()
                .iter()
                .map(|l| if l.id == link.id { link.clone() } else { l.clone() })
                .collect()
        } else {
            return Ok(None);
        };

        self.store.set_links(links);
        self.sync.push(self.store.links());
        debug!("Saved link {}", link.id);
        Ok(Some(link.id))
    }

    pub fn request_delete_link(&mut self, id: &str) -> PortalResult<&PendingAction> {
        self.require_admin()?;
        let link = self.store.link(id).ok_or_else(|| PortalError::NotFound {
            collection: Collection::Links,
            id: id.to_string(),
        })?;
        let action = PendingAction::delete_link(link);
        self.confirmation.request(action)
    }

    // ==================== Sections ====================

    /// Append a placeholder section; returns its id
    pub fn create_section(&mut self) -> PortalResult<String> {
        self.require_admin()?;
        let section = CustomSection::placeholder();
        let id = section.id.clone();

        let mut sections = self.store.sections().to_vec();
        sections.push(section);
        self.commit_sections(sections);
        Ok(id)
    }

    /// Apply a partial update to a section
    pub fn update_section(&mut self, id: &str, patch: &SectionPatch) -> PortalResult<bool> {
        self.require_admin()?;
        if patch.is_empty() || self.store.section(id).is_none() {
            return Ok(false);
        }
        let sections = self
            .store
            .sections()
            .iter()
            .map(|s| {
                let mut s = s.clone();
                if s.id == id {
                    s.apply(patch);
                }
                s
            })
            .collect();
        self.commit_sections(sections);
        Ok(true)
    }

    pub fn request_delete_section(&mut self, id: &str) -> PortalResult<&PendingAction> {
        self.require_admin()?;
        let section = self.store.section(id).ok_or_else(|| PortalError::NotFound {
            collection: Collection::Sections,
            id: id.to_string(),
        })?;
        let action = PendingAction::delete_section(section);
        self.confirmation.request(action)
    }

    fn commit_sections(&mut self, sections: Vec<CustomSection>) {
        self.store.set_sections(sections);
        self.sync.push(self.store.sections());
    }

    // ==================== Teacher ====================

    /// Commit the profile locally, then wait for the remote upsert
    ///
    /// The local commit stands even when the remote save fails.
    pub async fn save_teacher(&mut self, teacher: TeacherProfile) -> PortalResult<()> {
        self.require_admin()?;
        self.store.set_teacher(teacher);
        self.sync.save_teacher(self.store.teacher()).await
    }

    // ==================== Confirmation ====================

    /// Run the pending action and return to idle
    pub fn confirm(&mut self) -> PortalResult<PendingKind> {
        if !self.is_admin() {
            return Err(PortalError::NotAdmin);
        }
        let action = self.confirmation.take()?;
        match &action.kind {
            PendingKind::DeleteStudent { id } => {
                let students = without_id(self.store.students(), |s| &s.id, id);
                self.store.set_students(students);
                self.sync.push_delete(Collection::Students, id);
            }
            PendingKind::DeleteLink { id } => {
                let links = without_id(self.store.links(), |l| &l.id, id);
                self.store.set_links(links);
                self.sync.push_delete(Collection::Links, id);
            }
            PendingKind::DeleteSection { id } => {
                let sections = without_id(self.store.sections(), |s| &s.id, id);
                self.store.set_sections(sections);
                self.sync.push_delete(Collection::Sections, id);
            }
            PendingKind::DiscardStudentEdit => {
                self.editor = None;
            }
        }
        info!("Confirmed: {}", action.title);
        Ok(action.kind)
    }

    /// Drop the pending action without running it
    pub fn cancel(&mut self) -> Option<PendingAction> {
        self.confirmation.cancel()
    }
}

fn without_id<T: Clone>(items: &[T], id_of: impl Fn(&T) -> &String, id: &str) -> Vec<T> {
    items
        .iter()
        .filter(|item| id_of(*item) != id)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::MemoryStore;
    use crate::models::{SectionTheme, StudentLink};

    fn admin_portal() -> Portal {
        let mut portal = Portal::new(Config::default(), Box::new(MemoryStore::new()), None);
        assert!(portal.enter_admin("admin@mathportal.com"));
        portal
    }

    #[test]
    fn test_mutations_need_admin() {
        let mut portal = Portal::new(Config::default(), Box::new(MemoryStore::new()), None);
        assert!(!portal.enter_admin("student@example.com"));
        assert!(matches!(
            portal.toggle_featured("1"),
            Err(PortalError::NotAdmin)
        ));
        assert!(matches!(portal.create_section(), Err(PortalError::NotAdmin)));
    }

    #[test]
    fn test_create_student_prepends() {
        let mut portal = admin_portal();
        let mut form = NewStudent::new("Neha Rao", "Class 11");
        form.marks.insert("Physics".into(), 40.0);

        let id = portal.create_student(form).unwrap().unwrap();
        let first = &portal.students()[0];
        assert_eq!(first.id, id);
        assert_eq!(first.total_marks(), 40.0);
        assert_eq!(portal.students().len(), 5);
    }

    #[test]
    fn test_invalid_student_form_is_ignored() {
        let mut portal = admin_portal();
        assert_eq!(portal.create_student(NewStudent::new("", "Class 11")).unwrap(), None);
        assert_eq!(portal.students().len(), 4);
    }

    #[test]
    fn test_editor_flow() {
        let mut portal = admin_portal();
        let draft = portal.begin_edit("3").unwrap();
        draft.add_subject("English");
        draft.set_mark("English", 80.0);
        draft.add_link(StudentLink::default());

        // Nothing is committed until the edit is applied
        assert_eq!(portal.store().student("3").unwrap().total_marks(), 195.0);

        assert!(portal.apply_edit().unwrap());
        let student = portal.store().student("3").unwrap();
        assert_eq!(student.total_marks(), 275.0);
        assert_eq!(student.links[0].title, "Social Page");
        assert!(portal.editing().is_none());
        assert!(matches!(portal.apply_edit(), Err(PortalError::NotEditing)));
    }

    #[test]
    fn test_discard_edit_needs_confirmation() {
        let mut portal = admin_portal();
        portal.begin_edit("1").unwrap().name = "Changed".into();

        let action = portal.request_discard_edit().unwrap();
        assert_eq!(action.title, "Discard Changes?");
        assert!(matches!(portal.editing_mut(), Err(PortalError::ConfirmationPending(_))));

        assert_eq!(portal.confirm().unwrap(), PendingKind::DiscardStudentEdit);
        assert!(portal.editing().is_none());
        assert_eq!(portal.store().student("1").unwrap().name, "Aryan Sharma");
    }

    #[test]
    fn test_links() {
        let mut portal = admin_portal();
        assert_eq!(portal.create_link("Notes", "").unwrap(), None);

        let id = portal.create_link("Notes", "https://notes").unwrap().unwrap();
        assert_eq!(portal.links().last().unwrap().id, id);

        portal
            .save_link(QuickLink::with_id("2", "Telegram", "https://t.me/x"))
            .unwrap();
        assert_eq!(portal.links()[1].title, "Telegram");
        assert_eq!(portal.links().len(), 4);

        portal.request_delete_link("2").unwrap();
        portal.confirm().unwrap();
        let ids: Vec<_> = portal.links().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", id.as_str()]);
    }

    #[test]
    fn test_sections() {
        let mut portal = admin_portal();
        let id = portal.create_section().unwrap();

        let patch = SectionPatch {
            title: Some("Board Results".into()),
            theme: Some(SectionTheme::Dark),
            ..Default::default()
        };
        assert!(portal.update_section(&id, &patch).unwrap());
        assert!(!portal.update_section("missing", &patch).unwrap());

        let section = &portal.sections()[0];
        assert_eq!(section.title, "Board Results");
        assert_eq!(section.content, "Click edit to change this content...");
        assert_eq!(section.theme, SectionTheme::Dark);

        let action = portal.request_delete_section(&id).unwrap();
        assert_eq!(action.message, "Delete the component \"Board Results\"?");
        portal.confirm().unwrap();
        assert!(portal.sections().is_empty());
    }

    #[test]
    fn test_pending_action_blocks_other_mutations() {
        let mut portal = admin_portal();
        portal.request_delete_student("4").unwrap();

        assert!(matches!(
            portal.request_delete_link("1"),
            Err(PortalError::ConfirmationPending(_))
        ));
        assert!(matches!(
            portal.toggle_visible("1"),
            Err(PortalError::ConfirmationPending(_))
        ));

        portal.cancel();
        assert!(portal.toggle_visible("1").is_ok());
    }

    #[tokio::test]
    async fn test_save_teacher_offline_keeps_local_commit() {
        let mut portal = admin_portal();
        let mut teacher = portal.teacher().clone();
        teacher.years_exp = "8+".into();

        let result = portal.save_teacher(teacher).await;
        assert!(matches!(result, Err(PortalError::Offline)));
        assert_eq!(portal.teacher().years_exp, "8+");
    }

    #[test]
    fn test_exit_admin_clears_session_state() {
        let mut portal = admin_portal();
        portal.begin_edit("2").unwrap();
        portal.request_discard_edit().unwrap();

        portal.exit_admin();
        assert!(portal.pending().is_none());
        assert!(portal.editing().is_none());
        assert!(!portal.is_admin());
    }
}
