//! Pending-confirmation state machine
//!
//! Destructive actions do not run directly. They park a [`PendingAction`]
//! describing the dialog to show, and only run on `confirm`. `cancel`
//! drops the action. While one action is waiting, no other can be
//! requested.

use serde::Serialize;

use crate::error::{PortalError, PortalResult};
use crate::models::{CustomSection, QuickLink, Student};

/// What the pending action will do once confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingKind {
    DeleteStudent { id: String },
    DeleteLink { id: String },
    DeleteSection { id: String },
    DiscardStudentEdit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Danger,
    Warning,
}

/// A destructive action waiting for the operator's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingAction {
    pub kind: PendingKind,
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    pub severity: Severity,
}

impl PendingAction {
    pub fn delete_student(student: &Student) -> Self {
        Self {
            kind: PendingKind::DeleteStudent {
                id: student.id.clone(),
            },
            title: "Delete Student?".to_string(),
            message: format!(
                "Are you sure you want to remove {}? This cannot be undone.",
                student.name
            ),
            confirm_label: "Confirm Delete".to_string(),
            severity: Severity::Danger,
        }
    }

    pub fn delete_link(link: &QuickLink) -> Self {
        Self {
            kind: PendingKind::DeleteLink {
                id: link.id.clone(),
            },
            title: "Delete Link?".to_string(),
            message: format!("Remove the link \"{}\"?", link.title),
            confirm_label: "Remove".to_string(),
            severity: Severity::Danger,
        }
    }

    pub fn delete_section(section: &CustomSection) -> Self {
        Self {
            kind: PendingKind::DeleteSection {
                id: section.id.clone(),
            },
            title: "Delete Component?".to_string(),
            message: format!("Delete the component \"{}\"?", section.title),
            confirm_label: "Delete".to_string(),
            severity: Severity::Danger,
        }
    }

    pub fn discard_student_edit() -> Self {
        Self {
            kind: PendingKind::DiscardStudentEdit,
            title: "Discard Changes?".to_string(),
            message: "Are you sure you want to stop editing? Unsaved data will be lost."
                .to_string(),
            confirm_label: "Yes, Discard".to_string(),
            severity: Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Confirmation {
    #[default]
    Idle,
    Awaiting(PendingAction),
}

impl Confirmation {
    pub fn pending(&self) -> Option<&PendingAction> {
        match self {
            Confirmation::Idle => None,
            Confirmation::Awaiting(action) => Some(action),
        }
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self, Confirmation::Awaiting(_))
    }

    /// Fail if an action is already waiting
    pub fn ensure_idle(&self) -> PortalResult<()> {
        match self {
            Confirmation::Idle => Ok(()),
            Confirmation::Awaiting(action) => {
                Err(PortalError::ConfirmationPending(action.title.clone()))
            }
        }
    }

    /// Enter the awaiting state
    pub fn request(&mut self, action: PendingAction) -> PortalResult<&PendingAction> {
        self.ensure_idle()?;
        *self = Confirmation::Awaiting(action);
        self.pending().ok_or(PortalError::NoPendingAction)
    }

    /// Leave the awaiting state, handing back the action to execute
    pub fn take(&mut self) -> PortalResult<PendingAction> {
        match std::mem::take(self) {
            Confirmation::Awaiting(action) => Ok(action),
            Confirmation::Idle => Err(PortalError::NoPendingAction),
        }
    }

    /// Drop the waiting action, if any
    pub fn cancel(&mut self) -> Option<PendingAction> {
        self.take().ok()
    }
}
