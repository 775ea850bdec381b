//! Errors returned by the portal session API

use thiserror::Error;

use crate::local::StorageError;
use crate::models::Collection;
use crate::remote::RemoteError;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The session is not in admin mode
    #[error("Admin mode required")]
    NotAdmin,

    /// A destructive action is already waiting for confirmation
    #[error("Another action is awaiting confirmation: {0}")]
    ConfirmationPending(String),

    #[error("Nothing is awaiting confirmation")]
    NoPendingAction,

    #[error("No {collection} record with id '{id}'")]
    NotFound { collection: Collection, id: String },

    /// An editor operation was called with no student open for editing
    #[error("No student is open for editing")]
    NotEditing,

    /// Push-all finished with some collections rejected
    #[error("Failed to push: {}", format_collections(.failed))]
    BulkPush { failed: Vec<Collection> },

    /// The remote store is disabled or unreachable
    #[error("Remote store is not available")]
    Offline,
}

fn format_collections(collections: &[Collection]) -> String {
    collections
        .iter()
        .map(|c| c.table_name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type PortalResult<T> = std::result::Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_push_lists_collections() {
        let err = PortalError::BulkPush {
            failed: vec![Collection::Students, Collection::Sections],
        };
        assert_eq!(err.to_string(), "Failed to push: students, sections");
    }

    #[test]
    fn test_not_found_display() {
        let err = PortalError::NotFound {
            collection: Collection::Links,
            id: "9".into(),
        };
        assert_eq!(err.to_string(), "No links record with id '9'");
    }
}
