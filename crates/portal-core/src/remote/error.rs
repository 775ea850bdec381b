//! Remote store errors

use thiserror::Error;

use super::SubscriptionId;
use crate::models::Collection;

/// Errors raised by remote store adapters
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The remote store could not be reached at all
    #[error("Remote store unreachable: {0}")]
    Unreachable(String),

    /// The remote store answered with a non-success status
    #[error("Remote store returned {status} for {collection}: {body}")]
    Status {
        collection: Collection,
        status: u16,
        body: String,
    },

    /// A row or event payload did not match the collection's schema
    #[error("Invalid {collection} record from remote store: {details}")]
    Decode {
        collection: Collection,
        details: String,
    },

    /// A realtime channel could not be opened
    #[error("Realtime subscription to {collection} failed: {reason}")]
    Subscription {
        collection: Collection,
        reason: String,
    },

    /// Unsubscribe was called with a handle this adapter never issued
    #[error("Unknown subscription {0}")]
    UnknownSubscription(SubscriptionId),
}

impl RemoteError {
    /// Map a transport error from the HTTP client
    pub fn from_http(collection: Collection, error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => RemoteError::Status {
                collection,
                status: status.as_u16(),
                body: error.to_string(),
            },
            None if error.is_decode() => RemoteError::Decode {
                collection,
                details: error.to_string(),
            },
            None => RemoteError::Unreachable(error.to_string()),
        }
    }

    /// Whether this error means the remote store is not reachable
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RemoteError::Unreachable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        assert!(RemoteError::Unreachable("refused".into()).is_connectivity());
        assert!(!RemoteError::Status {
            collection: Collection::Students,
            status: 404,
            body: "relation does not exist".into(),
        }
        .is_connectivity());
    }

    #[test]
    fn test_status_display_names_table() {
        let err = RemoteError::Status {
            collection: Collection::TeacherProfile,
            status: 401,
            body: "bad key".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("teacher_profile"));
        assert!(msg.contains("401"));
    }
}
