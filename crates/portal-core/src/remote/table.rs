//! Typed access to remote collections
//!
//! Every row leaving the remote store passes through [`Record`] decoding
//! here, so a malformed payload is rejected at the boundary instead of
//! reaching the view model.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{ChangeEvent, ChangeKind, EventFilter, RemoteError, RemoteStore, Subscription};
use crate::models::{Collection, CustomSection, QuickLink, Student, TeacherProfile, TEACHER_KEY};

/// An entity type stored in one remote collection
pub trait Record: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn record_id(&self) -> &str;

    /// Encode as a remote row
    fn to_row(&self) -> Result<Value, RemoteError> {
        serde_json::to_value(self).map_err(|e| RemoteError::Decode {
            collection: Self::COLLECTION,
            details: e.to_string(),
        })
    }

    /// Decode a remote row
    fn from_row(row: Value) -> Result<Self, RemoteError> {
        serde_json::from_value(row).map_err(|e| RemoteError::Decode {
            collection: Self::COLLECTION,
            details: e.to_string(),
        })
    }
}

impl Record for Student {
    const COLLECTION: Collection = Collection::Students;

    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Record for QuickLink {
    const COLLECTION: Collection = Collection::Links;

    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Record for CustomSection {
    const COLLECTION: Collection = Collection::Sections;

    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Record for TeacherProfile {
    const COLLECTION: Collection = Collection::TeacherProfile;

    fn record_id(&self) -> &str {
        TEACHER_KEY
    }

    /// The profile row carries the fixed singleton key
    fn to_row(&self) -> Result<Value, RemoteError> {
        let mut row = serde_json::to_value(self).map_err(|e| RemoteError::Decode {
            collection: Self::COLLECTION,
            details: e.to_string(),
        })?;
        if let Value::Object(ref mut map) = row {
            map.insert("id".to_string(), Value::String(TEACHER_KEY.to_string()));
        }
        Ok(row)
    }
}

/// A decoded realtime change
#[derive(Debug, Clone, PartialEq)]
pub enum RecordChange<T> {
    Insert(T),
    Update(T),
    Delete { id: String },
}

/// Decode a raw change event into a typed change
///
/// INSERT and UPDATE need a full new row; DELETE needs the old row's id.
pub fn decode_change<T: Record>(event: ChangeEvent) -> Result<RecordChange<T>, RemoteError> {
    let missing = |what: &str| RemoteError::Decode {
        collection: T::COLLECTION,
        details: format!("{} event without {}", event.kind.as_str(), what),
    };

    match event.kind {
        ChangeKind::Insert | ChangeKind::Update => {
            let row = event.new.clone().ok_or_else(|| missing("new record"))?;
            let record = T::from_row(row)?;
            Ok(match event.kind {
                ChangeKind::Insert => RecordChange::Insert(record),
                _ => RecordChange::Update(record),
            })
        }
        ChangeKind::Delete => {
            let id = event
                .old
                .as_ref()
                .and_then(|old| old.get("id"))
                .and_then(id_string)
                .ok_or_else(|| missing("old record id"))?;
            Ok(RecordChange::Delete { id })
        }
    }
}

// Ids are strings locally; some remote schemas hand them back as numbers
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Typed view of one remote collection
pub struct Table<T> {
    remote: Arc<dyn RemoteStore>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            _record: PhantomData,
        }
    }
}

impl<T: Record> Table<T> {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            _record: PhantomData,
        }
    }

    /// Fetch and decode every row; one bad row fails the whole fetch
    pub async fn fetch_all(&self) -> Result<Vec<T>, RemoteError> {
        self.remote
            .fetch_all(T::COLLECTION)
            .await?
            .into_iter()
            .map(T::from_row)
            .collect()
    }

    pub async fn fetch_one(&self) -> Result<Option<T>, RemoteError> {
        match self.remote.fetch_one(T::COLLECTION).await? {
            Some(row) => T::from_row(row).map(Some),
            None => Ok(None),
        }
    }

    pub async fn upsert(&self, records: &[T]) -> Result<(), RemoteError> {
        let rows = records
            .iter()
            .map(Record::to_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.remote.upsert(T::COLLECTION, rows).await
    }

    pub async fn subscribe(&self, filter: EventFilter) -> Result<Subscription, RemoteError> {
        self.remote.subscribe(T::COLLECTION, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_teacher_row_has_singleton_id() {
        let row = crate::seed::teacher().to_row().unwrap();
        assert_eq!(row["id"], "main");
        assert_eq!(row["yearsExp"], "7+");
    }

    #[test]
    fn test_decode_update() {
        let event = ChangeEvent::update(json!({
            "id": "9",
            "title": "Notes",
            "url": "https://example.com/notes"
        }));
        let change = decode_change::<QuickLink>(event).unwrap();
        assert_eq!(
            change,
            RecordChange::Update(QuickLink::with_id("9", "Notes", "https://example.com/notes"))
        );
    }

    #[test]
    fn test_decode_delete_numeric_id() {
        let event = ChangeEvent {
            kind: ChangeKind::Delete,
            new: None,
            old: Some(json!({ "id": 42 })),
        };
        let change = decode_change::<Student>(event).unwrap();
        assert_eq!(change, RecordChange::Delete { id: "42".into() });
    }

    #[test]
    fn test_decode_rejects_malformed_payloads() {
        let no_row = ChangeEvent {
            kind: ChangeKind::Insert,
            new: None,
            old: None,
        };
        assert!(decode_change::<Student>(no_row).is_err());

        let wrong_shape = ChangeEvent::insert(json!({ "title": 3 }));
        assert!(matches!(
            decode_change::<QuickLink>(wrong_shape),
            Err(RemoteError::Decode { collection: Collection::Links, .. })
        ));

        let no_id = ChangeEvent {
            kind: ChangeKind::Delete,
            new: None,
            old: Some(json!({})),
        };
        assert!(decode_change::<CustomSection>(no_id).is_err());
    }
}
