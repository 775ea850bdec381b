//! Realtime merge rules
//!
//! Pure functions from (current collection, decoded change) to the next
//! collection value. `None` means the change leaves the collection as is,
//! so nothing needs to be committed.

use crate::models::{Collection, TeacherProfile};
use crate::remote::{Record, RecordChange};

/// Where an inserted record lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertAt {
    Front,
    Back,
}

impl InsertAt {
    /// Students are listed newest first; everything else in creation order
    pub fn for_collection(collection: Collection) -> Self {
        match collection {
            Collection::Students => InsertAt::Front,
            _ => InsertAt::Back,
        }
    }
}

/// Apply a change to a keyed collection
///
/// An INSERT whose id is already present replaces that element in place,
/// so a client's own echoed insert never duplicates.
pub fn merge_change<T: Record>(items: &[T], change: RecordChange<T>) -> Option<Vec<T>> {
    match change {
        RecordChange::Insert(record) => {
            if let Some(next) = replace_by_id(items, record.clone()) {
                return Some(next);
            }
            if items.iter().any(|item| item.record_id() == record.record_id()) {
                return None;
            }
            let mut next = Vec::with_capacity(items.len() + 1);
            match InsertAt::for_collection(T::COLLECTION) {
                InsertAt::Front => {
                    next.push(record);
                    next.extend_from_slice(items);
                }
                InsertAt::Back => {
                    next.extend_from_slice(items);
                    next.push(record);
                }
            }
            Some(next)
        }
        RecordChange::Update(record) => replace_by_id(items, record),
        RecordChange::Delete { id } => {
            if !items.iter().any(|item| item.record_id() == id) {
                return None;
            }
            Some(
                items
                    .iter()
                    .filter(|item| item.record_id() != id)
                    .cloned()
                    .collect(),
            )
        }
    }
}

/// Replace the element with the record's id; `None` if absent or identical
fn replace_by_id<T: Record>(items: &[T], record: T) -> Option<Vec<T>> {
    let index = items
        .iter()
        .position(|item| item.record_id() == record.record_id())?;
    if items[index] == record {
        return None;
    }
    let mut next = items.to_vec();
    next[index] = record;
    Some(next)
}

/// Apply a change to the singleton teacher profile
///
/// Any INSERT or UPDATE is a full replace; deletes are ignored.
pub fn merge_teacher(
    current: &TeacherProfile,
    change: RecordChange<TeacherProfile>,
) -> Option<TeacherProfile> {
    match change {
        RecordChange::Insert(profile) | RecordChange::Update(profile) if &profile != current => {
            Some(profile)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuickLink, Student};
    use crate::seed;

    fn ids<T: Record>(items: &[T]) -> Vec<&str> {
        items.iter().map(Record::record_id).collect()
    }

    #[test]
    fn test_student_insert_prepends() {
        let students = seed::students();
        let new = Student::with_id("99", "Neha", "ROLL-1234", "Class 11", "2024");

        let next = merge_change(&students, RecordChange::Insert(new)).unwrap();
        assert_eq!(ids(&next), vec!["99", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_link_insert_appends() {
        let links = seed::links();
        let next = merge_change(
            &links,
            RecordChange::Insert(QuickLink::with_id("7", "Notes", "https://notes")),
        )
        .unwrap();
        assert_eq!(ids(&next), vec!["1", "2", "3", "7"]);
    }

    #[test]
    fn test_insert_of_known_id_replaces_in_place() {
        let links = seed::links();
        let next = merge_change(
            &links,
            RecordChange::Insert(QuickLink::with_id("2", "Group Chat", "https://chat")),
        )
        .unwrap();
        assert_eq!(ids(&next), vec!["1", "2", "3"]);
        assert_eq!(next[1].title, "Group Chat");

        // The same insert again changes nothing
        assert!(merge_change(&next, RecordChange::Insert(next[1].clone())).is_none());
    }

    #[test]
    fn test_update_is_idempotent() {
        let students = seed::students();
        let mut edited = students[1].clone();
        edited.set_mark("Mathematics", 100.0);

        let once = merge_change(&students, RecordChange::Update(edited.clone())).unwrap();
        assert!(merge_change(&once, RecordChange::Update(edited)).is_none());
        assert_eq!(once[1].total_marks(), 100.0 + 90.0 + 91.0);
    }

    #[test]
    fn test_update_of_unknown_id_is_ignored() {
        let students = seed::students();
        let stranger = Student::with_id("404", "Ghost", "ROLL-4040", "Class 9", "2020");
        assert!(merge_change(&students, RecordChange::Update(stranger)).is_none());
    }

    #[test]
    fn test_delete() {
        let students = seed::students();
        let next = merge_change(&students, RecordChange::Delete { id: "3".into() }).unwrap();
        assert_eq!(ids(&next), vec!["1", "2", "4"]);

        assert!(merge_change(&next, RecordChange::<Student>::Delete { id: "3".into() }).is_none());
    }

    #[test]
    fn test_teacher_replace() {
        let current = seed::teacher();
        let mut updated = current.clone();
        updated.tagline = "Math made simple".into();

        assert_eq!(
            merge_teacher(&current, RecordChange::Update(updated.clone())),
            Some(updated.clone())
        );
        assert!(merge_teacher(&updated, RecordChange::Update(updated.clone())).is_none());
        assert!(merge_teacher(&current, RecordChange::Delete { id: "main".into() }).is_none());
    }
}
