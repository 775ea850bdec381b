//! Data models for the portal
//!
//! Defines the four entity collections (teacher profile, students, quick
//! links, custom sections) plus chat messages. Field names serialize in
//! camelCase so local snapshots and remote rows share one shape.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Key of the singleton teacher profile row
pub const TEACHER_KEY: &str = "main";

/// Photo used when a new student is created without one
pub const DEFAULT_STUDENT_PHOTO: &str = "https://picsum.photos/150/150";

/// Roll number shown to non-admin viewers
pub const MASKED_ROLL_NO: &str = "••••••";

/// The four named collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    TeacherProfile,
    Students,
    Links,
    Sections,
}

impl Collection {
    /// All collections, in push order
    pub const ALL: [Collection; 4] = [
        Collection::TeacherProfile,
        Collection::Students,
        Collection::Links,
        Collection::Sections,
    ];

    /// Table name in the remote store
    pub fn table_name(self) -> &'static str {
        match self {
            Collection::TeacherProfile => "teacher_profile",
            Collection::Students => "students",
            Collection::Links => "links",
            Collection::Sections => "sections",
        }
    }

    /// Key used by the local store
    pub fn local_key(self) -> &'static str {
        match self {
            Collection::TeacherProfile => "teacher",
            Collection::Students => "students",
            Collection::Links => "links",
            Collection::Sections => "sections",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Generate a new entity id from the current timestamp (milliseconds)
///
/// Ids are strictly increasing within a process, so two entities created
/// in the same millisecond still get distinct ids.
pub fn next_id() -> String {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_ID.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_ID.compare_exchange_weak(last, candidate, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return candidate.to_string(),
            Err(actual) => last = actual,
        }
    }
}

/// Generate a roll number of the form `ROLL-<1000..=9999>`
pub fn generate_roll_no() -> String {
    let n = (Uuid::new_v4().as_u128() % 9000) as u16 + 1000;
    format!("ROLL-{}", n)
}

/// The teacher profile shown on the public page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TeacherProfile {
    pub name: String,
    #[serde(default)]
    pub photo: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub years_exp: String,
    #[serde(default)]
    pub students_count: String,
    #[serde(default)]
    pub success_rate: String,
}

/// A titled URL attached to a student profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentLink {
    pub title: String,
    pub url: String,
}

impl StudentLink {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

impl Default for StudentLink {
    fn default() -> Self {
        Self::new("Social Page", "https://instagram.com/")
    }
}

/// Which field of a [`StudentLink`] to edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkField {
    Title,
    Url,
}

/// A student in the roster
///
/// `total_marks` is private: it is recomputed from `marks` on every marks
/// edit and on every decode, so it can never drift from the sum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "StudentRecord", into = "StudentRecord")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub roll_no: String,
    pub class: String,
    pub year: String,
    pub photo: String,
    pub bio: String,
    marks: BTreeMap<String, f64>,
    total_marks: f64,
    pub links: Vec<StudentLink>,
    pub is_featured: bool,
    pub is_visible: bool,
}

/// Serialized shape of a student (local snapshot and remote row)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentRecord {
    id: String,
    name: String,
    #[serde(default)]
    roll_no: String,
    #[serde(default)]
    class: String,
    #[serde(default)]
    year: String,
    #[serde(default)]
    photo: String,
    #[serde(default)]
    bio: String,
    #[serde(default, deserialize_with = "scores_or_zero")]
    marks: BTreeMap<String, f64>,
    #[serde(default, deserialize_with = "score_or_zero")]
    total_marks: f64,
    #[serde(default)]
    links: Option<Vec<StudentLink>>,
    #[serde(default)]
    is_featured: bool,
    #[serde(default = "default_true")]
    is_visible: bool,
}

fn default_true() -> bool {
    true
}

// serde_json writes non-finite floats as null
fn score_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn scores_or_zero<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, f64>, D::Error> {
    let scores = BTreeMap::<String, Option<f64>>::deserialize(deserializer)?;
    Ok(scores
        .into_iter()
        .map(|(subject, score)| (subject, score.unwrap_or(0.0)))
        .collect())
}

/// Whether the scores and their sum are all finite
fn scores_are_finite<'a>(scores: impl IntoIterator<Item = &'a f64>) -> bool {
    let mut total = 0.0_f64;
    for score in scores {
        if !score.is_finite() {
            return false;
        }
        total += score;
    }
    total.is_finite()
}

impl From<StudentRecord> for Student {
    fn from(record: StudentRecord) -> Self {
        // The stored total is discarded; it is derived from marks
        let mut student = Student {
            id: record.id,
            name: record.name,
            roll_no: record.roll_no,
            class: record.class,
            year: record.year,
            photo: record.photo,
            bio: record.bio,
            marks: record.marks,
            total_marks: 0.0,
            links: record.links.unwrap_or_default(),
            is_featured: record.is_featured,
            is_visible: record.is_visible,
        };
        student.recompute_total();
        student
    }
}

impl From<Student> for StudentRecord {
    fn from(student: Student) -> Self {
        StudentRecord {
            id: student.id,
            name: student.name,
            roll_no: student.roll_no,
            class: student.class,
            year: student.year,
            photo: student.photo,
            bio: student.bio,
            marks: student.marks,
            total_marks: student.total_marks,
            links: Some(student.links),
            is_featured: student.is_featured,
            is_visible: student.is_visible,
        }
    }
}

impl Student {
    /// Build a student with explicit identity fields
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        roll_no: impl Into<String>,
        class: impl Into<String>,
        year: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            roll_no: roll_no.into(),
            class: class.into(),
            year: year.into(),
            photo: DEFAULT_STUDENT_PHOTO.to_string(),
            bio: String::new(),
            marks: BTreeMap::new(),
            total_marks: 0.0,
            links: Vec::new(),
            is_featured: false,
            is_visible: true,
        }
    }

    /// Scores by subject
    pub fn marks(&self) -> &BTreeMap<String, f64> {
        &self.marks
    }

    /// Sum of all scores
    pub fn total_marks(&self) -> f64 {
        self.total_marks
    }

    /// Replace all scores
    ///
    /// Rejected, leaving the scores untouched, if any score or the total
    /// would not be finite.
    pub fn set_marks(&mut self, marks: BTreeMap<String, f64>) -> bool {
        if !scores_are_finite(marks.values()) {
            return false;
        }
        self.marks = marks;
        self.recompute_total();
        true
    }

    /// Set the score for a subject, inserting it if missing
    ///
    /// Same finiteness rule as [`Student::set_marks`].
    pub fn set_mark(&mut self, subject: impl Into<String>, value: f64) -> bool {
        let subject = subject.into();
        let others = self
            .marks
            .iter()
            .filter(|(name, _)| **name != subject)
            .map(|(_, score)| score);
        if !scores_are_finite(others.chain(std::iter::once(&value))) {
            return false;
        }
        self.marks.insert(subject, value);
        self.recompute_total();
        true
    }

    /// Add a subject with a zero score
    ///
    /// An existing subject with the same name is reset to zero. Blank names
    /// are ignored.
    pub fn add_subject(&mut self, subject: &str) -> bool {
        let subject = subject.trim();
        if subject.is_empty() {
            return false;
        }
        self.set_mark(subject, 0.0)
    }

    /// Remove a subject and its score
    pub fn remove_subject(&mut self, subject: &str) -> bool {
        let removed = self.marks.remove(subject).is_some();
        if removed {
            self.recompute_total();
        }
        removed
    }

    /// Append a link
    pub fn add_link(&mut self, link: StudentLink) {
        self.links.push(link);
    }

    /// Edit one field of the link at `index`
    pub fn update_link(&mut self, index: usize, field: LinkField, value: impl Into<String>) -> bool {
        let Some(link) = self.links.get_mut(index) else {
            return false;
        };
        match field {
            LinkField::Title => link.title = value.into(),
            LinkField::Url => link.url = value.into(),
        }
        true
    }

    /// Remove the link at `index`, keeping the remaining order
    pub fn remove_link(&mut self, index: usize) -> bool {
        if index >= self.links.len() {
            return false;
        }
        self.links = self
            .links
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, link)| link.clone())
            .collect();
        true
    }

    /// Roll number as shown to the given viewer
    pub fn display_roll_no(&self, is_admin: bool) -> &str {
        if is_admin {
            &self.roll_no
        } else {
            MASKED_ROLL_NO
        }
    }

    fn recompute_total(&mut self) {
        self.total_marks = self.marks.values().sum();
    }
}

/// The "new entry" form for a student
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub name: String,
    pub class: String,
    pub year: String,
    pub photo: String,
    pub bio: String,
    pub marks: BTreeMap<String, f64>,
    pub links: Vec<StudentLink>,
    pub is_featured: bool,
}

impl Default for NewStudent {
    fn default() -> Self {
        let mut marks = BTreeMap::new();
        marks.insert("Mathematics".to_string(), 0.0);
        Self {
            name: String::new(),
            class: String::new(),
            year: "2024".to_string(),
            photo: String::new(),
            bio: String::new(),
            marks,
            links: Vec::new(),
            is_featured: false,
        }
    }
}

impl NewStudent {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            ..Self::default()
        }
    }

    /// Whether name and class are filled in and every score is finite
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.class.trim().is_empty()
            && scores_are_finite(self.marks.values())
    }

    /// Turn the form into a student with a fresh id and roll number
    ///
    /// Returns `None` if the form is not valid.
    pub fn build(self) -> Option<Student> {
        if !self.is_valid() {
            return None;
        }
        let photo = if self.photo.is_empty() {
            DEFAULT_STUDENT_PHOTO.to_string()
        } else {
            self.photo
        };
        let mut student = Student::with_id(
            next_id(),
            self.name,
            generate_roll_no(),
            self.class,
            self.year,
        );
        student.photo = photo;
        student.bio = self.bio;
        student.links = self.links;
        student.is_featured = self.is_featured;
        if !student.set_marks(self.marks) {
            return None;
        }
        Some(student)
    }
}

/// A navigation link on the public page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuickLink {
    pub id: String,
    pub title: String,
    pub url: String,
}

impl QuickLink {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: next_id(),
            title: title.into(),
            url: url.into(),
        }
    }

    pub fn with_id(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
        }
    }

    /// Title and URL are both required
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }
}

/// Colour theme of a custom section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SectionTheme {
    #[default]
    Light,
    Dark,
    Amber,
}

impl std::str::FromStr for SectionTheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(SectionTheme::Light),
            "dark" => Ok(SectionTheme::Dark),
            "amber" => Ok(SectionTheme::Amber),
            other => Err(format!("unknown theme '{}' (expected light, dark or amber)", other)),
        }
    }
}

impl fmt::Display for SectionTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionTheme::Light => "light",
            SectionTheme::Dark => "dark",
            SectionTheme::Amber => "amber",
        };
        f.write_str(name)
    }
}

/// A free-form content block on the public page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomSection {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub theme: SectionTheme,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

impl CustomSection {
    /// A new section with placeholder text
    pub fn placeholder() -> Self {
        Self {
            id: next_id(),
            title: "New Portal Highlight".to_string(),
            content: "Click edit to change this content...".to_string(),
            image: None,
            theme: SectionTheme::Light,
            is_visible: true,
        }
    }

    /// Apply a partial update
    pub fn apply(&mut self, patch: &SectionPatch) {
        if let Some(ref title) = patch.title {
            self.title = title.clone();
        }
        if let Some(ref content) = patch.content {
            self.content = content.clone();
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(is_visible) = patch.is_visible {
            self.is_visible = is_visible;
        }
    }
}

/// Subset of section fields to update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub theme: Option<SectionTheme>,
    pub is_visible: Option<bool>,
}

impl SectionPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.theme.is_none()
            && self.is_visible.is_none()
    }
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One turn of a chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_total_tracks_marks_edits() {
        let mut student = Student::with_id("s1", "Asha", "ROLL-1000", "Class 12", "2024");
        assert_eq!(student.total_marks(), 0.0);

        student.set_marks(marks(&[("Mathematics", 90.0), ("Physics", 80.5)]));
        assert_eq!(student.total_marks(), 170.5);

        student.set_mark("Physics", 70.0);
        assert_eq!(student.total_marks(), 160.0);

        assert!(student.add_subject("Chemistry"));
        assert_eq!(student.marks().len(), 3);
        assert_eq!(student.total_marks(), 160.0);

        student.set_mark("Chemistry", 40.0);
        assert!(student.remove_subject("Mathematics"));
        assert_eq!(student.total_marks(), 110.0);
    }

    #[test]
    fn test_add_duplicate_subject_overwrites() {
        let mut student = Student::with_id("s1", "Asha", "ROLL-1000", "Class 12", "2024");
        student.set_mark("Mathematics", 95.0);

        assert!(student.add_subject("Mathematics"));
        assert_eq!(student.marks().len(), 1);
        assert_eq!(student.total_marks(), 0.0);
        assert!(!student.add_subject("   "));
    }

    #[test]
    fn test_decode_recomputes_stale_total() {
        let json = r#"{
            "id": "7",
            "name": "Kiran",
            "rollNo": "MS1007",
            "class": "Class 10",
            "year": "2022",
            "marks": {"Mathematics": 50, "Science": 25},
            "totalMarks": 999,
            "isFeatured": true,
            "isVisible": false
        }"#;

        let student: Student = serde_json::from_str(json).unwrap();
        assert_eq!(student.total_marks(), 75.0);
        assert!(student.links.is_empty());
        assert!(student.is_featured);
        assert!(!student.is_visible);
    }

    #[test]
    fn test_non_finite_scores_are_rejected() {
        let mut student = Student::with_id("s1", "Asha", "ROLL-1000", "Class 12", "2024");
        assert!(student.set_mark("Mathematics", 1e308));

        assert!(!student.set_mark("Physics", 1e308));
        assert!(!student.set_mark("Physics", f64::NAN));
        assert!(!student.set_marks(marks(&[("Physics", f64::INFINITY)])));
        assert_eq!(student.marks().len(), 1);
        assert_eq!(student.total_marks(), 1e308);

        // Replacing the large score itself is fine
        assert!(student.set_mark("Mathematics", 2.0));
        assert_eq!(student.total_marks(), 2.0);

        let mut form = NewStudent::new("Neha", "Class 9");
        form.marks = marks(&[("Mathematics", f64::NEG_INFINITY)]);
        assert!(!form.is_valid());
        assert!(form.build().is_none());
    }

    #[test]
    fn test_decode_tolerates_null_scores() {
        let json = r#"{
            "id": "8",
            "name": "Ravi",
            "marks": {"Mathematics": 40, "Physics": null},
            "totalMarks": null
        }"#;

        let student: Student = serde_json::from_str(json).unwrap();
        assert_eq!(student.marks()["Physics"], 0.0);
        assert_eq!(student.total_marks(), 40.0);
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut student = Student::with_id("1", "Asha", "ROLL-1000", "Class 12", "2024");
        student.set_mark("Mathematics", 10.0);

        let value = serde_json::to_value(&student).unwrap();
        assert_eq!(value["rollNo"], "ROLL-1000");
        assert_eq!(value["totalMarks"], 10.0);
        assert_eq!(value["isVisible"], true);
        assert!(value.get("roll_no").is_none());
    }

    #[test]
    fn test_remove_link_keeps_order() {
        let mut student = Student::with_id("1", "Asha", "ROLL-1000", "Class 12", "2024");
        student.add_link(StudentLink::new("a", "https://a"));
        student.add_link(StudentLink::new("b", "https://b"));
        student.add_link(StudentLink::new("c", "https://c"));

        assert!(student.remove_link(1));
        let titles: Vec<_> = student.links.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c"]);
        assert!(!student.remove_link(5));
    }

    #[test]
    fn test_update_link_field() {
        let mut student = Student::with_id("1", "Asha", "ROLL-1000", "Class 12", "2024");
        student.add_link(StudentLink::default());

        assert!(student.update_link(0, LinkField::Url, "https://instagram.com/asha"));
        assert_eq!(student.links[0].title, "Social Page");
        assert_eq!(student.links[0].url, "https://instagram.com/asha");
        assert!(!student.update_link(3, LinkField::Title, "x"));
    }

    #[test]
    fn test_new_student_requires_name_and_class() {
        assert!(NewStudent::new("", "Class 12").build().is_none());
        assert!(NewStudent::new("Asha", "  ").build().is_none());

        let student = NewStudent::new("Asha", "Class 12").build().unwrap();
        assert!(!student.id.is_empty());
        assert!(student.roll_no.starts_with("ROLL-"));
        assert_eq!(student.roll_no.len(), "ROLL-".len() + 4);
        assert_eq!(student.photo, DEFAULT_STUDENT_PHOTO);
        assert_eq!(student.year, "2024");
        assert!(student.is_visible);
        assert_eq!(student.marks().get("Mathematics"), Some(&0.0));
    }

    #[test]
    fn test_next_id_is_unique() {
        let a = next_id();
        let b = next_id();
        assert_ne!(a, b);
        assert!(b.parse::<i64>().unwrap() > a.parse::<i64>().unwrap());
    }

    #[test]
    fn test_section_patch() {
        let mut section = CustomSection::placeholder();
        assert_eq!(section.theme, SectionTheme::Light);

        section.apply(&SectionPatch {
            theme: Some(SectionTheme::Amber),
            is_visible: Some(false),
            ..Default::default()
        });
        assert_eq!(section.theme, SectionTheme::Amber);
        assert!(!section.is_visible);
        assert_eq!(section.title, "New Portal Highlight");
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!("Dark".parse::<SectionTheme>().unwrap(), SectionTheme::Dark);
        assert!("purple".parse::<SectionTheme>().is_err());
    }

    #[test]
    fn test_masked_roll_no() {
        let student = Student::with_id("1", "Asha", "MS1001", "Class 12", "2023");
        assert_eq!(student.display_roll_no(true), "MS1001");
        assert_eq!(student.display_roll_no(false), MASKED_ROLL_NO);
    }
}
