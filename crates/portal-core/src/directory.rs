//! Public directory queries
//!
//! Read-only views of the roster as the public page shows it. Hidden
//! students and sections never appear here.

use serde::Serialize;

use crate::models::{CustomSection, QuickLink, Student};

/// Students shown in the featured strip
pub fn featured(students: &[Student]) -> Vec<&Student> {
    students
        .iter()
        .filter(|s| s.is_featured && s.is_visible)
        .collect()
}

/// Students shown in the scrolling marquee
pub fn visible(students: &[Student]) -> Vec<&Student> {
    students.iter().filter(|s| s.is_visible).collect()
}

pub fn visible_sections(sections: &[CustomSection]) -> Vec<&CustomSection> {
    sections.iter().filter(|s| s.is_visible).collect()
}

/// Search and filter settings of the results library
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryFilter {
    /// Case-insensitive match on name or roll number
    pub search: String,
    /// Exact class, or any class when `None`
    pub class: Option<String>,
    /// Exact year, or any year when `None`
    pub year: Option<String>,
}

impl DirectoryFilter {
    pub fn matches(&self, student: &Student) -> bool {
        if !student.is_visible {
            return false;
        }
        let query = self.search.to_lowercase();
        let matches_search = student.name.to_lowercase().contains(&query)
            || student.roll_no.to_lowercase().contains(&query);
        let matches_class = self.class.as_ref().map_or(true, |c| &student.class == c);
        let matches_year = self.year.as_ref().map_or(true, |y| &student.year == y);
        matches_search && matches_class && matches_year
    }

    pub fn apply<'a>(&self, students: &'a [Student]) -> Vec<&'a Student> {
        students.iter().filter(|s| self.matches(s)).collect()
    }
}

/// Distinct classes, ascending
///
/// Options come from every student, hidden ones included, so the filter
/// choices do not shift when visibility changes.
pub fn class_options(students: &[Student]) -> Vec<String> {
    let mut classes: Vec<String> = students.iter().map(|s| s.class.clone()).collect();
    classes.sort();
    classes.dedup();
    classes
}

/// Distinct years, newest first
pub fn year_options(students: &[Student]) -> Vec<String> {
    let mut years: Vec<String> = students.iter().map(|s| s.year.clone()).collect();
    years.sort_by(|a, b| b.cmp(a));
    years.dedup();
    years
}

/// Icon category of a quick link, guessed from its title and URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Chat,
    Video,
    Schedule,
    Document,
    Web,
}

impl LinkKind {
    pub fn classify(link: &QuickLink) -> Self {
        let title = link.title.to_lowercase();
        let url = link.url.to_lowercase();
        let in_title = |words: &[&str]| words.iter().any(|w| title.contains(w));
        let in_url = |words: &[&str]| words.iter().any(|w| url.contains(w));

        if in_url(&["wa.me", "whatsapp"]) || in_title(&["whatsapp", "chat"]) {
            LinkKind::Chat
        } else if in_url(&["youtube", "youtu.be"]) || in_title(&["video", "youtube"]) {
            LinkKind::Video
        } else if in_title(&["schedule", "time", "class"]) {
            LinkKind::Schedule
        } else if in_url(&["drive.google", "docs.google"]) || in_title(&["lesson", "file"]) {
            LinkKind::Document
        } else {
            LinkKind::Web
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    fn names<'a>(students: &[&'a Student]) -> Vec<&'a str> {
        students.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_featured_excludes_hidden() {
        let mut students = seed::students();
        students[1].is_visible = false;

        assert_eq!(names(&featured(&students)), vec!["Aryan Sharma", "Rahul Mehta"]);
        assert_eq!(visible(&students).len(), 3);
    }

    #[test]
    fn test_search_name_or_roll_no() {
        let students = seed::students();
        let filter = DirectoryFilter {
            search: "ms1003".into(),
            ..Default::default()
        };
        assert_eq!(names(&filter.apply(&students)), vec!["Rahul Mehta"]);

        let filter = DirectoryFilter {
            search: "SHARMA".into(),
            ..Default::default()
        };
        assert_eq!(names(&filter.apply(&students)), vec!["Aryan Sharma"]);
    }

    #[test]
    fn test_class_and_year_filters() {
        let students = seed::students();
        let filter = DirectoryFilter {
            class: Some("Class 12".into()),
            year: Some("2023".into()),
            ..Default::default()
        };
        assert_eq!(
            names(&filter.apply(&students)),
            vec!["Aryan Sharma", "Priya Verma"]
        );

        let filter = DirectoryFilter {
            year: Some("2019".into()),
            ..Default::default()
        };
        assert!(filter.apply(&students).is_empty());
    }

    #[test]
    fn test_filter_options() {
        let students = seed::students();
        assert_eq!(
            class_options(&students),
            vec!["Class 12", "JEE Batch", "Standard 10"]
        );
        assert_eq!(year_options(&students), vec!["2023", "2022", "2021"]);
    }

    #[test]
    fn test_link_kinds() {
        let links = seed::links();
        assert_eq!(LinkKind::classify(&links[0]), LinkKind::Schedule);
        assert_eq!(LinkKind::classify(&links[1]), LinkKind::Chat);
        assert_eq!(LinkKind::classify(&links[2]), LinkKind::Document);
        assert_eq!(
            LinkKind::classify(&QuickLink::with_id("9", "Revision", "https://youtu.be/x")),
            LinkKind::Video
        );
        assert_eq!(
            LinkKind::classify(&QuickLink::with_id("9", "Blog", "https://example.com")),
            LinkKind::Web
        );
    }

    #[test]
    fn test_visible_sections() {
        let mut hidden = crate::models::CustomSection::placeholder();
        hidden.is_visible = false;
        let shown = crate::models::CustomSection::placeholder();
        let sections = vec![hidden, shown.clone()];
        assert_eq!(visible_sections(&sections), vec![&shown]);
    }
}
