//! Seed data used when local storage holds nothing for a collection

use std::collections::BTreeMap;

use crate::models::{CustomSection, QuickLink, Student, TeacherProfile};

pub fn teacher() -> TeacherProfile {
    TeacherProfile {
        name: "Sir Sandeep Baghel".to_string(),
        photo: "https://picsum.photos/400/400?random=1".to_string(),
        bio: "Passionate mathematics educator with 7 years of experience in mentoring \
              students for competitive exams and boards. Believes in conceptual clarity \
              and analytical thinking."
            .to_string(),
        tagline: "Simplifying Math, One Concept at a Time.".to_string(),
        years_exp: "7+".to_string(),
        students_count: "5k+".to_string(),
        success_rate: "98%".to_string(),
    }
}

pub fn students() -> Vec<Student> {
    vec![
        student(
            "1",
            "Aryan Sharma",
            "MS1001",
            "Class 12",
            "2023",
            10,
            "Secured 95% in Mathematics. Grateful for Sir's mentorship!",
            &[("Mathematics", 95.0), ("Physics", 92.0), ("Chemistry", 88.0)],
            true,
        ),
        student(
            "2",
            "Priya Verma",
            "MS1002",
            "Class 12",
            "2023",
            11,
            "Sir made Calculus feel like a breeze. Top scorer in the district.",
            &[("Mathematics", 98.0), ("Physics", 90.0), ("Chemistry", 91.0)],
            true,
        ),
        student(
            "3",
            "Rahul Mehta",
            "MS1003",
            "Standard 10",
            "2021",
            12,
            "Best foundation builder. Highly recommended!",
            &[("Mathematics", 100.0), ("Science", 95.0)],
            true,
        ),
        student(
            "4",
            "Sneha Gupta",
            "MS1004",
            "JEE Batch",
            "2022",
            13,
            "Cleared JEE Mains with a 99.5 percentile in Math.",
            &[("Math Percentile", 99.5)],
            false,
        ),
    ]
}

pub fn links() -> Vec<QuickLink> {
    vec![
        QuickLink::with_id("1", "Class Schedule", "#"),
        QuickLink::with_id("2", "WhatsApp Group", "#"),
        QuickLink::with_id("3", "Latest Lessons", "#"),
    ]
}

pub fn sections() -> Vec<CustomSection> {
    Vec::new()
}

#[allow(clippy::too_many_arguments)]
fn student(
    id: &str,
    name: &str,
    roll_no: &str,
    class: &str,
    year: &str,
    photo_seed: u32,
    bio: &str,
    marks: &[(&str, f64)],
    is_featured: bool,
) -> Student {
    let mut student = Student::with_id(id, name, roll_no, class, year);
    student.photo = format!("https://picsum.photos/150/150?random={}", photo_seed);
    student.bio = bio.to_string();
    student.is_featured = is_featured;
    student.set_marks(
        marks
            .iter()
            .map(|(subject, score)| (subject.to_string(), *score))
            .collect::<BTreeMap<_, _>>(),
    );
    student
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_totals_match_marks() {
        for student in students() {
            let sum: f64 = student.marks().values().sum();
            assert_eq!(student.total_marks(), sum, "student {}", student.id);
        }
    }

    #[test]
    fn test_seed_ids_are_unique() {
        let students = students();
        let mut ids: Vec<_> = students.iter().map(|s| s.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), students.len());
        assert_eq!(students[0].name, "Aryan Sharma");
        assert_eq!(links().len(), 3);
        assert!(sections().is_empty());
    }
}
