//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use portal_core::models::MASKED_ROLL_NO;
use portal_core::{CustomSection, LinkKind, PendingAction, QuickLink, Student, TeacherProfile};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single student with marks and links
    pub fn print_student(&self, student: &Student, is_admin: bool) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", student.id);
                println!("Name:     {}", student.name);
                println!("Roll No:  {}", student.display_roll_no(is_admin));
                println!("Class:    {}", student.class);
                println!("Year:     {}", student.year);
                println!("Photo:    {}", student.photo);
                if !student.bio.is_empty() {
                    println!("Bio:      {}", student.bio);
                }
                println!("Featured: {}", yes_no(student.is_featured));
                println!("Visible:  {}", yes_no(student.is_visible));

                println!();
                println!("── Marks (total {}) ──", format_score(student.total_marks()));
                if student.marks().is_empty() {
                    println!("No marks recorded.");
                }
                for (subject, score) in student.marks() {
                    println!("{:<20} {}", truncate(subject, 20), format_score(*score));
                }

                if !student.links.is_empty() {
                    println!();
                    println!("── Links ({}) ──", student.links.len());
                    for (index, link) in student.links.iter().enumerate() {
                        println!("[{}] {} - {}", index, link.title, link.url);
                    }
                }
            }
            OutputFormat::Json => print_json(&for_viewer(student, is_admin)),
            OutputFormat::Quiet => println!("{}", student.id),
        }
    }

    /// Print a list of students
    pub fn print_students(&self, students: &[&Student], is_admin: bool) {
        match self.format {
            OutputFormat::Human => {
                if students.is_empty() {
                    println!("No students found.");
                    return;
                }
                for student in students {
                    let mut badges = String::new();
                    if student.is_featured {
                        badges.push_str(" ★");
                    }
                    if !student.is_visible {
                        badges.push_str(" (hidden)");
                    }
                    println!(
                        "{} | {}{} | {} | {} {} | {}",
                        student.id,
                        truncate(&student.name, 25),
                        badges,
                        student.display_roll_no(is_admin),
                        student.class,
                        student.year,
                        format_score(student.total_marks())
                    );
                }
                println!("\n{} student(s)", students.len());
            }
            OutputFormat::Json => {
                let students: Vec<Student> = students
                    .iter()
                    .map(|s| for_viewer(s, is_admin))
                    .collect();
                print_json(&students);
            }
            OutputFormat::Quiet => {
                for student in students {
                    println!("{}", student.id);
                }
            }
        }
    }

    /// Print quick links with their icon category
    pub fn print_links(&self, links: &[QuickLink]) {
        match self.format {
            OutputFormat::Human => {
                if links.is_empty() {
                    println!("No links found.");
                    return;
                }
                for link in links {
                    println!(
                        "{} | {:<8} | {} | {}",
                        link.id,
                        kind_label(LinkKind::classify(link)),
                        truncate(&link.title, 30),
                        truncate(&link.url, 45)
                    );
                }
                println!("\n{} link(s)", links.len());
            }
            OutputFormat::Json => {
                let links: Vec<_> = links
                    .iter()
                    .map(|link| {
                        serde_json::json!({
                            "id": link.id,
                            "title": link.title,
                            "url": link.url,
                            "kind": LinkKind::classify(link),
                        })
                    })
                    .collect();
                print_json(&links);
            }
            OutputFormat::Quiet => {
                for link in links {
                    println!("{}", link.id);
                }
            }
        }
    }

    /// Print custom sections
    pub fn print_sections(&self, sections: &[&CustomSection]) {
        match self.format {
            OutputFormat::Human => {
                if sections.is_empty() {
                    println!("No sections found.");
                    return;
                }
                for section in sections {
                    println!("────────────────────────────────────────");
                    println!(
                        "ID: {}  Theme: {}{}",
                        section.id,
                        section.theme,
                        if section.is_visible { "" } else { "  (hidden)" }
                    );
                    println!("Title: {}", section.title);
                    if let Some(ref image) = section.image {
                        println!("Image: {}", image);
                    }
                    println!();
                    println!("{}", section.content);
                    println!();
                }
                println!("{} section(s)", sections.len());
            }
            OutputFormat::Json => print_json(&sections),
            OutputFormat::Quiet => {
                for section in sections {
                    println!("{}", section.id);
                }
            }
        }
    }

    /// Print the teacher profile
    pub fn print_teacher(&self, teacher: &TeacherProfile) {
        match self.format {
            OutputFormat::Human => {
                println!("{}", teacher.name);
                if !teacher.tagline.is_empty() {
                    println!("\"{}\"", teacher.tagline);
                }
                println!();
                println!("Experience:   {}", teacher.years_exp);
                println!("Students:     {}", teacher.students_count);
                println!("Success rate: {}", teacher.success_rate);
                println!("Photo:        {}", teacher.photo);
                if !teacher.bio.is_empty() {
                    println!();
                    println!("{}", teacher.bio);
                }
            }
            OutputFormat::Json => print_json(teacher),
            OutputFormat::Quiet => println!("{}", teacher.name),
        }
    }

    /// Print a confirmation dialog
    pub fn print_pending(&self, action: &PendingAction) {
        match self.format {
            OutputFormat::Human => {
                println!("{}", action.title);
                println!("{}", action.message);
            }
            OutputFormat::Json => print_json(action),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (suppressed in quiet mode)
    pub fn warn(&self, message: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", message);
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

/// Copy of a student with the roll number masked for non-admin viewers
fn for_viewer(student: &Student, is_admin: bool) -> Student {
    let mut student = student.clone();
    if !is_admin {
        student.roll_no = MASKED_ROLL_NO.to_string();
    }
    student
}

fn kind_label(kind: LinkKind) -> &'static str {
    match kind {
        LinkKind::Chat => "chat",
        LinkKind::Video => "video",
        LinkKind::Schedule => "schedule",
        LinkKind::Document => "document",
        LinkKind::Web => "web",
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Format a score without a trailing ".0" for whole numbers
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        format!("{}", score)
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
