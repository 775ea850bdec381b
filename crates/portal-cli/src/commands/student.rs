//! Student command handlers

use anyhow::{anyhow, bail, Result};
use clap::Args;

use portal_core::{directory, LinkField, NewStudent, PendingKind, Portal, StudentLink};

use super::{parse_indexed, parse_mark, parse_pair, parse_score, resolve_pending};
use crate::editor::{confirm, is_interactive, prompt_with_default};
use crate::output::{format_score, Output};
use crate::ToggleField;

/// Optional fields of a new student
#[derive(Args, Debug, Default)]
pub struct StudentForm {
    /// Batch year
    #[arg(short = 'Y', long)]
    year: Option<String>,
    /// Photo URL
    #[arg(long)]
    photo: Option<String>,
    /// Short testimonial or bio
    #[arg(long)]
    bio: Option<String>,
    /// Score as SUBJECT=SCORE (repeatable; replaces the default subject)
    #[arg(short, long = "mark", value_parser = parse_mark)]
    marks: Vec<(String, f64)>,
    /// Link as TITLE=URL (repeatable)
    #[arg(short, long = "link", value_parser = parse_pair)]
    links: Vec<(String, String)>,
    /// Show in the featured strip
    #[arg(long)]
    featured: bool,
}

/// Field edits applied to the editor draft
#[derive(Args, Debug, Default)]
pub struct StudentChanges {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    class: Option<String>,
    #[arg(short = 'Y', long)]
    year: Option<String>,
    #[arg(long)]
    photo: Option<String>,
    #[arg(long)]
    bio: Option<String>,
    /// Set a score as SUBJECT=SCORE (repeatable)
    #[arg(short, long = "mark", value_parser = parse_mark)]
    marks: Vec<(String, f64)>,
    /// Add a subject with a zero score (repeatable)
    #[arg(long = "add-subject")]
    add_subjects: Vec<String>,
    /// Remove a subject (repeatable)
    #[arg(long = "remove-subject")]
    remove_subjects: Vec<String>,
    /// Add a link as TITLE=URL (repeatable)
    #[arg(long = "add-link", value_parser = parse_pair)]
    add_links: Vec<(String, String)>,
    /// Retitle the link at INDEX as INDEX=TITLE (repeatable)
    #[arg(long = "link-title", value_parser = parse_indexed)]
    link_titles: Vec<(usize, String)>,
    /// Change the URL of the link at INDEX as INDEX=URL (repeatable)
    #[arg(long = "link-url", value_parser = parse_indexed)]
    link_urls: Vec<(usize, String)>,
    /// Remove the link at INDEX (repeatable)
    #[arg(long = "remove-link")]
    remove_links: Vec<usize>,
}

impl StudentChanges {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.class.is_none()
            && self.year.is_none()
            && self.photo.is_none()
            && self.bio.is_none()
            && self.marks.is_empty()
            && self.add_subjects.is_empty()
            && self.remove_subjects.is_empty()
            && self.add_links.is_empty()
            && self.link_titles.is_empty()
            && self.link_urls.is_empty()
            && self.remove_links.is_empty()
    }
}

/// List students
pub fn list(portal: &Portal, output: &Output) -> Result<()> {
    let students: Vec<_> = if portal.is_admin() {
        portal.students().iter().collect()
    } else {
        directory::visible(portal.students())
    };
    output.print_students(&students, portal.is_admin());
    Ok(())
}

/// Show student details
pub fn show(portal: &Portal, id: &str, output: &Output) -> Result<()> {
    let student = portal
        .store()
        .student(id)
        .filter(|s| s.is_visible || portal.is_admin())
        .ok_or_else(|| anyhow!("Student not found: {}", id))?;
    output.print_student(student, portal.is_admin());
    Ok(())
}

/// Create a student
pub fn add(
    portal: &mut Portal,
    name: String,
    class: String,
    form: StudentForm,
    output: &Output,
) -> Result<()> {
    let mut new_student = NewStudent::new(name, class);
    if let Some(year) = form.year {
        new_student.year = year;
    }
    if let Some(photo) = form.photo {
        new_student.photo = photo;
    }
    if let Some(bio) = form.bio {
        new_student.bio = bio;
    }
    if !form.marks.is_empty() {
        new_student.marks = form.marks.into_iter().collect();
    }
    new_student.links = form
        .links
        .into_iter()
        .map(|(title, url)| StudentLink::new(title, url))
        .collect();
    new_student.is_featured = form.featured;

    let id = portal
        .create_student(new_student)?
        .ok_or_else(|| anyhow!("Name and class are required and the score total must be finite"))?;

    if output.is_quiet() {
        println!("{}", id);
    } else if let Some(student) = portal.store().student(&id) {
        output.success(&format!(
            "Added {} ({}) with id {}",
            student.name, student.roll_no, id
        ));
    }
    Ok(())
}

/// Edit a student through the draft editor
///
/// With no field changes, prompts for each basic field and asks before
/// saving; declining goes through the discard confirmation.
pub fn edit(
    portal: &mut Portal,
    id: &str,
    changes: StudentChanges,
    assume_yes: bool,
    output: &Output,
) -> Result<()> {
    portal.begin_edit(id)?;

    if changes.is_empty() {
        if !output.should_prompt() || !is_interactive() {
            bail!("No changes given. Pass field flags or run interactively.");
        }
        edit_interactive(portal)?;

        if !confirm("Save changes?")? {
            portal.request_discard_edit()?;
            if let Some(PendingKind::DiscardStudentEdit) =
                resolve_pending(portal, assume_yes, output)?
            {
                output.message("Changes discarded.");
                return Ok(());
            }
        }
    } else {
        apply_changes(portal, changes)?;
    }

    if portal.apply_edit()? {
        output.success(&format!("Updated student: {}", id));
    } else {
        output.message(&format!("Student {} no longer exists; nothing saved.", id));
    }
    Ok(())
}

fn apply_changes(portal: &mut Portal, changes: StudentChanges) -> Result<()> {
    let draft = portal.editing_mut()?;

    if let Some(name) = changes.name {
        draft.name = name;
    }
    if let Some(class) = changes.class {
        draft.class = class;
    }
    if let Some(year) = changes.year {
        draft.year = year;
    }
    if let Some(photo) = changes.photo {
        draft.photo = photo;
    }
    if let Some(bio) = changes.bio {
        draft.bio = bio;
    }
    for subject in &changes.remove_subjects {
        if !draft.remove_subject(subject) {
            bail!("No subject named '{}'", subject);
        }
    }
    for subject in &changes.add_subjects {
        draft.add_subject(subject);
    }
    for (subject, score) in changes.marks {
        if !draft.set_mark(subject.as_str(), score) {
            bail!("Score for {} would make the total too large", subject);
        }
    }

    // Field edits use indexes from before any removal
    let field_edits = changes
        .link_titles
        .into_iter()
        .map(|(index, value)| (index, LinkField::Title, value))
        .chain(
            changes
                .link_urls
                .into_iter()
                .map(|(index, value)| (index, LinkField::Url, value)),
        );
    for (index, field, value) in field_edits {
        if !draft.update_link(index, field, value) {
            bail!("No link at index {}", index);
        }
    }

    // Highest index first so earlier removals don't shift later ones
    let mut remove_links = changes.remove_links;
    remove_links.sort_unstable_by(|a, b| b.cmp(a));
    remove_links.dedup();
    for index in remove_links {
        if !draft.remove_link(index) {
            bail!("No link at index {}", index);
        }
    }
    for (title, url) in changes.add_links {
        draft.add_link(StudentLink::new(title, url));
    }
    Ok(())
}

fn edit_interactive(portal: &mut Portal) -> Result<()> {
    let draft = portal.editing_mut()?;

    if let Some(name) = prompt_with_default("Name", &draft.name)? {
        draft.name = name;
    }
    if let Some(class) = prompt_with_default("Class", &draft.class)? {
        draft.class = class;
    }
    if let Some(year) = prompt_with_default("Year", &draft.year)? {
        draft.year = year;
    }
    if let Some(bio) = prompt_with_default("Bio", &draft.bio)? {
        draft.bio = bio;
    }

    let subjects: Vec<(String, f64)> = draft
        .marks()
        .iter()
        .map(|(subject, score)| (subject.clone(), *score))
        .collect();
    for (subject, score) in subjects {
        if let Some(value) = prompt_with_default(&subject, &format_score(score))? {
            let value = parse_score(&value).map_err(|e| anyhow!("{} for {}", e, subject))?;
            if !draft.set_mark(subject.as_str(), value) {
                bail!("Score for {} would make the total too large", subject);
            }
        }
    }
    Ok(())
}

/// Flip visibility or the featured flag
pub fn toggle(portal: &mut Portal, id: &str, field: ToggleField, output: &Output) -> Result<()> {
    let message = match field {
        ToggleField::Visible => {
            if portal.toggle_visible(id)? {
                format!("Student {} is now visible", id)
            } else {
                format!("Student {} is now hidden", id)
            }
        }
        ToggleField::Featured => {
            if portal.toggle_featured(id)? {
                format!("Student {} is now featured", id)
            } else {
                format!("Student {} is no longer featured", id)
            }
        }
    };
    output.success(&message);
    Ok(())
}

/// Delete a student after confirmation
pub fn delete(portal: &mut Portal, id: &str, assume_yes: bool, output: &Output) -> Result<()> {
    portal.request_delete_student(id)?;
    if resolve_pending(portal, assume_yes, output)?.is_some() {
        output.success(&format!("Deleted student: {}", id));
    }
    Ok(())
}
