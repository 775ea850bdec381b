//! Teacher profile command handlers

use anyhow::{Context, Result};

use portal_core::{Portal, PortalError, TeacherProfile};

use crate::output::Output;

/// Profile fields to overwrite
#[derive(Debug, Default)]
pub struct TeacherChanges {
    pub name: Option<String>,
    pub photo: Option<String>,
    pub bio: Option<String>,
    pub tagline: Option<String>,
    pub years_exp: Option<String>,
    pub students_count: Option<String>,
    pub success_rate: Option<String>,
}

impl TeacherChanges {
    fn apply(self, teacher: &mut TeacherProfile) -> bool {
        let mut changed = false;
        let fields = [
            (self.name, &mut teacher.name),
            (self.photo, &mut teacher.photo),
            (self.bio, &mut teacher.bio),
            (self.tagline, &mut teacher.tagline),
            (self.years_exp, &mut teacher.years_exp),
            (self.students_count, &mut teacher.students_count),
            (self.success_rate, &mut teacher.success_rate),
        ];
        for (value, field) in fields {
            if let Some(value) = value {
                *field = value;
                changed = true;
            }
        }
        changed
    }
}

/// Show the teacher profile
pub fn show(portal: &Portal, output: &Output) -> Result<()> {
    output.print_teacher(portal.teacher());
    Ok(())
}

/// Save profile changes and report whether the remote save succeeded
pub async fn set(portal: &mut Portal, changes: TeacherChanges, output: &Output) -> Result<()> {
    let mut teacher = portal.teacher().clone();
    if !changes.apply(&mut teacher) {
        output.message("No changes.");
        return Ok(());
    }

    match portal.save_teacher(teacher).await {
        Ok(()) => output.success("Profile saved to the database"),
        Err(PortalError::Offline) => {
            output.success("Profile saved locally");
            output.warn("Remote store is not configured; the profile was not published");
        }
        Err(PortalError::Remote(e)) => {
            output.success("Profile saved locally");
            output.warn(&format!("Failed to save the profile remotely: {}", e));
        }
        Err(e) => return Err(e).context("Failed to save profile"),
    }
    Ok(())
}
