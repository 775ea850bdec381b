//! Custom section command handlers

use anyhow::{anyhow, Result};

use portal_core::{directory, Portal, SectionPatch};

use super::resolve_pending;
use crate::output::Output;

/// List sections
pub fn list(portal: &Portal, output: &Output) -> Result<()> {
    let sections: Vec<_> = if portal.is_admin() {
        portal.sections().iter().collect()
    } else {
        directory::visible_sections(portal.sections())
    };
    output.print_sections(&sections);
    Ok(())
}

/// Append a placeholder section
pub fn add(portal: &mut Portal, output: &Output) -> Result<()> {
    let id = portal.create_section()?;
    if output.is_quiet() {
        println!("{}", id);
    } else {
        output.success(&format!(
            "Added section {} (edit it with `portal section update {}`)",
            id, id
        ));
    }
    Ok(())
}

/// Apply a partial update
pub fn update(portal: &mut Portal, id: &str, patch: SectionPatch, output: &Output) -> Result<()> {
    if portal.store().section(id).is_none() {
        return Err(anyhow!("Section not found: {}", id));
    }
    if patch.is_empty() {
        output.message("No changes.");
        return Ok(());
    }
    portal.update_section(id, &patch)?;
    output.success(&format!("Updated section: {}", id));
    Ok(())
}

/// Delete a section after confirmation
pub fn delete(portal: &mut Portal, id: &str, assume_yes: bool, output: &Output) -> Result<()> {
    portal.request_delete_section(id)?;
    if resolve_pending(portal, assume_yes, output)?.is_some() {
        output.success(&format!("Deleted section: {}", id));
    }
    Ok(())
}
