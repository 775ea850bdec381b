//! Quick link command handlers

use anyhow::{anyhow, Result};

use portal_core::Portal;

use super::resolve_pending;
use crate::output::Output;

/// List quick links
pub fn list(portal: &Portal, output: &Output) -> Result<()> {
    output.print_links(portal.links());
    Ok(())
}

/// Append a quick link
pub fn add(portal: &mut Portal, title: String, url: String, output: &Output) -> Result<()> {
    let id = portal
        .create_link(title.trim(), url.trim())?
        .ok_or_else(|| anyhow!("Title and URL are required"))?;

    if output.is_quiet() {
        println!("{}", id);
    } else {
        output.success(&format!("Added link: {} ({})", title.trim(), id));
    }
    Ok(())
}

/// Change a link's title or URL
pub fn edit(
    portal: &mut Portal,
    id: &str,
    title: Option<String>,
    url: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut link = portal
        .store()
        .link(id)
        .cloned()
        .ok_or_else(|| anyhow!("Link not found: {}", id))?;

    if title.is_none() && url.is_none() {
        output.message("No changes.");
        return Ok(());
    }
    if let Some(title) = title {
        link.title = title.trim().to_string();
    }
    if let Some(url) = url {
        link.url = url.trim().to_string();
    }

    portal
        .save_link(link)?
        .ok_or_else(|| anyhow!("Title and URL cannot be empty"))?;
    output.success(&format!("Updated link: {}", id));
    Ok(())
}

/// Delete a link after confirmation
pub fn delete(portal: &mut Portal, id: &str, assume_yes: bool, output: &Output) -> Result<()> {
    portal.request_delete_link(id)?;
    if resolve_pending(portal, assume_yes, output)?.is_some() {
        output.success(&format!("Deleted link: {}", id));
    }
    Ok(())
}
