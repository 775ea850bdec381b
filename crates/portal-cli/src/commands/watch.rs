//! Watch command handler

use anyhow::{bail, Result};
use tracing::debug;

use portal_core::{AppliedChange, Portal};

use crate::output::{Output, OutputFormat};

/// Apply realtime changes as they arrive until Ctrl-C
pub async fn watch(portal: &mut Portal, output: &Output) -> Result<()> {
    if !portal.flags().is_db_connected {
        bail!("Not connected to the remote store; nothing to watch");
    }
    output.message("Watching for changes (Ctrl-C to stop)...");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
            change = portal.next_realtime() => {
                match change {
                    Some(change) => report(portal, change, output),
                    None => {
                        output.warn("Realtime feed closed");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

fn report(portal: &Portal, change: AppliedChange, output: &Output) {
    match output.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "collection": change.collection,
                "event": change.kind.as_str(),
                "changed": change.changed,
            })
        ),
        OutputFormat::Quiet => {}
        OutputFormat::Human => {
            if !change.changed {
                return;
            }
            let size = match change.collection {
                portal_core::Collection::Students => portal.students().len(),
                portal_core::Collection::Links => portal.links().len(),
                portal_core::Collection::Sections => portal.sections().len(),
                portal_core::Collection::TeacherProfile => 1,
            };
            println!(
                "{} {} ({} record(s))",
                change.kind.as_str(),
                change.collection,
                size
            );
        }
    }
}
