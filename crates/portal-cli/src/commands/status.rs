//! Status command handler

use anyhow::Result;

use portal_core::sync::FetchOutcome;
use portal_core::{Collection, Portal};

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(portal: &Portal, output: &Output) -> Result<()> {
    let flags = portal.flags();
    let store = portal.store();

    match output.format {
        OutputFormat::Json => {
            let hydration: Vec<_> = Collection::ALL
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "collection": c,
                        "outcome": describe(portal, *c),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "db_connected": flags.is_db_connected,
                    "syncing": flags.is_syncing,
                    "admin": flags.is_admin,
                    "hydration": hydration,
                    "failed_local_writes": store.failed_writes(),
                    "counts": {
                        "students": store.students().len(),
                        "links": store.links().len(),
                        "sections": store.sections().len()
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!(
                "{}",
                if flags.is_db_connected {
                    "connected"
                } else {
                    "offline"
                }
            );
        }
        OutputFormat::Human => {
            println!("Portal Status");
            println!("=============");
            println!();
            println!("Remote store:");
            println!(
                "  Status: {}",
                if flags.is_db_connected {
                    "connected"
                } else {
                    "offline (local data)"
                }
            );
            for collection in Collection::ALL {
                println!("  {:<16} {}", collection.to_string(), describe(portal, collection));
            }
            println!();
            println!("Session:");
            println!("  Admin: {}", if flags.is_admin { "yes" } else { "no" });
            if store.failed_writes() > 0 {
                println!("  Failed local writes: {}", store.failed_writes());
            }
            println!();
            println!("Contents:");
            println!("  Teacher:  {}", store.teacher().name);
            println!("  Students: {}", store.students().len());
            println!("  Links:    {}", store.links().len());
            println!("  Sections: {}", store.sections().len());
        }
    }

    Ok(())
}

fn describe(portal: &Portal, collection: Collection) -> String {
    match portal
        .hydration_report()
        .and_then(|report| report.outcome(collection))
    {
        Some(FetchOutcome::Applied(count)) => format!("loaded {} from remote", count),
        Some(FetchOutcome::Empty) => "remote empty, kept local".to_string(),
        Some(FetchOutcome::Failed(e)) => format!("fetch failed: {}", e),
        None => "not fetched".to_string(),
    }
}
