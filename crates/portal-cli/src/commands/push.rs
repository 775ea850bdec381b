//! Push command handler

use anyhow::{bail, Result};

use portal_core::{Portal, PortalError};

use crate::output::Output;

/// Upsert every collection into the remote store
pub async fn push(portal: &Portal, output: &Output) -> Result<()> {
    match portal.push_all().await {
        Ok(()) => {
            output.success("All data pushed to the remote store");
            Ok(())
        }
        Err(PortalError::Offline) => {
            bail!("Remote store is not configured. Set remote_url and remote_enabled first.")
        }
        Err(e) => Err(e.into()),
    }
}
