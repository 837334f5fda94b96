//! Refresh command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::output;
use crate::session::{self, SessionFile};

#[derive(Args, Debug)]
pub struct RefreshArgs {}

pub async fn run(_args: RefreshArgs, file: &SessionFile) -> Result<()> {
    let client = session::require(file)?;

    eprintln!("{}", "Refreshing session...".dimmed());

    let result = client.refresh().await;

    // Mirror whatever the renewal left behind: rotated tokens or nothing.
    file.save(&client).context("Failed to save session")?;
    result.map_err(|e| session::explain(e, "Failed to refresh session"))?;

    output::success("Session refreshed successfully");
    Ok(())
}
