//! Logout command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::output;
use crate::session::SessionFile;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub fn run(_args: LogoutArgs, file: &SessionFile) -> Result<()> {
    let Some(client) = file.load().context("Failed to load session")? else {
        output::success("Not logged in");
        return Ok(());
    };

    client.logout();
    file.save(&client).context("Failed to remove session")?;

    output::success("Logged out");
    Ok(())
}
