//! Whoami command implementation.

use anyhow::Result;
use clap::Args;

use crate::output;
use crate::session::{self, SessionFile};

#[derive(Args, Debug)]
pub struct WhoamiArgs {}

pub fn run(_args: WhoamiArgs, file: &SessionFile) -> Result<()> {
    let client = session::require(file)?;
    let snapshot = client.store().read();

    output::field("API", client.config().base_url.as_str());
    output::field(
        "Authenticated",
        if snapshot.is_authenticated() { "yes" } else { "no" },
    );
    output::field(
        "Refresh token",
        if snapshot.refresh_token().is_some() {
            "present"
        } else {
            "absent"
        },
    );
    output::field("Session file", &file.path().display().to_string());

    Ok(())
}
