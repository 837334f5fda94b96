//! Persisted CLI session.

mod storage;

pub use storage::SessionFile;

use anyhow::{Context, Result, anyhow};

use authwire::Client;

/// Load the stored session or fail with a hint to log in.
pub fn require(file: &SessionFile) -> Result<Client> {
    file.load()
        .context("Failed to load session")?
        .context("No active session. Run 'authwire login' first.")
}

/// Turn a library error into a CLI error, with a re-login hint when the
/// session is gone.
pub fn explain(err: authwire::Error, action: &str) -> anyhow::Error {
    if err.is_session_expired() {
        anyhow!("Session expired. Run 'authwire login' again.")
    } else {
        anyhow::Error::new(err).context(action.to_string())
    }
}
