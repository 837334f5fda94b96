//! Session file persistence.
//!
//! The credential store is mirrored to a JSON file after every command and
//! rehydrated from it at startup. Rehydration goes through
//! [`Client::restore`], never around it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use authwire::{AccessToken, Client, ClientConfig, RefreshToken};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Stored session data.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    config: ClientConfig,
    access_token: String,
    refresh_token: Option<String>,
}

/// Location of the persisted session.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// Use `path` if given, the platform data directory otherwise.
    pub fn locate(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => {
                let dirs = ProjectDirs::from("", "", "authwire")
                    .context("Could not determine data directory")?;
                dirs.data_dir().join("session.json")
            }
        };
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the client's current credentials, or remove the file if the
    /// store is empty.
    pub fn save(&self, client: &Client) -> Result<()> {
        let snapshot = client.store().read();
        let Some(access_token) = snapshot.access_token() else {
            return self.remove();
        };

        let stored = StoredSession {
            config: client.config().clone(),
            access_token: access_token.as_str().to_string(),
            refresh_token: snapshot.refresh_token().map(|t| t.as_str().to_string()),
        };

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create data directory")?;
        }

        let json = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, &json).context("Failed to write session file")?;

        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)?;
        }

        tracing::debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    /// Rebuild a client from the session file, if there is one.
    pub fn load(&self) -> Result<Option<Client>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path).context("Failed to read session file")?;
        let stored: StoredSession = serde_json::from_str(&json).context("Invalid session file")?;

        let access_token =
            AccessToken::new(stored.access_token).context("Invalid access token in session")?;
        let refresh_token = stored
            .refresh_token
            .map(RefreshToken::new)
            .transpose()
            .context("Invalid refresh token in session")?;

        let client = Client::new(stored.config).context("Failed to build client")?;
        client.restore(access_token, refresh_token);
        Ok(Some(client))
    }

    /// Delete the session file.
    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to remove session file")?;
            tracing::debug!(path = %self.path.display(), "Session removed");
        }
        Ok(())
    }
}
