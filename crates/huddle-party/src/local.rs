//! Settings kept on this device only.
//!
//! Stored as a small JSON file on this device. None of it is ever written
//! to the shared document.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::Result;
use crate::theme::Theme;

/// Per-device settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    pub theme: Theme,
}

impl LocalSettings {
    /// Load settings from `path`.
    ///
    /// A missing file gives the defaults. So does an unreadable one, with a
    /// warning, since losing a theme is not worth failing over.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No local settings yet");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring malformed local settings");
                Ok(Self::default())
            }
        }
    }

    /// Write settings to `path`, creating parent directories.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        debug!(path = %path.display(), theme = %self.theme, "Saved local settings");
        Ok(())
    }
}
