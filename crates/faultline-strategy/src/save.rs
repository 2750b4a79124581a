//! Form snapshot persistence
//!
//! The `save` strategy serializes the page's non-password form fields into
//! a [`FormSnapshot`] and persists it through an
//! [`ISnapshotStore`]. The default store writes JSON files under the XDG
//! data directory, one file per snapshot.

use std::path::PathBuf;

use chrono::Utc;
use tracing::debug;

use faultline_core::ports::recovery::{FormSnapshot, ISnapshotStore};

/// Derives a unique snapshot key from the page path and the current time
///
/// Example: `/checkout/payment` → `form--checkout-payment-20260829T141503`.
pub fn snapshot_key(page_path: &str) -> String {
    let sanitized: String = page_path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("form-{}-{}", sanitized, Utc::now().format("%Y%m%dT%H%M%S"))
}

/// JSON-file snapshot store
///
/// One `{key}.json` file per snapshot in a flat directory.
pub struct FileSnapshotStore {
    snapshots_dir: PathBuf,
}

impl FileSnapshotStore {
    /// Creates a store rooted at `snapshots_dir`
    pub fn new(snapshots_dir: PathBuf) -> Self {
        Self { snapshots_dir }
    }

    /// Returns the default snapshots directory
    ///
    /// Typically `~/.local/share/faultline/snapshots` on Linux.
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("faultline")
            .join("snapshots")
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.snapshots_dir.join(format!("{key}.json"))
    }
}

#[async_trait::async_trait]
impl ISnapshotStore for FileSnapshotStore {
    async fn save(&self, key: &str, snapshot: &FormSnapshot) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.snapshots_dir)?;
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(self.path_for(key), json)?;
        debug!(key, "Form snapshot saved");
        Ok(())
    }

    async fn load(&self, key: &str) -> anyhow::Result<Option<FormSnapshot>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let snapshot: FormSnapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }

    async fn list(&self) -> anyhow::Result<Vec<String>> {
        if !self.snapshots_dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.snapshots_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                keys.push(
                    path.file_stem()
                        .unwrap_or_default()
                        .to_string_lossy()
                        .to_string(),
                );
            }
        }

        // Keys embed a sortable timestamp suffix; newest first.
        keys.sort_by(|a, b| b.cmp(a));
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }
}
