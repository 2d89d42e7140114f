//! Copies of records taken before they are deleted.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// One directory per run, named after the time it started.
#[derive(Debug, Clone)]
pub struct Backup {
    dir: PathBuf,
}

impl Backup {
    pub fn create(root: &Path) -> Result<Self> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let dir = root.join(stamp);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create backup directory {}", dir.display()))?;
        log::info!("backing up deleted records to {}", dir.display());
        Ok(Backup { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` under the last segment of `href`. An existing file is
    /// never overwritten.
    pub fn save(&self, href: &str, data: &str) -> Result<PathBuf> {
        let name = file_name(href);
        let mut path = self.dir.join(&name);
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}-{}", n, name));
            n += 1;
        }

        fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;
        log::debug!("saved {} to {}", href, path.display());
        Ok(path)
    }
}

fn file_name(href: &str) -> String {
    let last = href.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    let clean: String = last
        .chars()
        .map(|c| if c.is_alphanumeric() || "-_.@".contains(c) { c } else { '_' })
        .collect();
    if clean.is_empty() { "record".to_string() } else { clean }
}
