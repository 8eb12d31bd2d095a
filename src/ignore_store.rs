use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::Handle;
use crate::rules::ViolationIdentity;
use crate::util::{sha256_hex, write_json_pretty};

/// Suppressed violations per entity handle.
pub type IgnoreMap = BTreeMap<Handle, BTreeSet<ViolationIdentity>>;

const STORE_EXTENSION: &str = "vfm";
const STORE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    format_version: u32,
    source: String,
    ignores: IgnoreMap,
}

/// Directory the store files live in. Store files are not migrated across
/// major versions, so each major version gets its own directory.
pub fn versioned_data_dir(root: &Path) -> PathBuf {
    root.join(format!("v{}", env!("CARGO_PKG_VERSION_MAJOR")))
}

/// Persisted suppression choices for one data source.
#[derive(Debug)]
pub struct IgnoreStore {
    path: PathBuf,
    source: String,
    ignores: IgnoreMap,
}

impl IgnoreStore {
    pub fn path_for(data_dir: &Path, source_identity: &str) -> PathBuf {
        let digest = sha256_hex(source_identity.as_bytes());
        data_dir.join(format!("{digest}.{STORE_EXTENSION}"))
    }

    /// Loads the store for `source_identity`. Never fails: a missing or
    /// unreadable file yields an empty store.
    pub fn load(data_dir: &Path, source_identity: &str) -> Self {
        let path = Self::path_for(data_dir, source_identity);
        let ignores = match read_store(&path) {
            Ok(Some(ignores)) => {
                info!(
                    path = %path.display(),
                    handles = ignores.len(),
                    "loaded ignore store"
                );
                ignores
            }
            Ok(None) => {
                debug!(path = %path.display(), "no ignore store yet");
                IgnoreMap::new()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable ignore store");
                IgnoreMap::new()
            }
        };

        Self {
            path,
            source: source_identity.to_string(),
            ignores,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ignores(&self) -> &IgnoreMap {
        &self.ignores
    }

    pub fn get_marking(&self, handle: &str, identity: &ViolationIdentity) -> bool {
        self.ignores
            .get(handle)
            .is_some_and(|identities| identities.contains(identity))
    }

    /// A store that lives only in memory until saved.
    #[cfg(test)]
    pub fn with_ignores(data_dir: &Path, source_identity: &str, ignores: IgnoreMap) -> Self {
        Self {
            path: Self::path_for(data_dir, source_identity),
            source: source_identity.to_string(),
            ignores,
        }
    }

    /// Replaces the stored map wholesale and writes it out.
    pub fn save(&mut self, ignores: IgnoreMap) -> Result<()> {
        let file = StoreFile {
            format_version: STORE_FORMAT_VERSION,
            source: self.source.clone(),
            ignores,
        };
        write_json_pretty(&self.path, &file)
            .with_context(|| format!("failed to save ignore store {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            handles = file.ignores.len(),
            "saved ignore store"
        );
        self.ignores = file.ignores;
        Ok(())
    }
}

fn read_store(path: &Path) -> Result<Option<IgnoreMap>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file: StoreFile = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if file.format_version != STORE_FORMAT_VERSION {
        bail!(
            "unsupported ignore store format {} (expected {})",
            file.format_version,
            STORE_FORMAT_VERSION
        );
    }
    Ok(Some(file.ignores))
}
