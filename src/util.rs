use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Writes `value` next to `path` first and renames it into place, so a
/// crash mid-write never leaves a truncated file behind.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let staging = staging_path(path);
    let mut file = File::create(&staging)
        .with_context(|| format!("failed to create json file: {}", staging.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", staging.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", staging.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync json file: {}", staging.display()))?;
    drop(file);

    fs::rename(&staging, path).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            staging.display(),
            path.display()
        )
    })?;

    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
