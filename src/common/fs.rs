use std::{fs, io::Write, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Create the directory if it doesn’t exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Write `bytes` to `path` through a temp file in the same directory, then
/// rename over the target. Readers never observe a partially written file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir_exists(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to move temp file onto {}", path.display()))?;
    Ok(())
}

/// First path in `candidates` that exists; error naming every candidate otherwise.
pub(crate) fn first_existing<'a>(candidates: impl IntoIterator<Item = &'a PathBuf>) -> Result<&'a PathBuf> {
    let mut tried = Vec::new();
    for path in candidates {
        if path.exists() { return Ok(path) }
        tried.push(path.display().to_string());
    }
    anyhow::bail!("None of the input files exist: {}", tried.join(", "))
}
