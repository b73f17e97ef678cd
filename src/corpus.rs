//! Seed corpus loading
//!
//! A corpus is a directory holding one regular file per test case. The file
//! bytes are the exact wire payload (delimiters such as `\r\n` included) and
//! the file name without its extension is the test name.

use std::fs;
use std::path::Path;

use crate::common::{Error, Result};

/// A named, immutable byte sequence sent as one test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    name: String,
    bytes: Vec<u8>,
}

impl Payload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Test name, unique within a run
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw wire bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Load every payload in `dir`, ordered lexicographically by file name
///
/// Subdirectories and hidden files are skipped. When two files share a
/// stem (`a.bin`, `a.txt`) the later one in enumeration order wins.
pub fn load(dir: &Path) -> Result<Vec<Payload>> {
    if !dir.is_dir() {
        return Err(Error::CorpusNotFound(dir.display().to_string()));
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::file_read(dir, e))? {
        let entry = entry.map_err(|e| Error::file_read(dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| Error::file_read(&entry.path(), e))?;

        // Follow symlinks so linked seeds still count as regular files
        let is_file = file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
        if !is_file || entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        entries.push(entry.path());
    }
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut payloads: Vec<Payload> = Vec::with_capacity(entries.len());
    for path in entries {
        let payload = read_payload(&path)?;

        if let Some(idx) = payloads.iter().position(|p| p.name == payload.name) {
            tracing::warn!(
                "Duplicate test name '{}', keeping {}",
                payload.name,
                path.display()
            );
            payloads.remove(idx);
        }

        tracing::trace!("Loaded payload '{}' ({} bytes)", payload.name, payload.bytes.len());
        payloads.push(payload);
    }

    tracing::debug!("Loaded {} payloads from {}", payloads.len(), dir.display());
    Ok(payloads)
}

fn read_payload(path: &Path) -> Result<Payload> {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bytes = fs::read(path).map_err(|e| Error::file_read(path, e))?;
    Ok(Payload { name, bytes })
}
