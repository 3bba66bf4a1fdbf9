//! Pass 1: read XML entries out of an export archive.
//!
//! The archive is either a zip file or an already-unpacked directory. Only
//! a missing or corrupt archive is fatal; every per-entry failure (oversize,
//! undecodable, unreadable) becomes a diagnostic and the entry is skipped.

use crate::error::{ArchiveError, Diagnostic, EntryError};
use crate::load::LoadOptions;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// One XML document from the archive, keyed by its archive-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Forward-slash separated path relative to the archive root.
    pub path: String,
    pub text: String,
}

impl ArchiveEntry {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        ArchiveEntry {
            path: path.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSource {
    Zip(PathBuf),
    Directory(PathBuf),
}

impl ArchiveSource {
    pub fn path(&self) -> &Path {
        match self {
            ArchiveSource::Zip(p) | ArchiveSource::Directory(p) => p,
        }
    }
}

#[derive(Debug, Default)]
pub struct ArchiveRead {
    pub entries: Vec<ArchiveEntry>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ArchiveRead {
    fn push(&mut self, path: String, result: Result<String, EntryError>) {
        match result {
            Ok(text) => self.entries.push(ArchiveEntry { path, text }),
            Err(e) => {
                warn!(path = %path, error = %e, "skipping archive entry");
                self.diagnostics.push(Diagnostic::from_entry_error(&path, &e));
            }
        }
    }
}

pub fn read_archive(source: &ArchiveSource, options: &LoadOptions) -> Result<ArchiveRead, ArchiveError> {
    let path = source.path();
    if !path.exists() {
        return Err(ArchiveError::NotFound {
            path: path.to_owned(),
        });
    }
    match source {
        ArchiveSource::Zip(p) => read_zip(p, options.max_entry_bytes),
        ArchiveSource::Directory(p) => read_directory(p, options.max_entry_bytes),
    }
}

fn read_zip(path: &Path, limit: u64) -> Result<ArchiveRead, ArchiveError> {
    let file = File::open(path).map_err(|source| ArchiveError::Open {
        path: path.to_owned(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| ArchiveError::Corrupt {
        path: path.to_owned(),
        source,
    })?;

    let mut read = ArchiveRead::default();
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                read.push(format!("#{}", i), Err(EntryError::Unreadable(e.to_string())));
                continue;
            }
        };
        let name = entry.name().replace('\\', "/");
        if entry.is_dir() || !is_xml(&name) {
            continue;
        }
        let declared = entry.size();
        read.push(name, read_bounded(&mut entry, declared, limit));
    }
    Ok(read)
}

fn read_directory(root: &Path, limit: u64) -> Result<ArchiveRead, ArchiveError> {
    if !root.is_dir() {
        return Err(ArchiveError::NotFound {
            path: root.to_owned(),
        });
    }

    let mut read = ArchiveRead::default();
    for item in WalkDir::new(root).sort_by_file_name() {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                let at = e
                    .path()
                    .map(|p| relative_path(root, p))
                    .unwrap_or_default();
                read.push(at, Err(EntryError::Unreadable(e.to_string())));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = relative_path(root, entry.path());
        if !is_xml(&rel) {
            continue;
        }
        let result = File::open(entry.path())
            .and_then(|f| Ok((f.metadata()?.len(), f)))
            .map_err(|e| EntryError::Unreadable(e.to_string()))
            .and_then(|(declared, f)| read_bounded(f, declared, limit));
        read.push(rel, result);
    }
    Ok(read)
}

/// Read at most `limit` bytes and decode as UTF-8 (leading BOM dropped).
fn read_bounded(reader: impl Read, declared: u64, limit: u64) -> Result<String, EntryError> {
    if declared > limit {
        return Err(EntryError::TooLarge {
            size: declared,
            limit,
        });
    }
    let mut buf = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| EntryError::Unreadable(e.to_string()))?;
    if buf.len() as u64 > limit {
        return Err(EntryError::TooLarge {
            size: buf.len() as u64,
            limit,
        });
    }
    let body = buf.strip_prefix(UTF8_BOM).unwrap_or(&buf);
    String::from_utf8(body.to_vec()).map_err(|_| EntryError::NotUtf8)
}

fn is_xml(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
