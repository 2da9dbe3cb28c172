//! Writing generated partials to disk.
//!
//! Partials are fully rendered before this module is reached. Each file is
//! written to a temporary sibling and renamed into place, so a reader never
//! sees a half-written partial. Files whose content is already current are
//! not rewritten.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors that can occur while writing partials.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to create directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl OutputError {
    /// The path that could not be written.
    pub fn path(&self) -> &Path {
        match self {
            OutputError::CreateDir { path, .. } | OutputError::Write { path, .. } => path,
        }
    }
}

/// A generated file: where it goes (relative to the site root) and what it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partial {
    pub path: PathBuf,
    pub content: String,
}

impl Partial {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Partial {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// What a write pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteReport {
    pub written: usize,
    pub unchanged: usize,
}

fn is_current(path: &Path, content: &str) -> bool {
    fs::read(path).is_ok_and(|existing| existing == content.as_bytes())
}

/// Writes every partial under `root`, stopping at the first failure.
///
/// # Errors
///
/// Returns the path that failed; partials after it are not written.
pub fn write_partials(root: &Path, partials: &[Partial]) -> Result<WriteReport, OutputError> {
    let mut report = WriteReport::default();

    for partial in partials {
        let path = root.join(&partial.path);
        if is_current(&path, &partial.content) {
            debug!("unchanged {}", partial.path.display());
            report.unchanged += 1;
            continue;
        }

        write_atomic(&path, &partial.content)?;
        info!("wrote {}", partial.path.display());
        report.written += 1;
    }

    Ok(report)
}

/// Site-relative paths of partials whose on-disk content differs.
pub fn stale_partials(root: &Path, partials: &[Partial]) -> Vec<PathBuf> {
    partials
        .iter()
        .filter(|p| !is_current(&root.join(&p.path), &p.content))
        .map(|p| p.path.clone())
        .collect()
}

fn write_atomic(path: &Path, content: &str) -> Result<(), OutputError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|source| OutputError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let write_err = |source: io::Error| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(content.as_bytes()).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
