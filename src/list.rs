//! Plain-text username lists: one entry per line.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

/// Path that stands for standard input.
pub const STDIN_PATH: &str = "-";

/// Errors reading or writing a list.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ListError {
    /// The input list does not exist.
    #[error("{} not found", path.display())]
    Missing {
        /// The missing file.
        path: PathBuf,
    },
    /// The input list could not be read.
    #[error("reading {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The output list could not be written.
    #[error("writing {}: {source}", path.display())]
    Write {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

/// Collect trimmed, non-blank lines from `reader`, in order.
///
/// # Errors
///
/// Propagates read errors from `reader`.
pub fn parse_candidates(reader: impl BufRead) -> io::Result<Vec<String>> {
    let mut candidates = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            candidates.push(trimmed.to_string());
        }
    }
    Ok(candidates)
}

/// Read candidates from `path`, or from stdin when `path` is `-`.
///
/// # Errors
///
/// Returns [`ListError::Missing`] if the file does not exist and
/// [`ListError::Read`] for any other read failure.
pub fn read_candidates(path: &Path) -> Result<Vec<String>, ListError> {
    let read_err = |source| ListError::Read {
        path: path.into(),
        source,
    };

    if path == Path::new(STDIN_PATH) {
        return parse_candidates(io::stdin().lock()).map_err(read_err);
    }

    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ListError::Missing { path: path.into() },
        _ => read_err(e),
    })?;
    parse_candidates(BufReader::new(file)).map_err(read_err)
}

/// Replace `path` with `handles`, one per line.
///
/// The file is written next to its destination and renamed into place, so
/// readers never see a half-written list. An empty list yields an empty
/// file.
///
/// # Errors
///
/// Returns [`ListError::Write`] if the file cannot be created or replaced.
pub fn write_available<I, S>(path: &Path, handles: I) -> Result<(), ListError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let write_err = |source| ListError::Write {
        path: path.into(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    for handle in handles {
        writeln!(tmp, "{}", handle.as_ref()).map_err(write_err)?;
    }
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
