//! File consumer: newline-delimited envelopes appended to a local file.
//!
//! Writes are synchronous, so there is nothing to flush. A file that cannot be
//! opened is logged once at construction and every `send` then returns false.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::Consumer;

/// Appends one serialized envelope per line.
pub struct FileConsumer {
    path: PathBuf,
    file: Option<File>,
}

impl FileConsumer {
    /// Open `path` for appending, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to open event file");
                None
            }
        };
        Self { path, file }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file is open for writing
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

impl Consumer for FileConsumer {
    fn send(&mut self, payload: String) -> bool {
        let Some(file) = self.file.as_mut() else {
            return false;
        };

        let mut line = payload.into_bytes();
        line.push(b'\n');

        match file.write_all(&line) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to append event");
                false
            }
        }
    }

    fn close(&mut self) -> bool {
        match self.file.take() {
            Some(file) => match file.sync_all() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to sync event file");
                    false
                }
            },
            None => false,
        }
    }
}
