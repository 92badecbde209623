//! Transient on-disk handles for rendering local blobs
//!
//! A media blob that has not been uploaded yet only lives in the database.
//! Renderers that need a file path materialize it through a [`DisplayHandle`];
//! the file exists exactly as long as the handle does.

use std::path::{Path, PathBuf};

/// A materialized copy of a local blob, removed on drop
#[derive(Debug)]
pub struct DisplayHandle {
    path: PathBuf,
    released: bool,
}

impl DisplayHandle {
    /// Writes `data` to `<dir>/<name>` and takes ownership of the file
    pub fn materialize(dir: &Path, name: &str, data: &[u8]) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(name);
        std::fs::write(&path, data)?;
        log::debug!("Materialized display handle {:?} ({} bytes)", path, data.len());
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the handle now, reporting removal errors to the caller
    pub fn release(mut self) -> std::io::Result<()> {
        self.released = true;
        std::fs::remove_file(&self.path)
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Could not release display handle {:?}: {}", self.path, e);
        }
    }
}
