//! Per-request scratch files in the shared work directory.
//!
//! Every request gets a [`WorkspaceEntry`] keyed by a random UUID. The input
//! is stored as `{id}.fb2`; the converter writes `{id}.{format}` next to it.
//! Because both names derive from the same id, cleanup never needs extra
//! bookkeeping, and concurrent requests never share a path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::format::BookFormat;

/// Extension of uploaded source documents.
pub const INPUT_EXTENSION: &str = "fb2";

/// The shared scratch directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the scratch directory if it does not exist yet.
    pub async fn prepare(&self) -> Result<(), CoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Allocate a fresh entry. Nothing is written to disk.
    pub fn create(&self) -> WorkspaceEntry {
        WorkspaceEntry {
            id: Uuid::new_v4(),
            dir: self.dir.clone(),
        }
    }
}

/// Paired input/output locations of one in-flight conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceEntry {
    id: Uuid,
    dir: PathBuf,
}

impl WorkspaceEntry {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn input_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{INPUT_EXTENSION}", self.id))
    }

    /// Where the converter leaves its result: same stem as the input, the
    /// format as extension.
    pub fn output_path(&self, format: BookFormat) -> PathBuf {
        self.dir.join(format!("{}.{}", self.id, format.extension()))
    }

    /// Scoped guard over the input file.
    pub fn input_file(&self) -> ScratchFile {
        ScratchFile::new(self.input_path())
    }

    /// Scoped guard over the output file for `format`.
    pub fn output_file(&self, format: BookFormat) -> ScratchFile {
        ScratchFile::new(self.output_path(format))
    }

    /// Remove the input file and, unless `keep_output` is set, the output
    /// file. Missing files are not an error; nothing here ever fails.
    ///
    /// The bulk counterpart of dropping both [`ScratchFile`] guards, used
    /// when a conversion is rejected after the tool has run.
    pub async fn release(&self, format: BookFormat, keep_output: bool) {
        remove_quietly(&self.input_path()).await;
        if !keep_output {
            remove_quietly(&self.output_path(format)).await;
        }
    }
}

/// A workspace file that is deleted when the guard goes away.
///
/// Call [`ScratchFile::remove`] on the normal path; if the guard is dropped
/// first (early return, cancelled future, aborted response stream) the file
/// is removed synchronously from `Drop`.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    armed: bool,
}

impl ScratchFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(mut self) {
        self.armed = false;
        remove_quietly(&self.path).await;
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "scratch file removed on drop"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch file"),
        }
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "scratch file removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove scratch file"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn entry_paths_share_identifier() {
        let workspace = Workspace::new("/scratch");
        let entry = workspace.create();
        let id = entry.id().to_string();

        assert_eq!(entry.input_path(), PathBuf::from(format!("/scratch/{id}.fb2")));
        assert_eq!(
            entry.output_path(BookFormat::Mobi),
            PathBuf::from(format!("/scratch/{id}.mobi"))
        );
        assert_eq!(
            entry.input_path().file_stem(),
            entry.output_path(BookFormat::Epub).file_stem()
        );
    }

    #[test]
    fn entries_are_unique() {
        let workspace = Workspace::new("/scratch");
        let a = workspace.create();
        let b = workspace.create();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.input_path(), b.input_path());
    }

    #[tokio::test]
    async fn create_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        let entry = workspace.create();
        assert!(!entry.input_path().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn prepare_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path().join("nested").join("scratch"));
        workspace.prepare().await.unwrap();
        assert!(workspace.dir().is_dir());
        // Second call is a no-op.
        workspace.prepare().await.unwrap();
    }

    #[tokio::test]
    async fn release_removes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Workspace::new(dir.path()).create();
        std::fs::write(entry.input_path(), b"<FictionBook/>").unwrap();
        std::fs::write(entry.output_path(BookFormat::Epub), b"PK").unwrap();

        entry.release(BookFormat::Epub, false).await;

        assert!(!entry.input_path().exists());
        assert!(!entry.output_path(BookFormat::Epub).exists());
    }

    #[tokio::test]
    async fn release_can_keep_output() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Workspace::new(dir.path()).create();
        std::fs::write(entry.input_path(), b"<FictionBook/>").unwrap();
        std::fs::write(entry.output_path(BookFormat::Mobi), b"BOOKMOBI").unwrap();

        entry.release(BookFormat::Mobi, true).await;

        assert!(!entry.input_path().exists());
        assert!(entry.output_path(BookFormat::Mobi).exists());
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Workspace::new(dir.path()).create();

        // Nothing exists yet, then release twice more after a real file.
        entry.release(BookFormat::Epub, false).await;
        std::fs::write(entry.input_path(), b"x").unwrap();
        entry.release(BookFormat::Epub, false).await;
        entry.release(BookFormat::Epub, false).await;

        assert!(!entry.input_path().exists());
    }

    #[tokio::test]
    async fn scratch_file_removed_explicitly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.fb2");
        std::fs::write(&path, b"x").unwrap();

        ScratchFile::new(&path).remove().await;
        assert!(!path.exists());
    }

    #[test]
    #[traced_test]
    fn scratch_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.epub");
        std::fs::write(&path, b"x").unwrap();

        drop(ScratchFile::new(&path));
        assert!(!path.exists());
        assert!(logs_contain("scratch file removed on drop"));
    }

    #[test]
    fn scratch_file_drop_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        drop(ScratchFile::new(dir.path().join("never-written.mobi")));
    }
}
