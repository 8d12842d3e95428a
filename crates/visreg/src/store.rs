//! Baseline, actual, diff and report persistence.

use crate::result::{VisregError, VisregResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Kind of artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Reference image
    Baseline,
    /// Normalized capture
    Actual,
    /// Diff visualization
    Diff,
    /// JSON side-car report
    Report,
}

impl ArtifactKind {
    /// Lowercase name used in errors and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Actual => "actual",
            Self::Diff => "diff",
            Self::Report => "report",
        }
    }

    const fn extension(self) -> &'static str {
        match self {
            Self::Report => "json",
            _ => "png",
        }
    }
}

/// Storage for comparison artifacts
pub trait ArtifactStore: Send + Sync {
    /// Where the artifact `name` of `kind` lives
    fn path(&self, kind: ArtifactKind, name: &str) -> PathBuf;

    /// Read an artifact, `None` when it does not exist
    fn load(&self, kind: ArtifactKind, name: &str) -> VisregResult<Option<Vec<u8>>>;

    /// Write an artifact, returning its path
    fn save(&self, kind: ArtifactKind, name: &str, bytes: &[u8]) -> VisregResult<PathBuf>;
}

/// Directory-backed store: `{dir}/{name}.png`, reports next to the actual
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsArtifactStore {
    baseline_dir: PathBuf,
    actual_dir: PathBuf,
    diff_dir: PathBuf,
}

impl FsArtifactStore {
    /// Store with explicit directories
    #[must_use]
    pub fn new(
        baseline_dir: impl Into<PathBuf>,
        actual_dir: impl Into<PathBuf>,
        diff_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            baseline_dir: baseline_dir.into(),
            actual_dir: actual_dir.into(),
            diff_dir: diff_dir.into(),
        }
    }

    /// `baseline/`, `actual/` and `diff/` under `root`
    #[must_use]
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::new(root.join("baseline"), root.join("actual"), root.join("diff"))
    }

    fn dir(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Baseline => &self.baseline_dir,
            ArtifactKind::Actual | ArtifactKind::Report => &self.actual_dir,
            ArtifactKind::Diff => &self.diff_dir,
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn path(&self, kind: ArtifactKind, name: &str) -> PathBuf {
        self.dir(kind).join(format!("{name}.{}", kind.extension()))
    }

    fn load(&self, kind: ArtifactKind, name: &str) -> VisregResult<Option<Vec<u8>>> {
        let path = self.path(kind, name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, kind: ArtifactKind, name: &str, bytes: &[u8]) -> VisregResult<PathBuf> {
        let path = self.path(kind, name);
        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(self.dir(kind))?;
            std::fs::write(&path, bytes)
        };
        write().map_err(|e| {
            VisregError::persist(kind.as_str(), format!("{}: {e}", path.display()))
        })?;
        debug!(kind = kind.as_str(), path = %path.display(), bytes = bytes.len(), "artifact saved");
        Ok(path)
    }
}
