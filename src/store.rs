//! File-backed solution store.
//!
//! Each candidate owns exactly one canonical file, `<dir>/<id>.<ext>`. New
//! content is always written to a hidden staging file in the same directory
//! and moved over the canonical path with a single rename, so readers see
//! either the old payload or the new one and never a partial write.

use crate::candidates::{self, CandidateId, IdFilter};
use crate::error::StoreError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub const STAGING_SUFFIX: &str = ".partial";

#[derive(Debug, Clone)]
pub struct SolutionStore {
    dir: PathBuf,
    extension: String,
}

/// Output being prepared for one candidate.
///
/// Dropping it without calling [`SolutionStore::commit`] deletes the
/// staging file. Deletion is best-effort; staging names never look like
/// canonical names, so a leftover is ignored by every reader.
#[derive(Debug)]
pub struct StagedSolution {
    id: CandidateId,
    file: NamedTempFile,
}

impl StagedSolution {
    pub fn id(&self) -> CandidateId {
        self.id
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> std::io::Result<u64> {
        Ok(fs::metadata(self.file.path())?.len())
    }

    pub fn is_empty(&self) -> std::io::Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.file.path().to_path_buf();
        let io = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        self.file.write_all(bytes).map_err(io)?;
        self.file.as_file().sync_all().map_err(io)
    }

    /// Deletes the staging file now and reports whether that worked.
    pub fn discard(self) -> std::io::Result<()> {
        self.file.close()
    }
}

impl SolutionStore {
    pub fn open(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Result<Self, StoreError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(StoreError::NotADirectory(dir));
        }
        Ok(Self {
            dir,
            extension: extension.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn current_solution(&self, id: CandidateId) -> PathBuf {
        self.dir.join(candidates::file_name(id, &self.extension))
    }

    pub fn contains(&self, id: CandidateId) -> bool {
        self.current_solution(id).is_file()
    }

    pub fn read(&self, id: CandidateId) -> Result<Vec<u8>, StoreError> {
        let path = self.current_solution(id);
        fs::read(&path).map_err(|source| StoreError::Io { path, source })
    }

    /// Enumerates candidates that currently have a canonical solution file.
    pub fn discover(&self, filter: &IdFilter) -> Result<Vec<CandidateId>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(id) = candidates::id_from_path(&path, &self.extension) {
                if filter.accepts(id) {
                    ids.push(id);
                }
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }

    /// Creates a uniquely named staging file next to the canonical path.
    /// The random part keeps concurrent and successive attempts apart.
    pub fn stage(&self, id: CandidateId) -> Result<StagedSolution, StoreError> {
        let file = tempfile::Builder::new()
            .prefix(&format!(".{}.", id))
            .suffix(STAGING_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        // tempfile creates 0600; committed solutions should read like any other file.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(file.path(), fs::Permissions::from_mode(0o644)) {
                debug!("could not relax permissions on {}: {}", file.path().display(), e);
            }
        }

        debug!("staged candidate {} at {}", id, file.path().display());
        Ok(StagedSolution { id, file })
    }

    /// Atomically replaces the canonical solution with the staged file.
    pub fn commit(&self, staged: StagedSolution) -> Result<PathBuf, StoreError> {
        let id = staged.id;
        let target = self.current_solution(id);
        staged
            .file
            .persist(&target)
            .map_err(|e| StoreError::Persist { id, source: e.error })?;
        Ok(target)
    }

    pub fn write(&self, id: CandidateId, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let mut staged = self.stage(id)?;
        staged.write_all(bytes)?;
        self.commit(staged)
    }

    /// Stages a copy of an external file for `id`.
    pub fn stage_copy_of(&self, id: CandidateId, source: &Path) -> Result<StagedSolution, StoreError> {
        let bytes = fs::read(source).map_err(|e| StoreError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        let mut staged = self.stage(id)?;
        staged.write_all(&bytes)?;
        Ok(staged)
    }

    /// Removes staging files left behind by an earlier run that died.
    /// Returns how many were removed.
    pub fn sweep_stale(&self) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) => {
                warn!("could not scan {} for stale files: {}", self.dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_staging_file(&path) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("could not remove stale {}: {}", path.display(), e),
            }
        }
        removed
    }

    pub fn staging_files(&self) -> Vec<PathBuf> {
        fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| is_staging_file(p))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn is_staging_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') && n.ends_with(STAGING_SUFFIX))
        .unwrap_or(false)
}
