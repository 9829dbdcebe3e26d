//! Workspace state and its on-disk materialization.
//!
//! The state is a path → bytes map plus the validation ledger. Tool surfaces
//! read it and never mutate it; they hand back ledger updates for the owner to
//! merge. Materialization writes the content set into a scoped temp directory
//! that is removed on drop unless the debug flag keeps it.

use crate::core::digest::{self, Fingerprint};
use crate::core::error::ProverGateError;
use crate::core::ledger::{Ledger, LedgerUpdate};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;

/// Directory names never loaded from disk into a workspace.
pub const DEFAULT_EXCLUDES: &[&str] = &[".provergate", ".git", "target"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceState {
    files: BTreeMap<String, Vec<u8>>,
    pub validation: Ledger,
}

impl WorkspaceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.put_file(path, content);
        self
    }

    pub fn put_file(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn remove_file(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Merge a ledger update produced by a tool surface.
    pub fn apply_update(&mut self, update: LedgerUpdate) {
        self.validation.apply(update);
    }

    /// Load every regular file under `root`, skipping [`DEFAULT_EXCLUDES`] and symlinks.
    /// A file name that is not valid UTF-8 is a `PathError`.
    pub fn load_dir(root: &Path) -> Result<Self, ProverGateError> {
        if !root.is_dir() {
            return Err(ProverGateError::PathError(format!(
                "workspace root {} is not a directory",
                root.display()
            )));
        }
        let mut state = WorkspaceState::new();
        load_recursive(root, root, &mut state)?;
        Ok(state)
    }
}

fn load_recursive(
    root: &Path,
    dir: &Path,
    state: &mut WorkspaceState,
) -> Result<(), ProverGateError> {
    let mut entries = fs::read_dir(dir)
        .map_err(ProverGateError::IoError)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(ProverGateError::IoError)?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let meta = fs::symlink_metadata(&path).map_err(ProverGateError::IoError)?;
        let name = entry.file_name();
        if meta.file_type().is_symlink() {
            continue;
        }
        if meta.is_dir() {
            if name.to_str().is_some_and(|n| DEFAULT_EXCLUDES.contains(&n)) {
                continue;
            }
            load_recursive(root, &path, state)?;
        } else if meta.is_file() {
            let rel = path
                .strip_prefix(root)
                .map_err(|e| ProverGateError::PathError(e.to_string()))?;
            let key = rel
                .components()
                .map(|c| {
                    c.as_os_str().to_str().ok_or_else(|| {
                        ProverGateError::PathError(format!(
                            "file name is not valid UTF-8: {}",
                            path.display()
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
                .join("/");
            let content = fs::read(&path).map_err(ProverGateError::IoError)?;
            state.put_file(key, content);
        }
    }
    Ok(())
}

/// A materialized workspace directory. Removed on drop unless kept.
#[derive(Debug)]
pub struct MaterializedDir {
    path: PathBuf,
    guard: Option<TempDir>,
}

impl MaterializedDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_kept(&self) -> bool {
        self.guard.is_none()
    }
}

/// Realizes a workspace state on disk and enumerates its content.
pub trait Materializer {
    fn iterate<'a>(&self, state: &'a WorkspaceState) -> Vec<(&'a str, &'a [u8])>;

    fn materialize(
        &self,
        state: &WorkspaceState,
        debug: bool,
    ) -> Result<MaterializedDir, ProverGateError>;
}

/// Writes the content set into a fresh temporary directory.
#[derive(Debug, Clone, Default)]
pub struct TempDirMaterializer {
    parent: Option<PathBuf>,
}

impl TempDirMaterializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create temp directories under `parent` instead of the system temp dir.
    pub fn in_dir(parent: impl Into<PathBuf>) -> Self {
        TempDirMaterializer {
            parent: Some(parent.into()),
        }
    }
}

fn checked_relative(path: &str) -> Result<&Path, ProverGateError> {
    let p = Path::new(path);
    let clean = !path.is_empty()
        && p.components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !clean {
        return Err(ProverGateError::PathError(format!(
            "refusing to materialize path outside the workspace: '{}'",
            path
        )));
    }
    Ok(p)
}

impl Materializer for TempDirMaterializer {
    fn iterate<'a>(&self, state: &'a WorkspaceState) -> Vec<(&'a str, &'a [u8])> {
        state
            .files
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect()
    }

    fn materialize(
        &self,
        state: &WorkspaceState,
        debug: bool,
    ) -> Result<MaterializedDir, ProverGateError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("provergate_ws_");
        let tmp = match &self.parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(ProverGateError::IoError)?;

        for (rel, content) in self.iterate(state) {
            let target = tmp.path().join(checked_relative(rel)?);
            if let Some(dir) = target.parent() {
                fs::create_dir_all(dir).map_err(ProverGateError::IoError)?;
            }
            fs::write(&target, content).map_err(ProverGateError::IoError)?;
        }

        if debug {
            let path = tmp.keep();
            eprintln!("Keeping materialized workspace at {}", path.display());
            Ok(MaterializedDir { path, guard: None })
        } else {
            Ok(MaterializedDir {
                path: tmp.path().to_path_buf(),
                guard: Some(tmp),
            })
        }
    }
}

/// Fingerprint of the state's content as enumerated by `materializer`.
pub fn state_fingerprint(materializer: &dyn Materializer, state: &WorkspaceState) -> Fingerprint {
    digest::fingerprint(materializer.iterate(state))
}
