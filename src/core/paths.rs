//! Resolution of caller-supplied document paths under a repository root.

use crate::core::error::AkrError;
use std::path::{Component, Path, PathBuf};

/// A target path known to stay inside its repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPath {
    pub absolute: PathBuf,
    /// Repository-relative form, used for staging.
    pub relative: PathBuf,
}

/// Resolve `doc_path` lexically under `repo_root`. Absolute paths, drive
/// prefixes and `..` walks above the root are rejected, as is an existing
/// ancestor that resolves (through symlinks) outside the root.
pub fn resolve_target(repo_root: &Path, doc_path: &str) -> Result<TargetPath, AkrError> {
    let trimmed = doc_path.trim();
    if trimmed.is_empty() {
        return Err(AkrError::PathTraversal("empty document path".to_string()));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(AkrError::PathTraversal(doc_path.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(AkrError::PathTraversal(doc_path.to_string()));
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(AkrError::PathTraversal(doc_path.to_string()));
    }

    let absolute = repo_root.join(&relative);
    check_existing_ancestor(repo_root, &absolute, doc_path)?;
    Ok(TargetPath { absolute, relative })
}

fn check_existing_ancestor(repo_root: &Path, target: &Path, raw: &str) -> Result<(), AkrError> {
    let Ok(root) = repo_root.canonicalize() else {
        return Ok(());
    };
    let Some(existing) = target.ancestors().find(|p| p.exists()) else {
        return Ok(());
    };
    let resolved = existing.canonicalize()?;
    if resolved.starts_with(&root) {
        Ok(())
    } else {
        Err(AkrError::PathTraversal(raw.to_string()))
    }
}
