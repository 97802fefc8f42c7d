//! Path containment for every externally addressable file
//!
//! All file paths handed out or opened by the static servers and the
//! localizer pass through [`StorageRoot`]. The root is canonicalized once;
//! requested paths are percent-decoded once, joined onto the root and
//! normalized lexically, then rejected unless they stay beneath the root.

use std::path::{Component, Path, PathBuf};

use crate::error::FileServerError;

/// A directory that every resolved path must stay within
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoot {
    root: PathBuf,
    /// The root as configured, before symlinks were followed
    configured: PathBuf,
}

impl StorageRoot {
    /// Open a storage root, canonicalizing it through the file system
    ///
    /// The directory must already exist. Symlinks in the root itself are
    /// followed here and never again.
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let root = std::fs::canonicalize(path.as_ref())?;
        Ok(Self::from_canonical(root, path.as_ref()))
    }

    pub(crate) fn from_canonical(root: PathBuf, configured: &Path) -> Self {
        Self {
            root,
            configured: normalize(configured),
        }
    }

    /// Canonical absolute path of the root
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve an untrusted, still percent-encoded relative path
    pub fn resolve(&self, requested: &str) -> crate::Result<PathBuf> {
        let decoded = decode_request_path(requested)?;
        self.resolve_decoded(&decoded)
    }

    /// Resolve a relative path that has already been percent-decoded
    pub fn resolve_decoded(&self, decoded: &str) -> crate::Result<PathBuf> {
        let trimmed = decoded.trim_start_matches(['/', '\\']);
        if trimmed.contains('\0') {
            return Err(self.reject(decoded));
        }

        let candidate = normalize(&self.root.join(trimmed));
        match self.relation(&candidate) {
            Some(_) => Ok(candidate),
            None => Err(self.reject(decoded)),
        }
    }

    /// Prove an absolute path lies under the root and return it relative to the root
    pub fn relative_path(&self, absolute: &Path) -> crate::Result<PathBuf> {
        if !absolute.is_absolute() {
            return Err(self.reject(&absolute.to_string_lossy()));
        }
        let candidate = normalize(absolute);
        self.relation(&candidate)
            .or_else(|| {
                // Paths built from a symlinked root name it by its configured form
                let relative = candidate.strip_prefix(&self.configured).ok()?;
                self.relation(&self.root.join(relative))
            })
            .ok_or_else(|| self.reject(&absolute.to_string_lossy()))
    }

    fn relation(&self, candidate: &Path) -> Option<PathBuf> {
        let relative = candidate.strip_prefix(&self.root).ok()?;
        if relative.is_absolute() || matches!(relative.components().next(), Some(Component::ParentDir)) {
            return None;
        }
        Some(relative.to_path_buf())
    }

    fn reject(&self, requested: &str) -> FileServerError {
        tracing::warn!(
            "Rejected path outside storage root: requested={:?} root={}",
            requested,
            self.root.display()
        );
        FileServerError::PathTraversal {
            path: requested.to_string(),
        }
    }
}

/// Percent-decode a request path and strip leading separators
pub fn decode_request_path(requested: &str) -> crate::Result<String> {
    let decoded = urlencoding::decode(requested).map_err(|_| {
        tracing::warn!("Rejected undecodable request path: {:?}", requested);
        FileServerError::PathTraversal {
            path: requested.to_string(),
        }
    })?;
    Ok(decoded.trim_start_matches(['/', '\\']).to_string())
}

/// Resolve `requested` beneath `root`, rejecting anything that escapes it
pub fn resolve_contained(root: impl AsRef<Path>, requested: &str) -> crate::Result<PathBuf> {
    StorageRoot::open(root)?.resolve(requested)
}

/// Resolve `.` and `..` without touching the file system
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
