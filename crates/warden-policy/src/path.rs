//! Path resolution that does not require the target to exist.
//!
//! A path is made absolute against a working directory, `.` and `..` are
//! collapsed lexically, then the longest existing ancestor is canonicalized
//! so symlinks inside it are followed. The non-existent remainder is
//! appended unchanged; it contains no `..` after the lexical pass, so it
//! cannot climb back out of the canonical prefix.

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Absolute, `.`/`..`-free form of `path`, without touching the file system.
pub fn normalize(path: &Path, working_directory: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_directory.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            // `pop` at the root is a no-op, so `/..` stays `/`.
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Canonicalize the longest existing ancestor of an already normalized path.
pub fn canonicalize_existing(path: &Path) -> PathBuf {
    for ancestor in path.ancestors() {
        if let Ok(canonical) = fs::canonicalize(ancestor) {
            return match path.strip_prefix(ancestor) {
                Ok(rest) if !rest.as_os_str().is_empty() => canonical.join(rest),
                _ => canonical,
            };
        }
    }
    path.to_path_buf()
}

/// `normalize` then `canonicalize_existing`.
pub fn resolve(path: &Path, working_directory: &Path) -> PathBuf {
    canonicalize_existing(&normalize(path, working_directory))
}

/// Component-wise containment: `/tmpfoo` is not under `/tmp`.
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}
