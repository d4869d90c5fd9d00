//! # Input linker
//!
//! Worker processes get their upstream dependencies' outputs by value (JSON
//! over the wire), but file-producing tasks need the actual files of an
//! upstream task made visible inside their own working directory without
//! copying potentially large outputs around. The linker symlinks a file (or
//! directory) from an ancestor's work directory into a descendant's,
//! sanitizing the link name so a path-like input can never escape the
//! target directory or collide with another input by accident.

use std::path::{Path, PathBuf};

/// Create a symlink named `<prefix>_<sanitized-basename>` inside
/// `target_dir`, pointing at `source`. Returns the path of the new link.
///
/// Refuses to link a path to itself (a task accidentally depending on its
/// own output directory), and sanitizes the basename so `..`, absolute
/// components, and path separators in the original name can't place the
/// link outside `target_dir`.
pub fn link_input(source: &Path, target_dir: &Path, prefix: &str) -> std::io::Result<PathBuf> {
    let source = source.canonicalize()?;
    let target_dir_abs = target_dir.canonicalize()?;

    if source == target_dir_abs {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "refusing to link a task's own working directory into itself",
        ));
    }

    let basename = sanitize_basename(source.file_name().and_then(|n| n.to_str()).unwrap_or("input"));
    let link_path = target_dir.join(format!("{prefix}_{basename}"));

    if link_path.exists() || link_path.symlink_metadata().is_ok() {
        std::fs::remove_file(&link_path).or_else(|_| std::fs::remove_dir_all(&link_path))?;
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(&source, &link_path)?;
    #[cfg(windows)]
    {
        if source.is_dir() {
            std::os::windows::fs::symlink_dir(&source, &link_path)?;
        } else {
            std::os::windows::fs::symlink_file(&source, &link_path)?;
        }
    }

    Ok(link_path)
}

/// Strip anything that could let a symlink name escape `target_dir` or
/// collide awkwardly with another file: path separators, leading dots, and
/// non-alphanumeric punctuation outside `._-`.
fn sanitize_basename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "input".to_string()
    } else {
        cleaned.to_string()
    }
}
