//! Per-row artifact directories and file naming.

use std::io;
use std::path::{Path, PathBuf};

/// Longest file stem kept from a page title.
const MAX_STEM_CHARS: usize = 200;

/// Highest `-N` suffix tried before giving up on a row directory.
const MAX_DIR_SUFFIX: usize = 10_000;

/// Suffixes of files a browser is still writing.
const IN_PROGRESS_SUFFIXES: [&str; 3] = [".crdownload", ".part", ".tmp"];

/// Creates a fresh artifact directory for `row` under `root`.
///
/// The first run gets `row-00042`; later runs get `row-00042-2`, `-3`, and
/// so on. Directories are claimed with `create_dir`, so an existing
/// directory is never reused or modified.
///
/// # Errors
///
/// Returns the IO error when `root` cannot be created or no suffix is free.
pub fn allocate_row_dir(root: &Path, row: usize) -> io::Result<PathBuf> {
    std::fs::create_dir_all(root)?;
    let base = format!("row-{row:05}");

    for attempt in 1..=MAX_DIR_SUFFIX {
        let name = if attempt == 1 {
            base.clone()
        } else {
            format!("{base}-{attempt}")
        };
        let candidate = root.join(name);
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {}
            Err(error) => return Err(error),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free artifact directory for row {row} under {}", root.display()),
    ))
}

/// Makes a page title safe as a file stem on every common filesystem.
///
/// Replaces `< > : " / \ | ? *` with `_`, drops control characters, trims
/// leading and trailing dots and spaces, and caps the length. Blank input
/// yields `Untitled`.
#[must_use]
pub fn sanitize_file_stem(title: &str) -> String {
    let replaced: String = title
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    let capped: String = trimmed.chars().take(MAX_STEM_CHARS).collect();
    let capped = capped.trim_end_matches(|c| c == '.' || c == ' ');

    if capped.is_empty() {
        "Untitled".to_string()
    } else {
        capped.to_string()
    }
}

/// True for names of partially written downloads.
#[must_use]
pub fn is_in_progress(name: &str) -> bool {
    IN_PROGRESS_SUFFIXES
        .iter()
        .any(|suffix| name.to_ascii_lowercase().ends_with(suffix))
}

/// Snapshot of a directory's regular files.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirListing {
    /// Completed files, sorted by name.
    pub complete: Vec<PathBuf>,
    /// Files still being written.
    pub in_progress: usize,
}

/// Lists regular files of `dir`, excluding names in `ignore`.
///
/// # Errors
///
/// Returns the IO error when the directory cannot be read.
pub fn list_files(dir: &Path, ignore: &[PathBuf]) -> io::Result<DirListing> {
    let mut listing = DirListing::default();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if ignore.contains(&path) {
            continue;
        }
        if is_in_progress(&entry.file_name().to_string_lossy()) {
            listing.in_progress += 1;
        } else {
            listing.complete.push(path);
        }
    }
    listing.complete.sort();
    Ok(listing)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_row_dir_never_reuses_existing() {
        let temp = tempfile::tempdir().unwrap();
        let first = allocate_row_dir(temp.path(), 42).unwrap();
        std::fs::write(first.join("keep.csv"), "a,b").unwrap();

        let second = allocate_row_dir(temp.path(), 42).unwrap();
        let third = allocate_row_dir(temp.path(), 42).unwrap();

        assert_eq!(first.file_name().unwrap(), "row-00042");
        assert_eq!(second.file_name().unwrap(), "row-00042-2");
        assert_eq!(third.file_name().unwrap(), "row-00042-3");
        assert_eq!(std::fs::read_to_string(first.join("keep.csv")).unwrap(), "a,b");
    }

    #[test]
    fn test_allocate_row_dir_creates_root() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("nested").join("collected");
        let dir = allocate_row_dir(&root, 0).unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir.file_name().unwrap(), "row-00000");
    }

    #[test]
    fn test_sanitize_file_stem_replaces_reserved_characters() {
        assert_eq!(
            sanitize_file_stem("COVID-19: Cases/Deaths by State?"),
            "COVID-19_ Cases_Deaths by State_"
        );
    }

    #[test]
    fn test_sanitize_file_stem_trims_dots_and_spaces() {
        assert_eq!(sanitize_file_stem("  ..Weekly Report.. "), "Weekly Report");
    }

    #[test]
    fn test_sanitize_file_stem_blank_is_untitled() {
        assert_eq!(sanitize_file_stem(" . "), "Untitled");
        assert_eq!(sanitize_file_stem(""), "Untitled");
    }

    #[test]
    fn test_sanitize_file_stem_caps_length() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_file_stem(&long).chars().count(), MAX_STEM_CHARS);
    }

    #[test]
    fn test_list_files_separates_in_progress_downloads() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("b.csv"), "1").unwrap();
        std::fs::write(temp.path().join("a.csv"), "1").unwrap();
        std::fs::write(temp.path().join("rows.csv.crdownload"), "1").unwrap();
        std::fs::write(temp.path().join("snapshot.pdf"), "1").unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();

        let listing = list_files(temp.path(), &[temp.path().join("snapshot.pdf")]).unwrap();
        assert_eq!(
            listing.complete,
            vec![temp.path().join("a.csv"), temp.path().join("b.csv")]
        );
        assert_eq!(listing.in_progress, 1);
    }
}
