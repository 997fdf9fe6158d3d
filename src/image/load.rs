//! Image decoding and folder scanning.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use clap::ValueEnum;
use image::DynamicImage;

use crate::error::{Error, Result};

/// File extensions picked up by folder scans.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "bmp"];

/// Ordering applied to scanned files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum SortOrder {
    /// Base filename, case-insensitive, ascending.
    #[default]
    NameAsc,
    /// Base filename, case-insensitive, descending.
    NameDesc,
    /// Modification time, oldest first.
    MtimeAsc,
    /// Modification time, newest first.
    MtimeDesc,
}

impl SortOrder {
    /// Sort `files` in place.
    ///
    /// Descending orders reverse the stable ascending sort, so ties keep
    /// reversed scan order.
    ///
    /// # Errors
    ///
    /// Returns an error if a modification time cannot be read.
    pub fn apply(self, files: &mut Vec<PathBuf>) -> Result<()> {
        match self {
            Self::NameAsc | Self::NameDesc => {
                files.sort_by_cached_key(|path| lowercase_name(path));
            }
            Self::MtimeAsc | Self::MtimeDesc => {
                let mut keyed = files
                    .drain(..)
                    .map(|path| -> Result<(SystemTime, PathBuf)> { Ok((modified(&path)?, path)) })
                    .collect::<Result<Vec<_>>>()?;
                keyed.sort_by_key(|(mtime, _)| *mtime);
                files.extend(keyed.into_iter().map(|(_, path)| path));
            }
        }

        if matches!(self, Self::NameDesc | Self::MtimeDesc) {
            files.reverse();
        }

        Ok(())
    }
}

/// Decode an image file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded.
pub fn decode_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();

    image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// List image files under `folder` whose extension is in `extensions`.
///
/// Extensions match case-insensitively. Entries whose name starts with `.`
/// are skipped, and so are the contents of hidden directories. Each directory
/// is visited once, so symlink loops do not repeat files. The result is in
/// directory order; use [`SortOrder::apply`] for a stable order.
///
/// # Errors
///
/// Returns an error if a directory cannot be read.
pub fn list_images(folder: &Path, recursive: bool, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut visited = HashSet::new();
    collect(folder, recursive, extensions, &mut visited, &mut files)?;
    Ok(files)
}

fn collect(
    dir: &Path,
    recursive: bool,
    extensions: &[&str],
    visited: &mut HashSet<PathBuf>,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    if !visited.insert(fs::canonicalize(dir)?) {
        tracing::debug!("Skipping already scanned directory {}", dir.display());
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() || (file_type.is_symlink() && path.is_dir()) {
            if recursive {
                collect(&path, recursive, extensions, visited, out)?;
            }
        } else if path.is_file() && has_extension(&path, extensions) {
            out.push(path);
        }
    }

    Ok(())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

fn lowercase_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn modified(path: &Path) -> Result<SystemTime> {
    Ok(fs::metadata(path)?.modified()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_list_filters_extensions_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.png"));
        touch(&dir.path().join("A.JPG"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join(".hidden.png"));
        touch(&dir.path().join("sub/c.webp"));

        let mut files = list_images(dir.path(), false, &IMAGE_EXTENSIONS).unwrap();
        SortOrder::NameAsc.apply(&mut files).unwrap();

        assert_eq!(names(&files), vec!["A.JPG", "b.png"]);
    }

    #[test]
    fn test_list_recursive_skips_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.png"));
        touch(&dir.path().join("sub/deeper/c.bmp"));
        touch(&dir.path().join(".cache/d.png"));

        let mut files = list_images(dir.path(), true, &IMAGE_EXTENSIONS).unwrap();
        SortOrder::NameAsc.apply(&mut files).unwrap();

        assert_eq!(names(&files), vec!["a.png", "c.bmp"]);
    }

    #[test]
    fn test_name_desc() {
        let mut files = vec![
            PathBuf::from("x/b.png"),
            PathBuf::from("y/C.png"),
            PathBuf::from("a.png"),
        ];
        SortOrder::NameDesc.apply(&mut files).unwrap();

        assert_eq!(names(&files), vec!["C.png", "b.png", "a.png"]);
    }

    #[test]
    fn test_mtime_sort_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let only = dir.path().join("one.png");
        touch(&only);

        let mut files = vec![only.clone()];
        SortOrder::MtimeDesc.apply(&mut files).unwrap();
        assert_eq!(files, vec![only]);

        let mut missing = vec![dir.path().join("gone.png")];
        assert!(SortOrder::MtimeAsc.apply(&mut missing).is_err());
    }

    #[test]
    fn test_mtime_orders() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        let mut files = Vec::new();
        for (name, offset) in [("a.png", 300), ("b.png", 100), ("c.png", 200)] {
            let path = dir.path().join(name);
            touch(&path);
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(base + std::time::Duration::from_secs(offset))
                .unwrap();
            files.push(path);
        }

        let mut asc = files.clone();
        SortOrder::MtimeAsc.apply(&mut asc).unwrap();
        assert_eq!(names(&asc), vec!["b.png", "c.png", "a.png"]);

        let mut desc = files;
        SortOrder::MtimeDesc.apply(&mut desc).unwrap();
        assert_eq!(names(&desc), vec!["a.png", "c.png", "b.png"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_recursive_symlink_loop_lists_once() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.png"));
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let files = list_images(dir.path(), true, &IMAGE_EXTENSIONS).unwrap();

        assert_eq!(names(&files), vec!["a.png"]);
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_image("does/not/exist.png").unwrap_err();

        assert!(matches!(err, Error::ImageLoad { .. }));
    }
}
