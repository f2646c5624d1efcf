//! Filesystem helpers shared by the persisted formats and the miner.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::ReviewError;

pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "png", "jpeg", "bmp", "webp"];

/// Replaces `path` with `contents` via a sibling temp file and a rename.
///
/// Readers see either the old file or the new one, never a torn write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ReviewError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|source| ReviewError::AtomicWrite {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|source| ReviewError::AtomicWrite {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.write_all(contents)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|source| ReviewError::AtomicWrite {
            path: path.to_path_buf(),
            source,
        })?;
    tmp.persist(path).map_err(|err| ReviewError::AtomicWrite {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}

/// Collects files directly inside `dir` whose extension is in `extensions`.
///
/// Subdirectories are not entered: per-image files are keyed by file stem,
/// which is only unique within one directory.
pub fn collect_top_level_files(
    dir: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, ReviewError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = entry.map_err(|source| ReviewError::ProjectStructure {
            path: dir.to_path_buf(),
            message: format!("failed while listing directory: {source}"),
        })?;

        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

pub fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}

/// Reads `(width, height)` from the image header without decoding pixels.
pub fn read_image_dimensions(path: &Path) -> Result<(u32, u32), ReviewError> {
    let size = imagesize::size(path).map_err(|source| ReviewError::ImageDimensionRead {
        path: path.to_path_buf(),
        source,
    })?;

    let width: u32 = size
        .width
        .try_into()
        .map_err(|_| ReviewError::ProjectStructure {
            path: path.to_path_buf(),
            message: format!("image width {} does not fit in u32", size.width),
        })?;
    let height: u32 = size
        .height
        .try_into()
        .map_err(|_| ReviewError::ProjectStructure {
            path: path.to_path_buf(),
            message: format!("image height {} does not fit in u32", size.height),
        })?;

    Ok((width, height))
}

/// `path` relative to `root`, with forward slashes.
pub fn rel_string(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}
