/*
 * Filesystem primitives shared by the project tree and the version ledger:
 * directory creation, file and tree copies, moves that survive cross-device
 * renames, recursive sizes and removal of emptied directories. Every helper
 * operates on a single item so bulk callers can count per-item failures and
 * keep going.
 */
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/*
 * Error type for filesystem helpers. `Walk` carries traversal failures from
 * `walkdir`, `InvalidPath` flags a path that does not have the expected shape
 * (missing, not a directory, no file name).
 */
#[derive(Debug)]
pub enum FileSystemError {
    Io(io::Error),
    Walk(walkdir::Error),
    InvalidPath(PathBuf),
}

impl From<io::Error> for FileSystemError {
    fn from(err: io::Error) -> Self {
        FileSystemError::Io(err)
    }
}

impl From<walkdir::Error> for FileSystemError {
    fn from(err: walkdir::Error) -> Self {
        FileSystemError::Walk(err)
    }
}

impl std::fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSystemError::Io(e) => write!(f, "I/O error: {e}"),
            FileSystemError::Walk(e) => write!(f, "Directory traversal error: {e}"),
            FileSystemError::InvalidPath(p) => write!(f, "Invalid path: {p:?}"),
        }
    }
}

impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileSystemError::Io(e) => Some(e),
            FileSystemError::Walk(e) => Some(e),
            FileSystemError::InvalidPath(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FileSystemError>;

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        fs::create_dir_all(path)?;
        log::trace!("FileSystem: Created directory {path:?}");
    }
    Ok(())
}

/* Copies one file, creating the destination's parent directory first. */
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    if !src.is_file() {
        return Err(FileSystemError::InvalidPath(src.to_path_buf()));
    }
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    let bytes = fs::copy(src, dst)?;
    log::trace!("FileSystem: Copied {src:?} -> {dst:?} ({bytes} bytes)");
    Ok(bytes)
}

/*
 * Recursively copies the directory `src` to `dst`. `dst` is created if needed;
 * existing files inside it are overwritten.
 */
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        return Err(FileSystemError::InvalidPath(src.to_path_buf()));
    }
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| FileSystemError::InvalidPath(entry.path().to_path_buf()))?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    log::trace!("FileSystem: Copied tree {src:?} -> {dst:?}");
    Ok(())
}

/* Removes `dst` if it exists and copies the `src` tree in its place. */
pub fn replace_dir_with_copy(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() {
        remove_entry(dst)?;
    }
    copy_dir_recursive(src, dst)
}

/* Deletes a file, or a directory together with its contents. */
pub fn remove_entry(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    log::trace!("FileSystem: Removed {path:?}");
    Ok(())
}

/*
 * Moves a file or directory. Falls back to copy-then-delete when a plain rename
 * fails (for example across filesystems). Never overwrites: an existing `dst`
 * is reported as `InvalidPath`.
 */
pub fn move_entry(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() {
        return Err(FileSystemError::InvalidPath(dst.to_path_buf()));
    }
    if fs::rename(src, dst).is_ok() {
        log::trace!("FileSystem: Renamed {src:?} -> {dst:?}");
        return Ok(());
    }
    if src.is_dir() {
        copy_dir_recursive(src, dst)?;
    } else {
        copy_file(src, dst)?;
    }
    remove_entry(src)?;
    log::trace!("FileSystem: Moved {src:?} -> {dst:?} via copy");
    Ok(())
}

/* Size of a file, or the summed size of every file below a directory. */
pub fn entry_size(path: &Path) -> u64 {
    if path.is_file() {
        return fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    }
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

/* Immediate children of `dir`, sorted by path. A missing directory is empty. */
pub fn list_children(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut children = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    children.sort();
    Ok(children)
}

/*
 * Removes `dir` and any descendant directories that are empty, bottom-up.
 * Directories that still hold files are left alone. Returns whether `dir`
 * itself was removed.
 */
pub fn remove_empty_dirs(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    for entry in WalkDir::new(dir)
        .contents_first(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
    {
        // Fails on non-empty directories, which is the point.
        let _ = fs::remove_dir(entry.path());
    }
    !dir.exists()
}

pub fn file_name_string(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
