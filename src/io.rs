use std::fs;
use std::io;

use camino::{FromPathBufError, Utf8Path, Utf8PathBuf};
use glob::{GlobError, Pattern, PatternError};

use crate::error::CleanError;

/// Delete the directory at `path` if it exists.
pub(crate) fn remove_dir(path: &Utf8Path) -> Result<(), CleanError> {
    if fs::metadata(path).is_ok() {
        fs::remove_dir_all(path) //
            .map_err(|e| CleanError::Remove(path.to_string(), e))?;
    }

    Ok(())
}

pub(crate) fn create_dir(path: &Utf8Path) -> Result<(), CleanError> {
    fs::create_dir_all(path) //
        .map_err(|e| CleanError::Create(path.to_string(), e))
}

/// Write `data` to `path`, creating the parent directories.
pub(crate) fn write(path: &Utf8Path, data: impl AsRef<[u8]>) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    fs::write(path, data)
}

/// A destination is up to date when it has the same length as the source and
/// was modified no earlier than it.
pub(crate) fn is_up_to_date(src: &Utf8Path, dst: &Utf8Path) -> io::Result<bool> {
    let dst = match fs::metadata(dst) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let src = fs::metadata(src)?;

    Ok(src.len() == dst.len() && dst.modified()? >= src.modified()?)
}

/// Copy `src` to `dst` unless `dst` is already up to date. Returns whether
/// the file was copied.
pub(crate) fn copy_if_stale(src: &Utf8Path, dst: &Utf8Path) -> io::Result<bool> {
    if is_up_to_date(src, dst)? {
        return Ok(false);
    }

    if let Some(dir) = dst.parent() {
        fs::create_dir_all(dir)?;
    }

    fs::copy(src, dst)?;
    Ok(true)
}

/// Every file below `dir`, recursively, in sorted order. A missing directory
/// has no files.
pub(crate) fn list_files(dir: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
    let mut files = Vec::new();

    if fs::metadata(dir).is_ok() {
        list_rec(dir, &mut files)?;
    }

    files.sort();
    Ok(files)
}

fn list_rec(dir: &Utf8Path, acc: &mut Vec<Utf8PathBuf>) -> io::Result<()> {
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            list_rec(entry.path(), acc)?;
        } else {
            acc.push(entry.path().to_path_buf());
        }
    }

    Ok(())
}

/// A trailing `**` only yields directories, `dir/**` means every file below
/// `dir`.
fn expand_recursive(pattern: &str) -> String {
    match pattern.strip_suffix("**") {
        Some(head) if head.is_empty() || head.ends_with('/') => format!("{pattern}/*"),
        _ => pattern.to_string(),
    }
}

/// Every file matching `pattern` below `base`, in sorted order. Directories
/// matched by the pattern are skipped, a pattern without matches is fine.
pub(crate) fn glob_files<E>(base: &Utf8Path, pattern: &str) -> Result<Vec<Utf8PathBuf>, E>
where
    E: From<PatternError> + From<GlobError> + From<FromPathBufError>,
{
    let pattern = format!(
        "{}/{}",
        Pattern::escape(base.as_str()),
        expand_recursive(pattern)
    );

    let mut paths = Vec::new();
    for path in glob::glob(&pattern)? {
        let path = Utf8PathBuf::try_from(path?)?;
        if path.is_file() {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}
