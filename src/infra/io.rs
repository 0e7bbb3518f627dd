use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::{self, File};
use std::path::Path;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

/// Mode for every directory the run creates.
pub const DIR_MODE: u32 = 0o755;

pub enum FileContent {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl AsRef<[u8]> for FileContent {
    fn as_ref(&self) -> &[u8] {
        match self {
            FileContent::Mapped(mmap) => &mmap[..],
            FileContent::Buffered(bytes) => bytes.as_slice(),
        }
    }
}

/// Read a file as raw bytes. PHP sources are not guaranteed to be UTF-8.
pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent> {
    let path = path.as_ref();
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD {
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: the mapping is read-only and dropped before the commit phase
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        let content =
            fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

/// Create `dir` and any missing parents with mode 0755.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    std::os::unix::fs::DirBuilderExt::mode(&mut builder, DIR_MODE);
    builder
        .create(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))
}

/// Force a directory to 0755, regardless of the process umask.
pub fn normalize_dir_mode(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(DIR_MODE))
            .with_context(|| format!("Failed to set permissions on {}", dir.display()))?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

/// Atomically replace `path` with `data`.
///
/// Writes a temp file in the destination directory, syncs it, carries over
/// `mode` (or the existing file's permissions, or 0644), then renames it
/// into place. Parent directories are created first.
pub fn write_atomic(path: &Path, data: &[u8], mode: Option<fs::Permissions>) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(dir)?;

    #[cfg(unix)]
    let perms = mode.or_else(|| fs::metadata(path).map(|m| m.permissions()).ok()).unwrap_or_else(
        || std::os::unix::fs::PermissionsExt::from_mode(0o644),
    );
    #[cfg(not(unix))]
    let perms = mode.or_else(|| fs::metadata(path).map(|m| m.permissions()).ok());

    // Next to the destination: the rename must not cross filesystems
    let tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create a temp file in {}", dir.display()))?;

    use std::io::Write;
    let mut file = tmp.as_file();
    file.write_all(data)
        .with_context(|| format!("Failed to write {}", tmp.path().display()))?;
    file.sync_all()?;

    #[cfg(unix)]
    fs::set_permissions(tmp.path(), perms).context("set temp permissions")?;
    #[cfg(not(unix))]
    if let Some(perms) = perms {
        fs::set_permissions(tmp.path(), perms).context("set temp permissions")?;
    }

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    #[cfg(unix)]
    {
        if let Ok(parent_file) = File::open(dir) {
            let _ = parent_file.sync_all();
        }
    }

    Ok(())
}

/// Content hash used to skip rewriting files whose bytes did not change.
pub fn content_hash(data: &[u8]) -> u64 {
    xxhash_rust::xxh64::xxh64(data, 0)
}

/// True when `path` already holds exactly `data`.
pub fn unchanged_on_disk(path: &Path, data: &[u8]) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == data.len() as u64 => read_file_smart(path)
            .map(|existing| content_hash(existing.as_ref()) == content_hash(data))
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_atomic_failure_leaves_no_temp_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("Taken.php");
        fs::create_dir(&path)?;
        fs::write(path.join("keep.txt"), "x")?;

        let err = write_atomic(&path, b"<?php", None).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to replace"));
        assert!(path.is_dir());

        let names: Vec<_> = fs::read_dir(dir.path())?
            .map(|e| e.map(|e| e.file_name()))
            .collect::<Result<_, _>>()?;
        assert_eq!(names, vec![std::ffi::OsString::from("Taken.php")]);
        Ok(())
    }

    #[test]
    fn write_atomic_creates_parents_and_replaces() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("a/b/c.php");

        write_atomic(&path, b"<?php // one", None)?;
        assert_eq!(fs::read(&path)?, b"<?php // one");

        write_atomic(&path, b"<?php // two", None)?;
        assert_eq!(fs::read(&path)?, b"<?php // two");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn created_directories_are_0755() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new()?;
        let nested = dir.path().join("x/y");
        ensure_dir(&nested)?;
        let mode = fs::metadata(&nested)?.permissions().mode() & 0o777;
        // umask may only remove bits
        assert_eq!(mode & !0o755, 0);

        normalize_dir_mode(&nested)?;
        let mode = fs::metadata(&nested)?.permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn write_atomic_keeps_requested_mode() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new()?;
        let path = dir.path().join("bin.php");
        write_atomic(&path, b"x", Some(fs::Permissions::from_mode(0o755)))?;
        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o755);
        Ok(())
    }

    #[test]
    fn unchanged_detection() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("f.php");
        fs::write(&path, b"same")?;
        assert!(unchanged_on_disk(&path, b"same"));
        assert!(!unchanged_on_disk(&path, b"diff"));
        assert!(!unchanged_on_disk(&dir.path().join("missing"), b"same"));
        Ok(())
    }
}
