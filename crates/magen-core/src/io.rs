use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Replace `path` with `data` through a sibling tempfile, so a patch,
/// descriptor or SDD document is never left half written. A file that
/// already exists keeps its permissions (executable scripts such as
/// `gradlew` stay executable).
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    ensure_dir(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    if let Ok(existing) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create `path` and its parents. A file sitting where a template or output
/// directory should go is reported by name instead of as a bare OS error.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() && !path.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a directory", path.display()),
        )
        .into());
    }
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Append text to an existing file without touching what is already there.
pub fn append_text(path: &Path, text: &str) -> Result<()> {
    let mut f = std::fs::OpenOptions::new().append(true).open(path)?;
    f.write_all(text.as_bytes())?;
    Ok(())
}

/// True if `path` is a directory with at least one entry.
pub fn has_entries(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    Ok(std::fs::read_dir(path)?.next().is_some())
}

/// Remove `path` (if present) and recreate it empty.
pub fn reset_dir(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path)?;
    }
    ensure_dir(path)
}

/// Recursively copy the contents of `src` into `dst`, creating `dst` if needed.
///
/// Entries for which `skip` returns true (given the path relative to `src`)
/// are not copied; a skipped directory prunes its whole subtree.
pub fn copy_tree_filtered<F>(src: &Path, dst: &Path, skip: F) -> Result<usize>
where
    F: Fn(&Path) -> bool,
{
    ensure_dir(dst)?;
    let mut copied = 0;
    let walker = WalkDir::new(src)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| match e.path().strip_prefix(src) {
            Ok(rel) => !skip(rel),
            Err(_) => true,
        });
    for entry in walker {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Recursively copy the contents of `src` into `dst`.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    copy_tree_filtered(src, dst, |_| false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/layer.patch");
        atomic_write(&path, b"data").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "data");
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("gradlew");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        atomic_write(&script, b"#!/bin/sh\nexec java\n").unwrap();
        let mode = std::fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn ensure_dir_names_a_blocking_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("out");
        std::fs::write(&blocker, "x").unwrap();
        let err = ensure_dir(&blocker).unwrap_err();
        assert!(err.to_string().contains("exists and is not a directory"));
        ensure_dir(&dir.path().join("a/b")).unwrap();
        ensure_dir(&dir.path().join("a/b")).unwrap();
    }

    #[test]
    fn append_text_keeps_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prd.md");
        std::fs::write(&path, "# PRD\n").unwrap();
        append_text(&path, "done\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# PRD\ndone\n");
    }

    #[test]
    fn append_text_requires_existing_file() {
        let dir = TempDir::new().unwrap();
        assert!(append_text(&dir.path().join("missing.md"), "x").is_err());
    }

    #[test]
    fn has_entries_distinguishes_empty_and_missing() {
        let dir = TempDir::new().unwrap();
        assert!(!has_entries(&dir.path().join("nope")).unwrap());
        assert!(!has_entries(dir.path()).unwrap());
        std::fs::write(dir.path().join("f"), "x").unwrap();
        assert!(has_entries(dir.path()).unwrap());
    }

    #[test]
    fn copy_tree_copies_nested_files() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("{{projectName}}/Views")).unwrap();
        std::fs::write(src.path().join("{{projectName}}/Views/A.swift"), "a").unwrap();
        std::fs::write(src.path().join("README.md"), "r").unwrap();

        let copied = copy_tree(src.path(), dst.path()).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(
            std::fs::read_to_string(dst.path().join("{{projectName}}/Views/A.swift")).unwrap(),
            "a"
        );
    }

    #[test]
    fn copy_tree_filtered_prunes_skipped_entries() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::write(src.path().join("variables.json"), "{}").unwrap();
        std::fs::write(src.path().join("App.swift"), "a").unwrap();

        copy_tree_filtered(src.path(), dst.path(), |rel| rel == Path::new("variables.json"))
            .unwrap();
        assert!(dst.path().join("App.swift").exists());
        assert!(!dst.path().join("variables.json").exists());
    }

    #[test]
    fn reset_dir_clears_contents() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("test");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale.txt"), "x").unwrap();
        reset_dir(&target).unwrap();
        assert!(target.is_dir());
        assert!(!has_entries(&target).unwrap());
    }
}
