use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::capture::{self, CaptureSource};
use crate::classifier;
use crate::error::MoveError;

/// Give up on `name (n).ext` after this many candidates.
pub const MAX_COLLISION_ATTEMPTS: u32 = 999;

/// One candidate file of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub source_path: PathBuf,
    pub captured_at: NaiveDateTime,
    pub capture_source: CaptureSource,
    pub organizing_date: NaiveDate,
}

impl FileRecord {
    pub fn read(path: &Path, date_line: NaiveTime) -> io::Result<Self> {
        let (captured_at, capture_source) = capture::captured_at(path)?;
        Ok(Self {
            source_path: path.to_path_buf(),
            captured_at,
            capture_source,
            organizing_date: classifier::organizing_date(captured_at, date_line),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Moved(PathBuf),
    /// The source was gone before we got to it, most likely moved by an
    /// earlier run. Not a failure.
    AlreadyOrganized,
}

/// Move `file` into `<root>/<YYYY-MM-DD>/`, never overwriting.
pub fn place(file: &FileRecord, root: &Path) -> Result<Placement, MoveError> {
    place_with_limit(file, root, MAX_COLLISION_ATTEMPTS)
}

fn place_with_limit(
    file: &FileRecord,
    root: &Path,
    max_attempts: u32,
) -> Result<Placement, MoveError> {
    let source = &file.source_path;
    if !path_occupied(source) {
        return Ok(Placement::AlreadyOrganized);
    }

    let bucket = root.join(classifier::bucket_name(file.organizing_date));
    fs::create_dir_all(&bucket).map_err(|e| MoveError::CreateFolder {
        path: bucket.clone(),
        source: e,
    })?;

    let file_name = source.file_name().ok_or_else(|| MoveError::NoFileName {
        path: source.to_path_buf(),
    })?;
    for dest in destinations(&bucket, source, max_attempts) {
        if path_occupied(&dest) {
            continue;
        }
        match relocate(source, &dest) {
            Ok(()) => return Ok(Placement::Moved(dest)),
            // taken between the check and the link
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !path_occupied(source) => {
                return Ok(Placement::AlreadyOrganized)
            }
            Err(e) => return Err(MoveError::from_io(source.to_path_buf(), dest, e)),
        }
    }
    Err(MoveError::CollisionUnresolved {
        name: file_name.to_string_lossy().to_string(),
        attempts: max_attempts,
    })
}

/// Candidate names inside `dir`: `name.ext`, then `name (1).ext`, `name (2).ext`, ...
fn destinations(dir: &Path, source: &Path, max_attempts: u32) -> impl Iterator<Item = PathBuf> {
    let dir = dir.to_path_buf();
    let first = source.file_name().map(|name| dir.join(name));
    let stem = source.file_stem().unwrap_or_default().to_string_lossy().to_string();
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    first.into_iter().chain(
        (1..=max_attempts).map(move |counter| dir.join(format!("{} ({}){}", stem, counter, ext))),
    )
}

fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Moves `source` to `dest`, failing with `AlreadyExists` rather than
/// replacing anything at `dest`.
fn relocate(source: &Path, dest: &Path) -> io::Result<()> {
    match fs::hard_link(source, dest) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(source) {
                fs::remove_file(dest).ok();
                return Err(e);
            }
            Ok(())
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::AlreadyExists | io::ErrorKind::NotFound) => {
            Err(e)
        }
        Err(link_err) => {
            // e.g. the bucket lives on another volume, or links are unsupported
            log::debug!(
                "hard link {} failed ({}), falling back to copy",
                source.display(),
                link_err
            );
            copy_then_remove(source, dest)
        }
    }
}

/// Copy into a fresh file, then delete the source. If any step fails the
/// copy is removed again so the file only ever exists in one place.
fn copy_then_remove(source: &Path, dest: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;
    let modified = input.metadata()?.modified()?;
    let mut output = OpenOptions::new().write(true).create_new(true).open(dest)?;

    let copied = io::copy(&mut input, &mut output)
        .and_then(|_| output.set_modified(modified))
        .and_then(|()| output.sync_all());
    drop(output);
    drop(input);
    if let Err(e) = copied {
        fs::remove_file(dest).ok();
        return Err(e);
    }

    if let Err(e) = fs::remove_file(source) {
        fs::remove_file(dest).ok();
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(source: PathBuf, date: &str) -> FileRecord {
        let organizing_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        FileRecord {
            source_path: source,
            captured_at: organizing_date.and_hms_opt(12, 0, 0).unwrap(),
            capture_source: CaptureSource::Modified,
            organizing_date,
        }
    }

    #[test]
    fn test_moves_into_date_folder() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("VRChat_1.png");
        fs::write(&source, b"one").unwrap();

        let placement = place(&record(source.clone(), "2024-01-02"), dir.path()).unwrap();
        let dest = dir.path().join("2024-01-02").join("VRChat_1.png");
        assert_eq!(placement, Placement::Moved(dest.clone()));
        assert!(!source.exists());
        assert_eq!(fs::read(dest).unwrap(), b"one");
    }

    #[test]
    fn test_collision_gets_suffix() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let first = dir.path().join("shot.png");
        let second = other.path().join("shot.png");
        fs::write(&first, b"first").unwrap();
        fs::write(&second, b"second").unwrap();

        place(&record(first, "2024-01-02"), dir.path()).unwrap();
        let placement = place(&record(second, "2024-01-02"), dir.path()).unwrap();

        let bucket = dir.path().join("2024-01-02");
        assert_eq!(placement, Placement::Moved(bucket.join("shot (1).png")));
        assert_eq!(fs::read(bucket.join("shot.png")).unwrap(), b"first");
        assert_eq!(fs::read(bucket.join("shot (1).png")).unwrap(), b"second");
    }

    #[test]
    fn test_collision_unresolved() {
        let dir = TempDir::new().unwrap();
        let bucket = dir.path().join("2024-01-02");
        fs::create_dir(&bucket).unwrap();
        for name in ["shot.png", "shot (1).png", "shot (2).png"] {
            fs::write(bucket.join(name), b"taken").unwrap();
        }
        let source = dir.path().join("shot.png");
        fs::write(&source, b"new").unwrap();

        let err = place_with_limit(&record(source.clone(), "2024-01-02"), dir.path(), 2).unwrap_err();
        assert!(matches!(err, MoveError::CollisionUnresolved { attempts: 2, .. }));
        assert!(source.exists());
    }

    #[test]
    fn test_missing_source_is_already_organized() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("gone.png");
        let placement = place(&record(source, "2024-01-02"), dir.path()).unwrap();
        assert_eq!(placement, Placement::AlreadyOrganized);
        assert!(!dir.path().join("2024-01-02").exists());
    }

    #[test]
    fn test_bucket_blocked_by_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("2024-01-02"), b"not a folder").unwrap();
        let source = dir.path().join("shot.png");
        fs::write(&source, b"x").unwrap();

        let err = place(&record(source.clone(), "2024-01-02"), dir.path()).unwrap_err();
        assert!(matches!(err, MoveError::CreateFolder { .. }));
        assert!(source.exists());
    }

    #[test]
    fn test_relocate_never_replaces() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.png");
        let dest = dir.path().join("b.png");
        fs::write(&source, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        let err = relocate(&source, &dest).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&source).unwrap(), b"new");
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }

    #[test]
    fn test_relocate_keeps_modified_time() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.png");
        let dest = dir.path().join("b.png");
        fs::write(&source, b"payload").unwrap();
        let modified = fs::metadata(&source).unwrap().modified().unwrap();

        relocate(&source, &dest).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert_eq!(fs::metadata(&dest).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn test_copy_then_remove() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.png");
        let dest = dir.path().join("b.png");
        fs::write(&source, b"payload").unwrap();
        let modified = fs::metadata(&source).unwrap().modified().unwrap();

        copy_then_remove(&source, &dest).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert_eq!(fs::metadata(&dest).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn test_copy_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.png");
        let dest = dir.path().join("b.png");
        fs::write(&source, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        let err = copy_then_remove(&source, &dest).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }
}
