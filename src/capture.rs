use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureSource {
    /// EXIF `DateTimeOriginal`
    Exif,
    /// Filesystem modification time
    Modified,
}

/// When a picture was taken, as local wall-clock time.
///
/// Embedded EXIF capture time wins when present; otherwise the file's
/// modification time is used. A file that cannot be opened is an error,
/// not a file without EXIF.
pub fn captured_at(path: &Path) -> io::Result<(NaiveDateTime, CaptureSource)> {
    let metadata = fs::metadata(path)?;
    if let Some(taken) = read_exif_datetime(path)? {
        return Ok((taken, CaptureSource::Exif));
    }
    let modified: DateTime<Local> = metadata.modified()?.into();
    Ok((modified.naive_local(), CaptureSource::Modified))
}

/// `Ok(None)` when the file has no usable EXIF date.
fn read_exif_datetime(path: &Path) -> io::Result<Option<NaiveDateTime>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(&file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(e) => {
            log::trace!("No EXIF in {}: {}", path.display(), e);
            return Ok(None);
        }
    };
    let field = exif
        .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
        .or_else(|| exif.get_field(exif::Tag::DateTime, exif::In::PRIMARY));
    let taken = match field.map(|f| &f.value) {
        Some(exif::Value::Ascii(values)) => values
            .first()
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .and_then(parse_exif_datetime),
        _ => None,
    };
    Ok(taken)
}

/// EXIF stores `YYYY:MM:DD HH:MM:SS` without a zone; it is taken as local time.
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim().trim_matches('"').trim_end_matches('\0');
    NaiveDateTime::parse_from_str(trimmed, "%Y:%m:%d %H:%M:%S").ok()
}
