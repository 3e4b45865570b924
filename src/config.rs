use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveTime;

use crate::classifier;
use crate::error::{PersistenceError, SettingsError, ValidationError};
use crate::log_store::{LogEntry, LogStore};
use crate::organizer::RunResult;

pub const SETTINGS_VERSION: u32 = 1;
pub const MIN_INTERVAL_SEC: u32 = 10;
pub const MAX_INTERVAL_SEC: u32 = 3600;

/// Get the app data directory: %APPDATA%/photo-date-organizer/
pub fn app_data_dir() -> PathBuf {
    let dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photo-date-organizer");
    fs::create_dir_all(&dir).ok();
    dir
}

pub fn settings_path() -> PathBuf {
    app_data_dir().join("settings.json")
}

// ── Data types ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version of the settings file
    #[serde(default = "default_version")]
    pub version: u32,
    /// Folder whose pictures get sorted into date folders
    #[serde(default = "default_watch_folder")]
    pub watch_folder: PathBuf,
    /// Seconds between runs (10..=3600)
    #[serde(default = "default_interval_sec")]
    pub interval_sec: u32,
    /// Time of day (HH:MM) at which a new logical day begins
    #[serde(default = "default_date_line")]
    pub date_line: String,
    #[serde(default)]
    pub notification_mode: NotificationMode,
    /// Extensions (without dot, case-insensitive) that get organized. Empty = every file.
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,
    /// Also sort files sitting one level down in non-date subfolders (e.g. `2024-01/`).
    /// On by default: the VRChat picture folder keeps its shots in monthly folders.
    #[serde(default = "default_scan_subfolders")]
    pub scan_subfolders: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationMode {
    Always,
    #[default]
    OnSuccess,
    None,
}

impl NotificationMode {
    /// Whether a finished run deserves a desktop notification.
    pub fn should_notify(self, result: &RunResult) -> bool {
        match self {
            NotificationMode::Always => true,
            NotificationMode::OnSuccess => result.success_count > 0,
            NotificationMode::None => false,
        }
    }
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

fn default_watch_folder() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("VRChat")
}

fn default_interval_sec() -> u32 {
    60
}

fn default_date_line() -> String {
    String::from("12:00")
}

fn default_scan_subfolders() -> bool {
    true
}

fn default_file_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "webp"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            watch_folder: default_watch_folder(),
            interval_sec: default_interval_sec(),
            date_line: default_date_line(),
            notification_mode: NotificationMode::default(),
            file_extensions: default_file_extensions(),
            scan_subfolders: default_scan_subfolders(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_INTERVAL_SEC..=MAX_INTERVAL_SEC).contains(&self.interval_sec) {
            return Err(ValidationError::IntervalOutOfRange {
                value: self.interval_sec,
                min: MIN_INTERVAL_SEC,
                max: MAX_INTERVAL_SEC,
            });
        }
        if self.watch_folder.as_os_str().is_empty() {
            return Err(ValidationError::EmptyWatchFolder);
        }
        self.date_line_time()?;
        Ok(())
    }

    pub fn date_line_time(&self) -> Result<NaiveTime, ValidationError> {
        classifier::parse_date_line(&self.date_line)
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_sec.into())
    }

    /// Type filter for candidate files.
    pub fn accepts_extension(&self, path: &Path) -> bool {
        if self.file_extensions.is_empty() {
            return true;
        }
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
            return false;
        };
        self.file_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}

// ── Load / Save ─────────────────────────────────────────────

/// Read the settings file as text. People edit `settings.json` by hand and
/// Windows editors like to save it with a BOM (UTF-8 or UTF-16), which
/// serde_json would otherwise reject as corrupt.
pub fn read_file_strip_bom(path: &Path) -> io::Result<String> {
    let raw = fs::read(path)?;
    match raw.as_slice() {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => decode_utf8(rest),
        bytes => decode_utf8(bytes),
    }
}

fn decode_utf8(bytes: &[u8]) -> io::Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> io::Result<String> {
    let units: Vec<u16> = bytes.chunks_exact(2).map(|c| unit([c[0], c[1]])).collect();
    String::from_utf16(&units).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write-temp-then-replace so a crash mid-write leaves the old file intact.
fn write_atomic(path: &Path, contents: &str) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    let written = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    });
    if let Err(e) = written {
        fs::remove_file(&tmp).ok();
        return Err(PersistenceError::io(&tmp, e));
    }
    fs::rename(&tmp, path).map_err(|e| {
        fs::remove_file(&tmp).ok();
        PersistenceError::io(path, e)
    })
}

/// Owner of the settings file and of the last validated settings.
pub struct SettingsStore {
    path: PathBuf,
    current: Mutex<Settings>,
    log: Arc<LogStore>,
}

impl SettingsStore {
    /// Opens the store and loads the file once. Never fails.
    pub fn open(path: impl Into<PathBuf>, log: Arc<LogStore>) -> Self {
        let store = Self {
            path: path.into(),
            current: Mutex::new(Settings::default()),
            log,
        };
        store.load();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the settings file. Missing, corrupt or invalid content falls
    /// back to defaults and leaves a note in the process log.
    pub fn load(&self) -> Settings {
        let settings = match self.read() {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                log::info!("No settings file at {}, using defaults", self.path.display());
                self.log
                    .append([LogEntry::info("Settings file not found, using defaults")]);
                Settings::default()
            }
            Err(reason) => {
                log::warn!("Ignoring settings file {}: {}", self.path.display(), reason);
                self.log.append([LogEntry::warn(format!(
                    "Settings file unreadable ({}), using defaults",
                    reason
                ))]);
                Settings::default()
            }
        };
        *self.lock() = settings.clone();
        settings
    }

    fn read(&self) -> Result<Option<Settings>, String> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = read_file_strip_bom(&self.path).map_err(|e| e.to_string())?;
        let settings: Settings = serde_json::from_str(&data).map_err(|e| e.to_string())?;
        settings.validate().map_err(|e| e.to_string())?;
        Ok(Some(settings))
    }

    /// Validates and atomically persists `settings`, then makes them current.
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        settings.validate()?;
        let json = serde_json::to_string_pretty(settings).map_err(PersistenceError::from)?;
        write_atomic(&self.path, &json)?;
        *self.lock() = settings.clone();
        log::info!("Settings saved to {}", self.path.display());
        Ok(())
    }

    /// The last loaded or saved settings.
    pub fn current(&self) -> Settings {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Settings> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> (SettingsStore, Arc<LogStore>) {
        let log = Arc::new(LogStore::in_memory(50));
        (SettingsStore::open(dir.path().join("settings.json"), log.clone()), log)
    }

    fn sample() -> Settings {
        Settings {
            version: SETTINGS_VERSION,
            watch_folder: PathBuf::from("/pictures/VRChat"),
            interval_sec: 120,
            date_line: "04:30".to_string(),
            notification_mode: NotificationMode::Always,
            file_extensions: vec!["png".to_string()],
            scan_subfolders: true,
        }
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store_in(&dir);
        store.save(&sample()).unwrap();

        let (reopened, _) = store_in(&dir);
        assert_eq!(reopened.load(), sample());
        assert_eq!(reopened.current(), sample());
        assert!(!dir.path().join("settings.json.tmp").exists());
    }

    #[test]
    fn test_save_rejects_interval_out_of_range() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store_in(&dir);
        for interval_sec in [5, 9999] {
            let settings = Settings { interval_sec, ..sample() };
            let err = store.save(&settings).unwrap_err();
            assert!(matches!(
                err,
                SettingsError::Validation(ValidationError::IntervalOutOfRange { .. })
            ));
        }
        assert!(!store.path().exists());
        assert_eq!(store.current(), Settings::default());
    }

    #[test]
    fn test_save_rejects_malformed_date_line() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store_in(&dir);
        store.save(&sample()).unwrap();

        let bad = Settings { date_line: "25:00".to_string(), ..sample() };
        assert!(matches!(
            store.save(&bad),
            Err(SettingsError::Validation(ValidationError::MalformedDateLine(_)))
        ));
        // the previous good values survive
        assert_eq!(store.load(), sample());
    }

    #[test]
    fn test_failed_write_keeps_previous_settings() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store_in(&dir);
        store.save(&sample()).unwrap();

        // a directory where the temp file should go
        fs::create_dir(dir.path().join("settings.json.tmp")).unwrap();
        let next = Settings { interval_sec: 300, ..sample() };
        assert!(matches!(
            store.save(&next),
            Err(SettingsError::Persistence(PersistenceError::Io { .. }))
        ));
        assert_eq!(store.current(), sample());
        assert_eq!(store.load(), sample());
    }

    #[test]
    fn test_failed_replace_cleans_up_temp_file() {
        let dir = TempDir::new().unwrap();
        // the settings path itself is a directory, so the final rename fails
        fs::create_dir(dir.path().join("settings.json")).unwrap();
        let (store, _) = store_in(&dir);

        assert!(matches!(
            store.save(&sample()),
            Err(SettingsError::Persistence(PersistenceError::Io { .. }))
        ));
        assert_eq!(store.current(), Settings::default());
        assert!(!dir.path().join("settings.json.tmp").exists());
    }

    #[test]
    fn test_settings_dir_under_a_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blocker"), b"file").unwrap();
        let log = Arc::new(LogStore::in_memory(10));
        let store = SettingsStore::open(dir.path().join("blocker").join("settings.json"), log);

        assert!(matches!(store.save(&sample()), Err(SettingsError::Persistence(_))));
        assert_eq!(store.current(), Settings::default());
    }

    #[test]
    fn test_utf16_settings_file() {
        let dir = TempDir::new().unwrap();
        let json = r#"{"interval_sec": 45, "date_line": "05:00", "notification_mode": "always"}"#;
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(json.encode_utf16().flat_map(u16::to_le_bytes));
        fs::write(dir.path().join("settings.json"), bytes).unwrap();

        let (store, _) = store_in(&dir);
        assert_eq!(store.current().interval_sec, 45);
        assert_eq!(store.current().notification_mode, NotificationMode::Always);
    }

    #[test]
    fn test_missing_file_gives_defaults_and_log_entry() {
        let dir = TempDir::new().unwrap();
        let (store, log) = store_in(&dir);
        assert_eq!(store.current(), Settings::default());
        assert_eq!(log.fetch_all().len(), 1);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("settings.json"), "{ not json").unwrap();
        let (store, log) = store_in(&dir);
        assert_eq!(store.current(), Settings::default());
        assert!(log.fetch_all()[0].contains("unreadable"));
    }

    #[test]
    fn test_invalid_values_on_disk_give_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            r#"{"interval_sec": 5, "date_line": "12:00", "notification_mode": "none"}"#,
        )
        .unwrap();
        let (store, _) = store_in(&dir);
        assert_eq!(store.current(), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            "\u{FEFF}{\"interval_sec\": 30, \"date_line\": \"03:00\", \"notification_mode\": \"none\"}",
        )
        .unwrap();
        let (store, _) = store_in(&dir);
        let settings = store.current();
        assert_eq!(settings.interval_sec, 30);
        assert_eq!(settings.date_line, "03:00");
        assert_eq!(settings.notification_mode, NotificationMode::None);
        assert_eq!(settings.file_extensions, default_file_extensions());
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert!(settings.scan_subfolders);
    }

    #[test]
    fn test_notification_mode_wire_names() {
        let json = serde_json::to_string(&NotificationMode::OnSuccess).unwrap();
        assert_eq!(json, "\"onSuccess\"");
        let mode: NotificationMode = serde_json::from_str("\"always\"").unwrap();
        assert_eq!(mode, NotificationMode::Always);
        assert!(serde_json::from_str::<NotificationMode>("\"sometimes\"").is_err());
    }

    #[test]
    fn test_extension_filter() {
        let settings = Settings::default();
        assert!(settings.accepts_extension(Path::new("a/VRChat_1.PNG")));
        assert!(settings.accepts_extension(Path::new("shot.jpeg")));
        assert!(!settings.accepts_extension(Path::new("notes.txt")));
        assert!(!settings.accepts_extension(Path::new("README")));

        let all = Settings { file_extensions: Vec::new(), ..Settings::default() };
        assert!(all.accepts_extension(Path::new("README")));
    }
}
