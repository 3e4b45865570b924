use std::fs;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

use crate::classifier;
use crate::config::{Settings, SettingsStore};
use crate::error::{MoveError, RunError};
use crate::log_store::{LogEntry, LogStore};
use crate::mover::{self, FileRecord, Placement};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEntry {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one pass over the watch folder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub success_count: u32,
    pub fail_count: u32,
    /// Entries that were not eligible (wrong type, not a regular file)
    pub skipped_count: u32,
    /// Files that disappeared before they could be moved
    pub already_organized_count: u32,
    pub failures: Vec<FailureEntry>,
    pub folder_error: Option<RunError>,
}

/// Payload of the completion event sent to the settings screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub success_count: u32,
    pub fail_count: u32,
}

impl RunResult {
    pub(crate) fn begin() -> Self {
        let now = Local::now();
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: now,
            finished_at: now,
            success_count: 0,
            fail_count: 0,
            skipped_count: 0,
            already_organized_count: 0,
            failures: Vec::new(),
            folder_error: None,
        }
    }

    fn record_failure(&mut self, path: &Path, reason: String) {
        self.fail_count += 1;
        self.failures.push(FailureEntry {
            path: path.to_path_buf(),
            reason,
        });
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            success_count: self.success_count,
            fail_count: self.fail_count,
        }
    }

    /// Lines for the process log: one per failure, then the run summary.
    pub fn log_entries(&self) -> Vec<LogEntry> {
        if let Some(error) = &self.folder_error {
            return vec![LogEntry::error(format!("Organize failed: {}", error))];
        }
        let mut entries: Vec<LogEntry> = self
            .failures
            .iter()
            .map(|f| {
                LogEntry::error(format!(
                    "Failed to organize {}: {}",
                    f.path.display(),
                    f.reason
                ))
            })
            .collect();
        entries.push(LogEntry::info(format!(
            "Organize finished: {} moved, {} failed",
            self.success_count, self.fail_count
        )));
        entries
    }
}

/// One organize pass. Never fails as a whole: a missing folder ends up in
/// `folder_error`, per-file problems in `failures`.
pub fn execute(settings: &Settings) -> RunResult {
    let mut result = RunResult::begin();
    if let Err(e) = organize(settings, &mut result) {
        log::warn!("Organize run aborted: {}", e);
        result.folder_error = Some(e);
    }
    result.finished_at = Local::now();
    result
}

fn organize(settings: &Settings, result: &mut RunResult) -> Result<(), RunError> {
    let date_line = settings
        .date_line_time()
        .map_err(|e| RunError::InvalidSettings {
            reason: e.to_string(),
        })?;
    let scan = collect_candidates(settings)?;
    result.skipped_count = scan.skipped;

    for candidate in &scan.files {
        // Catch panics per-file to prevent one bad file from aborting the run
        let outcome = catch_unwind(AssertUnwindSafe(|| process_file(candidate, date_line)));
        match outcome {
            Ok(Ok(Placement::Moved(dest))) => {
                log::debug!("{} → {}", candidate.path.display(), dest.display());
                result.success_count += 1;
            }
            Ok(Ok(Placement::AlreadyOrganized)) => {
                result.already_organized_count += 1;
            }
            Ok(Err(e)) => {
                log::warn!("Failed to organize {}: {}", candidate.path.display(), e);
                result.record_failure(&candidate.path, e.to_string());
            }
            Err(_) => {
                log::error!("Panic while organizing {}", candidate.path.display());
                result.record_failure(&candidate.path, "unexpected internal error".to_string());
            }
        }
    }
    Ok(())
}

fn process_file(candidate: &Candidate, date_line: NaiveTime) -> Result<Placement, MoveError> {
    let record = match FileRecord::read(&candidate.path, date_line) {
        Ok(record) => record,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Placement::AlreadyOrganized),
        Err(e) => {
            return Err(MoveError::Metadata {
                path: candidate.path.clone(),
                source: e,
            })
        }
    };
    mover::place(&record, &candidate.root)
}

// ── Scanning ────────────────────────────────────────────────

struct Candidate {
    path: PathBuf,
    /// Folder the date bucket is created in
    root: PathBuf,
}

#[derive(Default)]
struct Scan {
    files: Vec<Candidate>,
    skipped: u32,
}

/// Immediate files of the watch folder, plus one level of non-bucket
/// subfolders when `scan_subfolders` is set.
fn collect_candidates(settings: &Settings) -> Result<Scan, RunError> {
    let folder = &settings.watch_folder;
    let entries = fs::read_dir(folder).map_err(|e| RunError::FolderUnavailable {
        path: folder.clone(),
        reason: e.to_string(),
    })?;

    let mut scan = Scan::default();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Failed to read entry in {}: {}", folder.display(), e);
                continue;
            }
        };
        let path = entry.path();
        let is_bucket = entry
            .file_name()
            .to_str()
            .map(classifier::is_bucket_name)
            .unwrap_or(false);
        match entry.file_type() {
            Ok(t) if t.is_file() => push_if_eligible(&mut scan, settings, path, folder),
            Ok(t) if t.is_dir() && is_bucket => {}
            Ok(t) if t.is_dir() && settings.scan_subfolders => {
                collect_subfolder(&mut scan, settings, &path)
            }
            _ => scan.skipped += 1,
        }
    }

    scan.files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(scan)
}

fn collect_subfolder(scan: &mut Scan, settings: &Settings, dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("Failed to read directory {}: {}", dir.display(), e);
            scan.skipped += 1;
            return;
        }
    };
    for entry in entries.flatten() {
        match entry.file_type() {
            Ok(t) if t.is_file() => push_if_eligible(scan, settings, entry.path(), dir),
            Ok(t) if t.is_dir() => {}
            _ => scan.skipped += 1,
        }
    }
}

fn push_if_eligible(scan: &mut Scan, settings: &Settings, path: PathBuf, root: &Path) {
    if settings.accepts_extension(&path) {
        scan.files.push(Candidate {
            path,
            root: root.to_path_buf(),
        });
    } else {
        scan.skipped += 1;
    }
}

// ── Organizer ───────────────────────────────────────────────

/// Runs passes against the current settings and records them in the log.
pub struct Organizer {
    settings: Arc<SettingsStore>,
    log: Arc<LogStore>,
}

impl Organizer {
    pub fn new(settings: Arc<SettingsStore>, log: Arc<LogStore>) -> Self {
        Self { settings, log }
    }

    /// One pass over the configured watch folder, or over `folder_override`.
    pub fn run(&self, folder_override: Option<&Path>) -> RunResult {
        let mut settings = self.settings.current();
        if let Some(folder) = folder_override {
            settings.watch_folder = folder.to_path_buf();
        }

        log::info!("Organize run started in {}", settings.watch_folder.display());
        let result = execute(&settings);
        log::info!(
            "Organize run {} finished ({} moved, {} failed, {} skipped)",
            result.run_id,
            result.success_count,
            result.fail_count,
            result.skipped_count
        );
        self.log.append(result.log_entries());
        result
    }
}

// ── Tests ───────────────────────────────────────────────────
