use std::path::PathBuf;

use tauri::State;
use tauri_plugin_opener::OpenerExt;

use crate::scheduler::{SchedulerState, TriggerOutcome};
use super::AppState;

#[tauri::command]
pub fn get_log_for_screen(state: State<AppState>) -> Vec<String> {
    state.log.fetch_all()
}

#[tauri::command]
pub fn fetch_app_process_log(state: State<AppState>) -> Result<Vec<String>, String> {
    Ok(state.log.fetch_all())
}

#[tauri::command]
pub fn clear_app_process_log(state: State<AppState>) {
    state.log.clear();
}

/// Fire-and-forget. The result arrives later as an `organize-complete` event.
/// An empty path organizes the configured watch folder.
#[tauri::command]
pub fn exec_file_organize(state: State<AppState>, folder_path: String) -> Result<(), String> {
    let folder = match folder_path.trim() {
        "" => None,
        path => Some(PathBuf::from(path)),
    };
    match state.scheduler.trigger(folder) {
        TriggerOutcome::Accepted | TriggerOutcome::AlreadyRunning => Ok(()),
        TriggerOutcome::Stopped => Err("Organizer is not running".to_string()),
    }
}

#[tauri::command]
pub fn get_scheduler_status(state: State<AppState>) -> SchedulerState {
    state.scheduler.state()
}

/// Opens the watch folder in the OS file manager.
#[tauri::command]
pub fn open_watch_folder(app: tauri::AppHandle, state: State<AppState>) -> Result<(), String> {
    let folder = state.settings.current().watch_folder;
    if !folder.exists() {
        return Err(format!("Path '{}' does not exist", folder.display()));
    }
    app.opener()
        .open_path(folder.to_string_lossy(), None::<&str>)
        .map_err(|e| format!("Failed to open file manager: {}", e))
}
