use tauri::State;

use crate::config::Settings;
use crate::log_store::LogEntry;
use super::AppState;

#[tauri::command]
pub fn get_setting_for_screen(state: State<AppState>) -> Settings {
    state.settings.current()
}

#[tauri::command]
pub fn save_setting_for_screen(state: State<AppState>, settings: Settings) -> Result<(), String> {
    apply_settings(&state, settings)
}

/// Re-reads the settings file, falling back to defaults.
#[tauri::command]
pub fn load_settings_from_file(state: State<AppState>) -> Settings {
    let settings = state.settings.load();
    state.scheduler.set_interval(settings.interval());
    settings
}

#[tauri::command]
pub fn save_settings_to_file(state: State<AppState>, settings: Settings) -> Result<(), String> {
    apply_settings(&state, settings)
}

/// Get the settings file path so the user knows where it lives.
#[tauri::command]
pub fn get_settings_path(state: State<AppState>) -> String {
    state.settings.path().to_string_lossy().to_string()
}

fn apply_settings(state: &AppState, settings: Settings) -> Result<(), String> {
    state.settings.save(&settings).map_err(|e| e.to_string())?;
    state.scheduler.set_interval(settings.interval());
    state.log.append([LogEntry::info(format!(
        "Settings saved (every {}s, date line {})",
        settings.interval_sec, settings.date_line
    ))]);
    Ok(())
}
