use tauri::{AppHandle, Emitter, Manager};
use tauri_plugin_notification::NotificationExt;
use tokio::sync::mpsc;

use crate::commands::AppState;
use crate::organizer::RunResult;

/// Event carrying `{ successCount, failCount }` after every run.
pub const ORGANIZE_COMPLETE_EVENT: &str = "organize-complete";

/// Relays finished runs to the settings screen and, per the notification
/// mode, to the desktop.
pub fn forward_run_results(app: AppHandle, mut completed: mpsc::UnboundedReceiver<RunResult>) {
    tauri::async_runtime::spawn(async move {
        while let Some(result) = completed.recv().await {
            if let Err(e) = app.emit(ORGANIZE_COMPLETE_EVENT, result.summary()) {
                log::warn!("Failed to emit {}: {}", ORGANIZE_COMPLETE_EVENT, e);
            }
            show_files_count_notification(&app, &result);
        }
    });
}

fn show_files_count_notification(app: &AppHandle, result: &RunResult) {
    let mode = app.state::<AppState>().settings.current().notification_mode;
    if !mode.should_notify(result) {
        return;
    }

    let body = if result.fail_count > 0 {
        format!(
            "{} files organized, {} failed",
            result.success_count, result.fail_count
        )
    } else {
        format!("{} files organized", result.success_count)
    };
    if let Err(e) = app.notification().builder().body(body).show() {
        log::warn!("Failed to show notification: {}", e);
    }
}
