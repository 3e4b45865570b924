pub mod capture;
pub mod classifier;
#[cfg(feature = "desktop")]
mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod log_store;
pub mod mover;
#[cfg(feature = "desktop")]
mod notifications;
pub mod organizer;
pub mod scheduler;
#[cfg(feature = "desktop")]
mod tray;

use std::sync::Arc;

use config::SettingsStore;
use log_store::{LogEntry, LogStore, DEFAULT_LOG_CAPACITY};
use organizer::Organizer;
use scheduler::Scheduler;

/// Open the process log first so a settings fallback can be recorded in it.
fn open_stores() -> (Arc<LogStore>, Arc<SettingsStore>) {
    let log = Arc::new(LogStore::open(&db::log_db_path(), DEFAULT_LOG_CAPACITY));
    log.append([LogEntry::info("Application started")]);
    let settings = Arc::new(SettingsStore::open(config::settings_path(), log.clone()));
    (log, settings)
}

#[cfg(not(feature = "desktop"))]
pub fn run() {
    env_logger::init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            return;
        }
    };

    runtime.block_on(async {
        let (log, settings) = open_stores();
        let organizer = Arc::new(Organizer::new(settings.clone(), log));
        let (scheduler, mut completed) =
            Scheduler::start(organizer, settings.current().interval());

        let forward_settings = settings.clone();
        let forward = tokio::spawn(async move {
            while let Some(result) = completed.recv().await {
                let mode = forward_settings.current().notification_mode;
                if mode.should_notify(&result) {
                    log::info!(
                        "{} files organized, {} failed",
                        result.success_count,
                        result.fail_count
                    );
                }
            }
        });

        log::info!(
            "Organizing {} (Ctrl-C to stop)",
            settings.current().watch_folder.display()
        );
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
        }
        scheduler.shutdown().await;
        drop(scheduler);
        if let Err(e) = forward.await {
            log::error!("Result forwarder ended abnormally: {}", e);
        }
    });
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tauri::WindowEvent;

    use commands::AppState;

    env_logger::init();

    let (log, settings) = open_stores();
    let organizer = Arc::new(Organizer::new(settings.clone(), log.clone()));
    let interval = settings.current().interval();
    // The worker has to live on Tauri's runtime
    let (scheduler, completed) =
        tauri::async_runtime::block_on(async move { Scheduler::start(organizer, interval) });

    let state = AppState {
        settings,
        log,
        scheduler,
    };

    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            tray::show_main_window(app);
        }))
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_notification::init())
        .manage(state)
        .invoke_handler(tauri::generate_handler![
            commands::get_setting_for_screen,
            commands::save_setting_for_screen,
            commands::load_settings_from_file,
            commands::save_settings_to_file,
            commands::get_settings_path,
            commands::get_log_for_screen,
            commands::fetch_app_process_log,
            commands::clear_app_process_log,
            commands::exec_file_organize,
            commands::get_scheduler_status,
            commands::open_watch_folder,
        ])
        .setup(move |app| {
            tray::setup_tray_icon(app)?;
            notifications::forward_run_results(app.handle().clone(), completed);
            Ok(())
        })
        .on_window_event(|window, event| {
            if let WindowEvent::CloseRequested { api, .. } = event {
                // Closing the settings window hides it; the app keeps running in the tray
                if let Err(e) = window.hide() {
                    log::warn!("Failed to hide window: {}", e);
                }
                api.prevent_close();
            }
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
