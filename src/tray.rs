use tauri::{
    menu::{Menu, MenuItem},
    tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent},
    App, AppHandle, Manager,
};

use crate::commands::AppState;

const MENU_ID_ORGANIZE: &str = "organize";
const MENU_ID_QUIT: &str = "quit";

pub fn show_main_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window("main") {
        let _ = window.show();
        let _ = window.set_focus();
    }
}

pub fn setup_tray_icon(app: &mut App) -> tauri::Result<()> {
    let menu_organize = MenuItem::with_id(app, MENU_ID_ORGANIZE, "Organize now", true, None::<&str>)?;
    let menu_quit = MenuItem::with_id(app, MENU_ID_QUIT, "Quit", true, None::<&str>)?;
    let menu = Menu::with_items(app, &[&menu_organize, &menu_quit])?;

    let app_name = app
        .config()
        .product_name
        .clone()
        .unwrap_or_else(|| "Photo Date Organizer".to_string());

    let mut builder = TrayIconBuilder::new()
        .tooltip(app_name)
        .menu(&menu)
        .show_menu_on_left_click(false)
        .on_menu_event(|app, event| match event.id.as_ref() {
            MENU_ID_ORGANIZE => {
                app.state::<AppState>().scheduler.trigger(None);
            }
            MENU_ID_QUIT => {
                let app = app.clone();
                tauri::async_runtime::spawn(async move {
                    // let an in-flight run finish so no file is left half-moved
                    app.state::<AppState>().scheduler.shutdown().await;
                    app.exit(0);
                });
            }
            _ => {}
        })
        .on_tray_icon_event(|tray, event| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                show_main_window(tray.app_handle());
            }
        });
    if let Some(icon) = app.default_window_icon() {
        builder = builder.icon(icon.clone());
    }
    builder.build(app)?;
    Ok(())
}
