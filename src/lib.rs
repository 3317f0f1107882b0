pub mod actions;
pub mod dashboard;
pub mod expansion;
pub mod files;
pub mod hover;
pub mod media;
pub mod models;
pub mod settings;
pub mod window;

use dashboard::DashboardSink;
use files::TrayFile;
use models::MediaSnapshot;

use std::path::PathBuf;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, Manager};

/// Notification sink wired to the Tauri runtime: forwards every change
/// to the webview as events, drives the window presenter, and persists
/// the tray.
struct TauriSink {
    app: AppHandle,
}

impl DashboardSink for TauriSink {
    fn expansion_changed(&self, expanded: bool) {
        let _ = self.app.emit("expansion-changed", expanded);

        if let Some(window) = self.app.get_webview_window("main") {
            if let Err(e) = window::apply_expansion(&window, expanded) {
                log::error!("failed to resize overlay: {}", e);
            }
            // Collapsed, the overlay is a ghost: clicks pass through
            let _ = window.set_ignore_cursor_events(!expanded);
        }

        if expanded {
            window::activate_app();
        }
    }

    fn media_changed(&self, snapshot: &MediaSnapshot) {
        let _ = self.app.emit("media-changed", snapshot);
    }

    fn files_changed(&self, files: &[TrayFile], tray_open: bool) {
        let _ = self.app.emit(
            "tray-changed",
            serde_json::json!({ "files": files, "trayOpen": tray_open }),
        );

        match settings::get_connection(&self.app) {
            Ok(conn) => {
                let paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
                if let Err(e) = settings::save_tray(&conn, &paths) {
                    log::error!("failed to persist tray: {}", e);
                }
            }
            Err(e) => log::error!("failed to open database: {}", e),
        }
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_log::Builder::default().build())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_fs::init())
        .plugin(tauri_plugin_drag::init())
        .invoke_handler(tauri::generate_handler![
            window::get_notch_info,
            window::set_click_through,
            window::activate_window,
            dashboard::pointer_moved,
            dashboard::add_files,
            dashboard::remove_file,
            dashboard::set_tray_open,
            dashboard::set_drag_active,
            dashboard::media_play_pause,
            dashboard::media_next_track,
            dashboard::media_previous_track,
            dashboard::republish_state,
            actions::perform_quick_action,
            settings::get_settings,
            settings::update_setting,
            files::open_file,
            files::reveal_file,
            files::resolve_path,
            files::save_drag_icon,
        ])
        .setup(|app| {
            settings::init_db(app.handle())?;
            let conn = settings::get_connection(app.handle())?;
            let config = settings::load_settings(&conn);
            let restored = match settings::load_tray(&conn) {
                Ok(paths) => paths,
                Err(e) => {
                    log::error!("failed to load persisted tray: {}", e);
                    Vec::new()
                }
            };

            if let Some(window) = app.get_webview_window("main") {
                if let Err(e) = window::setup_window(&window) {
                    log::error!("window setup failed: {}", e);
                }
            }

            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            app.manage(dashboard::DashboardHandle::new(tx.clone()));

            let info = window::screen_notch_info();
            let zone = hover::HotZone::from_screen(&info);

            let host = media::default_host();
            let sink: Arc<dyn DashboardSink> = Arc::new(TauriSink {
                app: app.handle().clone(),
            });
            let dash = dashboard::Dashboard::new(
                zone,
                config.hover_delay,
                restored.into_iter().map(PathBuf::from).collect(),
                host,
                sink,
                tx.clone(),
            );
            tauri::async_runtime::spawn(dash.run(rx));

            // Keep the global pointer sampler alive for the app lifetime
            app.manage(hover::spawn_sampler(tx, zone));

            log::info!(
                "overlay ready on {}x{} (notch {}, hover delay {}s)",
                info.screen_width,
                info.screen_height,
                info.notch_height,
                config.hover_delay
            );
            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
