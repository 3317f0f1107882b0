use crate::models::QuickAction;

/// Perform a dashboard quick action. All of these are fire-and-forget
/// invocations against the host system; failures are logged, never
/// surfaced.
#[tauri::command]
pub fn perform_quick_action(action: QuickAction) {
    match action {
        QuickAction::Screenshot => take_screenshot(),
        QuickAction::Calculator => launch_app("Calculator"),
        QuickAction::Settings => launch_app("System Settings"),
        QuickAction::Lock => lock_screen(),
    }
}

#[cfg(target_os = "macos")]
fn take_screenshot() {
    // -i: interactive selection mode
    if let Err(e) = std::process::Command::new("/usr/sbin/screencapture")
        .arg("-i")
        .spawn()
    {
        log::error!("failed to take screenshot: {}", e);
    }
}

#[cfg(target_os = "macos")]
fn launch_app(name: &str) {
    if let Err(e) = std::process::Command::new("open")
        .args(["-a", name])
        .spawn()
    {
        log::error!("failed to launch {}: {}", name, e);
    }
}

#[cfg(target_os = "macos")]
fn lock_screen() {
    // Ctrl+Cmd+Q locks immediately
    let script = r#"
        tell application "System Events"
            keystroke "q" using {command down, control down}
        end tell
    "#;

    if let Err(e) = std::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .spawn()
    {
        log::error!("failed to lock screen: {}", e);
    }
}

#[cfg(not(target_os = "macos"))]
fn take_screenshot() {
    log::debug!("screenshot quick action not supported on this platform");
}

#[cfg(not(target_os = "macos"))]
fn launch_app(name: &str) {
    log::debug!("launching {} not supported on this platform", name);
}

#[cfg(not(target_os = "macos"))]
fn lock_screen() {
    log::debug!("lock screen quick action not supported on this platform");
}
