use crate::models::NotchInfo;
use tauri::{LogicalPosition, LogicalSize, WebviewWindow, Window};

#[cfg(target_os = "macos")]
use objc2::{Encode, Encoding};

#[cfg(target_os = "macos")]
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub(crate) struct CGSize {
    pub width: f64,
    pub height: f64,
}

#[cfg(target_os = "macos")]
unsafe impl Encode for CGSize {
    const ENCODING: Encoding = Encoding::Struct("CGSize", &[f64::ENCODING, f64::ENCODING]);
}

#[cfg(target_os = "macos")]
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub(crate) struct CGPoint {
    pub x: f64,
    pub y: f64,
}

#[cfg(target_os = "macos")]
unsafe impl Encode for CGPoint {
    const ENCODING: Encoding = Encoding::Struct("CGPoint", &[f64::ENCODING, f64::ENCODING]);
}

#[cfg(target_os = "macos")]
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub(crate) struct CGRect {
    pub origin: CGPoint,
    pub size: CGSize,
}

#[cfg(target_os = "macos")]
unsafe impl Encode for CGRect {
    const ENCODING: Encoding = Encoding::Struct("CGRect", &[CGPoint::ENCODING, CGSize::ENCODING]);
}

#[cfg(target_os = "macos")]
#[repr(C)]
#[derive(Debug, Copy, Clone)]
struct NSEdgeInsets {
    top: f64,
    left: f64,
    bottom: f64,
    right: f64,
}

#[cfg(target_os = "macos")]
unsafe impl Encode for NSEdgeInsets {
    const ENCODING: Encoding = Encoding::Struct(
        "NSEdgeInsets",
        &[f64::ENCODING, f64::ENCODING, f64::ENCODING, f64::ENCODING],
    );
}

/// Height assumed for the notch when the display reports no top inset.
pub const FALLBACK_NOTCH_HEIGHT: f64 = 32.0;

/// Collapsed overlay frame (hugs the notch).
pub const COLLAPSED_WIDTH: f64 = 160.0;
pub const COLLAPSED_HEIGHT: f64 = 30.0;

/// Expanded dashboard frame, excluding the notch strip on top.
pub const EXPANDED_WIDTH: f64 = 560.0;
pub const EXPANDED_HEIGHT: f64 = 130.0;

/// Get screen dimensions on macOS including notch width
/// Returns (screen_width, screen_height, notch_height, notch_width)
#[cfg(target_os = "macos")]
pub(crate) fn get_screen_info() -> (f64, f64, f64, f64) {
    use objc2::runtime::AnyObject;
    use objc2::*;

    unsafe {
        let main_screen: *mut AnyObject = msg_send![class!(NSScreen), mainScreen];

        if main_screen.is_null() {
            return (0.0, 0.0, 0.0, 0.0);
        }

        let frame: CGRect = msg_send![main_screen, frame];
        let screen_width = frame.size.width;
        let screen_height = frame.size.height;

        // safeAreaInsets is available on macOS 12.0+; zero on notchless displays
        let insets: NSEdgeInsets = msg_send![main_screen, safeAreaInsets];
        let notch_height = insets.top;

        // The physical notch is roughly 180-200px wide; scale with the screen
        // and clamp so external displays don't produce absurd values.
        let notch_width = if notch_height > 0.0 {
            (screen_width * 0.12).max(200.0).min(260.0)
        } else {
            0.0
        };

        (screen_width, screen_height, notch_height, notch_width)
    }
}

#[cfg(not(target_os = "macos"))]
pub(crate) fn get_screen_info() -> (f64, f64, f64, f64) {
    (1920.0, 1080.0, 0.0, 0.0)
}

/// Probe the main screen for its frame and notch metrics.
pub fn screen_notch_info() -> NotchInfo {
    let (screen_width, screen_height, notch_height, notch_width) = get_screen_info();
    let has_notch = notch_height > 0.0;
    let visible_height = screen_height - notch_height;

    NotchInfo {
        has_notch,
        notch_height,
        notch_width,
        screen_width,
        screen_height,
        visible_height,
    }
}

/// Get notch information from the main screen using NSScreen.safeAreaInsets (macOS 12.0+)
#[tauri::command]
pub fn get_notch_info() -> NotchInfo {
    screen_notch_info()
}

/// Set whether the window should ignore mouse events (click-through)
/// When true, clicks pass through to the underlying application
#[tauri::command]
pub fn set_click_through(window: Window, ignore: bool) -> Result<(), String> {
    window
        .set_ignore_cursor_events(ignore)
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Resize and reposition the overlay for the given expansion state.
/// Collapsed hugs the notch; expanded grows into the dashboard panel.
/// The window stays horizontally centered at the very top of the screen.
pub fn apply_expansion(window: &WebviewWindow, expanded: bool) -> Result<(), String> {
    let (screen_width, _screen_height, raw_notch_height, _notch_width) = get_screen_info();
    let notch_height = if raw_notch_height > 0.0 {
        raw_notch_height
    } else {
        FALLBACK_NOTCH_HEIGHT
    };

    let (width, height) = if expanded {
        (EXPANDED_WIDTH, notch_height + EXPANDED_HEIGHT)
    } else {
        (COLLAPSED_WIDTH, COLLAPSED_HEIGHT.max(notch_height))
    };

    window
        .set_size(LogicalSize::new(width, height))
        .map_err(|e| e.to_string())?;

    let x = (screen_width - width) / 2.0;
    let y = 0.0;

    window
        .set_position(LogicalPosition::new(x, y))
        .map_err(|e| e.to_string())?;

    Ok(())
}

/// One-time window chrome setup: level above the menu bar, visible on all
/// spaces, collapsed frame, click-through enabled.
pub fn setup_window(window: &WebviewWindow) -> Result<(), String> {
    #[cfg(target_os = "macos")]
    {
        use objc2::runtime::AnyObject;
        use objc2::*;
        use raw_window_handle::HasWindowHandle;

        if let Ok(handle) = window.window_handle() {
            if let raw_window_handle::RawWindowHandle::AppKit(appkit_handle) = handle.as_raw() {
                unsafe {
                    let ns_view = appkit_handle.ns_view.as_ptr() as *mut AnyObject;
                    let ns_win: *mut AnyObject = msg_send![ns_view, window];

                    // NSStatusWindowLevel = 25, above the menu bar (24),
                    // so the window can sit over the notch area
                    let _: () = msg_send![ns_win, setLevel: 25_i64];

                    // NSWindowCollectionBehaviorCanJoinAllSpaces (1 << 0)
                    // | NSWindowCollectionBehaviorStationary (1 << 4)
                    let _: () = msg_send![ns_win, setCollectionBehavior: 17_u64];
                }
            }
        }
    }

    apply_expansion(window, false)?;
    window
        .set_ignore_cursor_events(true)
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Bring the overlay's process frontmost so local mouse events reach it.
/// Required for an accessory app whose window never takes focus normally.
#[cfg(target_os = "macos")]
pub fn activate_app() {
    use objc2::runtime::AnyObject;
    use objc2::*;

    unsafe {
        let ns_app: *mut AnyObject = msg_send![class!(NSApplication), sharedApplication];
        let _: () = msg_send![ns_app, activateIgnoringOtherApps: true];
    }
}

#[cfg(not(target_os = "macos"))]
pub fn activate_app() {}

/// Activate the window (focus it)
/// Uses native macOS APIs to properly activate an accessory app
#[tauri::command]
pub fn activate_window(window: Window) -> Result<(), String> {
    #[cfg(target_os = "macos")]
    {
        use objc2::runtime::AnyObject;
        use objc2::*;
        use raw_window_handle::HasWindowHandle;

        activate_app();

        unsafe {
            if let Ok(handle) = window.window_handle() {
                if let raw_window_handle::RawWindowHandle::AppKit(appkit_handle) = handle.as_raw() {
                    let ns_view = appkit_handle.ns_view.as_ptr() as *mut AnyObject;
                    let ns_win: *mut AnyObject = msg_send![ns_view, window];
                    let _: () =
                        msg_send![ns_win, makeKeyAndOrderFront: std::ptr::null::<AnyObject>()];
                }
            }
        }
    }

    #[cfg(not(target_os = "macos"))]
    {
        window.set_focus().map_err(|e| e.to_string())?;
    }

    Ok(())
}
