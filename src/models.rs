use serde::{Deserialize, Serialize};

/// Notch and screen information returned to the frontend
#[derive(Debug, Serialize, Clone, Copy)]
pub struct NotchInfo {
    /// Whether the screen has a notch (safeAreaInsets.top > 0)
    pub has_notch: bool,
    /// Height of the notch/safe area inset from the top (typically 30-40px on notched MacBooks)
    pub notch_height: f64,
    /// Width of the notch (the black area at the top center)
    pub notch_width: f64,
    /// Full screen width
    pub screen_width: f64,
    /// Full screen height
    pub screen_height: f64,
    /// The visible (usable) height below the notch
    pub visible_height: f64,
}

/// Artwork for the current track: inline image bytes when the fetch
/// succeeded, otherwise the remote locator the source reported.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Artwork {
    /// Base64 encoded image data
    Inline { base64: String },
    /// URL the artwork can be fetched from
    Remote { url: String },
}

/// Now-playing state reported by an external media source at one poll
/// instant. Compared by value; a new snapshot replaces the current one
/// only when it differs.
#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct MediaSnapshot {
    /// Track title
    pub title: Option<String>,
    /// Artist name
    pub artist: Option<String>,
    /// Album name
    pub album: Option<String>,
    /// Track artwork, when the source provides one
    pub artwork: Option<Artwork>,
    /// Whether music is currently playing
    pub is_playing: bool,
    /// Name of the app playing the media (Spotify or Music)
    pub app_name: Option<String>,
}

impl MediaSnapshot {
    /// The tracked source application, if any. An empty name counts as
    /// "no source" so transport commands have nothing to target.
    pub fn source(&self) -> Option<&str> {
        self.app_name.as_deref().filter(|name| !name.is_empty())
    }
}

/// One of several independent conditions that keep the overlay expanded.
/// Expansion is held open while at least one reason is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoldReason {
    /// The global pointer is inside the hot-zone around the notch
    PointerInZone,
    /// An external drag is hovering over the overlay
    DragActive,
    /// The file tray is open
    TrayOpen,
}

/// Transport commands forwarded to the tracked media source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    PlayPause,
    NextTrack,
    PreviousTrack,
}

/// Quick actions invokable from the dashboard panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickAction {
    Screenshot,
    Calculator,
    Settings,
    Lock,
}
