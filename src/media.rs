use crate::dashboard::StateEvent;
use crate::models::{Artwork, MediaSnapshot, TransportCommand};

use base64::Engine;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Supported sources in priority order: the streaming service wins over
/// the local player, and only the first running source is queried.
pub const MEDIA_SOURCES: [&str; 2] = ["Spotify", "Music"];

/// Cadence of the periodic now-playing poll
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Delay before re-polling after a skip command, to reconcile the actual
/// external state once the source has acted on it
pub const SKIP_REPOLL_DELAY: Duration = Duration::from_millis(500);

/// Fields read back from a media source, before artwork resolution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawNowPlaying {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub is_playing: bool,
    pub artwork_url: Option<String>,
}

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A source answered; full snapshot ready for diffing
    Snapshot(MediaSnapshot),
    /// No supported source process is running
    NothingRunning,
    /// A source is running but returned nothing usable
    QueryFailed,
}

/// External media capability: process probing, now-playing point reads,
/// transport commands and artwork retrieval.
pub trait MediaHost: Send + Sync {
    /// Whether a named external process is currently running.
    fn is_running(&self, app: &str) -> bool;

    /// Point-read of the source's now-playing state. `None` is a
    /// transient query failure, not "stopped".
    fn now_playing(&self, app: &str) -> Option<RawNowPlaying>;

    /// Fire-and-forget transport command against a named source.
    fn transport(&self, app: &str, command: TransportCommand);

    /// Fetch artwork bytes from a remote locator.
    fn fetch_artwork(&self, url: &str) -> Option<Vec<u8>> {
        let _ = url;
        None
    }
}

/// Artwork is re-resolved only when the track changes; the cache lives
/// with the polling side so repeated polls of the same track cost one
/// fetch.
#[derive(Debug, Default)]
pub struct ArtworkCache {
    key: Option<(String, String)>,
    artwork: Option<Artwork>,
}

/// Probe the sources in priority order and build a complete snapshot.
/// Runs off the dashboard loop; only the resulting `PollOutcome` crosses
/// back over the channel.
pub fn probe_sources(host: &dyn MediaHost, cache: &mut ArtworkCache) -> PollOutcome {
    for app in MEDIA_SOURCES {
        if !host.is_running(app) {
            continue;
        }
        let Some(raw) = host.now_playing(app) else {
            return PollOutcome::QueryFailed;
        };
        return PollOutcome::Snapshot(build_snapshot(host, cache, app, raw));
    }
    PollOutcome::NothingRunning
}

fn build_snapshot(
    host: &dyn MediaHost,
    cache: &mut ArtworkCache,
    app: &str,
    raw: RawNowPlaying,
) -> MediaSnapshot {
    let key = (raw.title.clone(), raw.artist.clone());
    if cache.key.as_ref() != Some(&key) {
        cache.artwork = raw
            .artwork_url
            .as_deref()
            .and_then(|url| resolve_artwork(host, url));
        cache.key = Some(key);
    }

    MediaSnapshot {
        title: none_if_empty(raw.title),
        artist: none_if_empty(raw.artist),
        album: none_if_empty(raw.album),
        artwork: cache.artwork.clone(),
        is_playing: raw.is_playing,
        app_name: Some(app.to_string()),
    }
}

/// Inline bytes when the fetch succeeds, the remote locator otherwise.
fn resolve_artwork(host: &dyn MediaHost, url: &str) -> Option<Artwork> {
    if url.is_empty() {
        return None;
    }
    match host.fetch_artwork(url) {
        Some(bytes) if !bytes.is_empty() => Some(Artwork::Inline {
            base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
        }),
        _ => Some(Artwork::Remote {
            url: url.to_string(),
        }),
    }
}

fn none_if_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// The dashboard loop's view of external media state. Single writer of
/// the current snapshot; every mutator reports a change at most once.
#[derive(Default)]
pub struct MediaState {
    current: MediaSnapshot,
}

impl MediaState {
    pub fn current(&self) -> &MediaSnapshot {
        &self.current
    }

    /// The source application transport commands would target.
    pub fn tracked_app(&self) -> Option<String> {
        self.current.source().map(str::to_string)
    }

    /// Apply one poll outcome. Returns the snapshot to publish only when
    /// the reported state actually changed; query failures retain the
    /// prior snapshot and report nothing.
    pub fn apply(&mut self, outcome: PollOutcome) -> Option<MediaSnapshot> {
        let next = match outcome {
            PollOutcome::QueryFailed => return None,
            PollOutcome::NothingRunning => MediaSnapshot::default(),
            PollOutcome::Snapshot(snapshot) => snapshot,
        };
        if next == self.current {
            return None;
        }
        self.current = next;
        Some(self.current.clone())
    }

    /// Optimistic local toggle for play/pause: the external command's
    /// effect can't be observed synchronously, so the projection flips
    /// immediately and the next poll reconciles. No-op without a source.
    pub fn toggle_playing(&mut self) -> Option<MediaSnapshot> {
        self.current.source()?;
        self.current.is_playing = !self.current.is_playing;
        Some(self.current.clone())
    }
}

/// Owns the polling side: the periodic probe task and one-off
/// reconciliation probes after skip commands. Probes run in their own
/// tasks and feed outcomes back to the dashboard loop.
pub struct Poller {
    host: Arc<dyn MediaHost>,
    events: UnboundedSender<StateEvent>,
    cache: Arc<Mutex<ArtworkCache>>,
}

impl Poller {
    pub fn new(host: Arc<dyn MediaHost>, events: UnboundedSender<StateEvent>) -> Self {
        Self {
            host,
            events,
            cache: Arc::new(Mutex::new(ArtworkCache::default())),
        }
    }

    /// Start the fixed-interval poll. The task ends once the dashboard
    /// loop goes away.
    pub fn spawn_periodic(&self) -> JoinHandle<()> {
        let host = self.host.clone();
        let events = self.events.clone();
        let cache = self.cache.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let outcome = probe_with(&*host, &cache);
                if events.send(StateEvent::MediaPoll(outcome)).is_err() {
                    break;
                }
            }
        })
    }

    /// Schedule a single reconciliation probe after `SKIP_REPOLL_DELAY`.
    pub fn repoll_soon(&self) {
        let host = self.host.clone();
        let events = self.events.clone();
        let cache = self.cache.clone();

        tokio::spawn(async move {
            tokio::time::sleep(SKIP_REPOLL_DELAY).await;
            let outcome = probe_with(&*host, &cache);
            let _ = events.send(StateEvent::MediaPoll(outcome));
        });
    }
}

fn probe_with(host: &dyn MediaHost, cache: &Mutex<ArtworkCache>) -> PollOutcome {
    let mut cache = cache.lock().unwrap_or_else(|e| e.into_inner());
    probe_sources(host, &mut cache)
}

/// AppleScript-backed media host: probes processes with sysinfo and
/// queries/controls players through osascript.
#[cfg(target_os = "macos")]
pub struct OsaHost {
    system: Mutex<sysinfo::System>,
    http: reqwest::blocking::Client,
}

#[cfg(target_os = "macos")]
impl OsaHost {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(sysinfo::System::new_all()),
            http: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_else(|_| reqwest::blocking::Client::new()),
        }
    }

    fn run_script(&self, script: &str) -> Option<String> {
        use std::process::Command;

        let output = Command::new("osascript")
            .arg("-e")
            .arg(script)
            .output()
            .ok()?;
        if !output.status.success() {
            log::debug!(
                "osascript failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(target_os = "macos")]
impl Default for OsaHost {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "macos")]
impl MediaHost for OsaHost {
    fn is_running(&self, app: &str) -> bool {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_all();
        system.processes().values().any(|p| p.name() == app)
    }

    fn now_playing(&self, app: &str) -> Option<RawNowPlaying> {
        // Spotify exposes an artwork url; Music's artwork is only
        // reachable as raw data, which is too slow to pull every second.
        let script = if app == "Spotify" {
            r#"
            tell application "Spotify"
                set trackName to name of current track
                set artistName to artist of current track
                set albumName to album of current track
                set playerState to player state as string
                set artUrl to artwork url of current track
                return trackName & "|" & artistName & "|" & albumName & "|" & playerState & "|" & artUrl
            end tell
            "#
            .to_string()
        } else {
            format!(
                r#"
            tell application "{}"
                set trackName to name of current track
                set artistName to artist of current track
                set albumName to album of current track
                set playerState to player state as string
                return trackName & "|" & artistName & "|" & albumName & "|" & playerState & "|"
            end tell
            "#,
                app
            )
        };

        let reply = self.run_script(&script)?;
        let parts: Vec<&str> = reply.split('|').collect();
        if parts.len() < 5 {
            return None;
        }

        Some(RawNowPlaying {
            title: parts[0].to_string(),
            artist: parts[1].to_string(),
            album: parts[2].to_string(),
            is_playing: parts[3] == "playing",
            artwork_url: none_if_empty(parts[4].to_string()),
        })
    }

    fn transport(&self, app: &str, command: TransportCommand) {
        let verb = match command {
            TransportCommand::PlayPause => "playpause",
            TransportCommand::NextTrack => "next track",
            TransportCommand::PreviousTrack => "previous track",
        };
        let script = format!("tell application \"{}\" to {}", app, verb);
        if self.run_script(&script).is_none() {
            log::debug!("transport command {:?} to {} failed", command, app);
        }
    }

    fn fetch_artwork(&self, url: &str) -> Option<Vec<u8>> {
        let response = self.http.get(url).send().ok()?;
        if !response.status().is_success() {
            return None;
        }
        let bytes = response.bytes().ok()?;
        if bytes.is_empty() {
            None
        } else {
            Some(bytes.to_vec())
        }
    }
}

/// Host for platforms without the scripting capability: nothing runs,
/// every command is a no-op.
pub struct NullHost;

impl MediaHost for NullHost {
    fn is_running(&self, _app: &str) -> bool {
        false
    }

    fn now_playing(&self, _app: &str) -> Option<RawNowPlaying> {
        None
    }

    fn transport(&self, _app: &str, _command: TransportCommand) {}
}

/// The platform's media host.
#[cfg(target_os = "macos")]
pub fn default_host() -> Arc<dyn MediaHost> {
    Arc::new(OsaHost::new())
}

#[cfg(not(target_os = "macos"))]
pub fn default_host() -> Arc<dyn MediaHost> {
    Arc::new(NullHost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeHost {
        running: Mutex<Vec<String>>,
        tracks: Mutex<HashMap<String, RawNowPlaying>>,
        queries: Mutex<Vec<String>>,
        transports: Mutex<Vec<(String, TransportCommand)>>,
        artwork: Mutex<HashMap<String, Vec<u8>>>,
        artwork_fetches: AtomicUsize,
    }

    impl FakeHost {
        fn set_running(&self, apps: &[&str]) {
            *self.running.lock().unwrap() = apps.iter().map(|s| s.to_string()).collect();
        }

        fn set_track(&self, app: &str, raw: RawNowPlaying) {
            self.tracks.lock().unwrap().insert(app.to_string(), raw);
        }
    }

    impl MediaHost for FakeHost {
        fn is_running(&self, app: &str) -> bool {
            self.running.lock().unwrap().iter().any(|a| a == app)
        }

        fn now_playing(&self, app: &str) -> Option<RawNowPlaying> {
            self.queries.lock().unwrap().push(app.to_string());
            self.tracks.lock().unwrap().get(app).cloned()
        }

        fn transport(&self, app: &str, command: TransportCommand) {
            self.transports
                .lock()
                .unwrap()
                .push((app.to_string(), command));
        }

        fn fetch_artwork(&self, url: &str) -> Option<Vec<u8>> {
            self.artwork_fetches.fetch_add(1, Ordering::SeqCst);
            self.artwork.lock().unwrap().get(url).cloned()
        }
    }

    fn track(title: &str, playing: bool) -> RawNowPlaying {
        RawNowPlaying {
            title: title.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            is_playing: playing,
            artwork_url: None,
        }
    }

    #[test]
    fn first_running_source_wins() {
        let host = FakeHost::default();
        host.set_running(&["Spotify", "Music"]);
        host.set_track("Spotify", track("From Spotify", true));
        host.set_track("Music", track("From Music", true));

        let mut cache = ArtworkCache::default();
        let outcome = probe_sources(&host, &mut cache);

        match outcome {
            PollOutcome::Snapshot(snapshot) => {
                assert_eq!(snapshot.app_name.as_deref(), Some("Spotify"));
                assert_eq!(snapshot.title.as_deref(), Some("From Spotify"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        // Music was never queried
        assert_eq!(*host.queries.lock().unwrap(), vec!["Spotify".to_string()]);
    }

    #[test]
    fn second_source_is_probed_when_first_is_absent() {
        let host = FakeHost::default();
        host.set_running(&["Music"]);
        host.set_track("Music", track("Local", false));

        let mut cache = ArtworkCache::default();
        match probe_sources(&host, &mut cache) {
            PollOutcome::Snapshot(snapshot) => {
                assert_eq!(snapshot.app_name.as_deref(), Some("Music"));
                assert!(!snapshot.is_playing);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn no_sources_reports_nothing_running() {
        let host = FakeHost::default();
        let mut cache = ArtworkCache::default();
        assert_eq!(probe_sources(&host, &mut cache), PollOutcome::NothingRunning);
    }

    #[test]
    fn running_source_without_usable_reply_is_a_query_failure() {
        let host = FakeHost::default();
        host.set_running(&["Spotify"]);
        // No track registered: now_playing returns None

        let mut cache = ArtworkCache::default();
        assert_eq!(probe_sources(&host, &mut cache), PollOutcome::QueryFailed);
    }

    #[test]
    fn snapshot_notifications_are_edge_triggered() {
        let mut state = MediaState::default();
        let snapshot = MediaSnapshot {
            title: Some("Song".to_string()),
            app_name: Some("Spotify".to_string()),
            is_playing: true,
            ..Default::default()
        };

        assert!(state.apply(PollOutcome::Snapshot(snapshot.clone())).is_some());
        // Same snapshot again: exactly zero further notifications
        assert!(state.apply(PollOutcome::Snapshot(snapshot)).is_none());
    }

    #[test]
    fn query_failure_retains_prior_snapshot() {
        let mut state = MediaState::default();
        let snapshot = MediaSnapshot {
            title: Some("Song".to_string()),
            app_name: Some("Spotify".to_string()),
            is_playing: true,
            ..Default::default()
        };
        state.apply(PollOutcome::Snapshot(snapshot.clone()));

        assert!(state.apply(PollOutcome::QueryFailed).is_none());
        assert_eq!(state.current(), &snapshot);
    }

    #[test]
    fn nothing_running_installs_default_once() {
        let mut state = MediaState::default();

        // Already at the default: no redundant notification
        assert!(state.apply(PollOutcome::NothingRunning).is_none());

        let snapshot = MediaSnapshot {
            title: Some("Song".to_string()),
            app_name: Some("Spotify".to_string()),
            is_playing: true,
            ..Default::default()
        };
        state.apply(PollOutcome::Snapshot(snapshot));

        // Source quit: one notification back to the empty snapshot
        let cleared = state.apply(PollOutcome::NothingRunning);
        assert_eq!(cleared, Some(MediaSnapshot::default()));
        assert!(state.apply(PollOutcome::NothingRunning).is_none());
    }

    #[test]
    fn optimistic_toggle_requires_a_tracked_source() {
        let mut state = MediaState::default();
        assert!(state.toggle_playing().is_none());

        let snapshot = MediaSnapshot {
            title: Some("Song".to_string()),
            app_name: Some("Spotify".to_string()),
            is_playing: true,
            ..Default::default()
        };
        state.apply(PollOutcome::Snapshot(snapshot));

        let toggled = state.toggle_playing().expect("has a source");
        assert!(!toggled.is_playing);
        let toggled = state.toggle_playing().expect("has a source");
        assert!(toggled.is_playing);
    }

    #[test]
    fn artwork_is_fetched_once_per_track() {
        let host = FakeHost::default();
        host.set_running(&["Spotify"]);
        host.artwork
            .lock()
            .unwrap()
            .insert("https://img/1".to_string(), vec![1, 2, 3]);
        host.set_track(
            "Spotify",
            RawNowPlaying {
                artwork_url: Some("https://img/1".to_string()),
                ..track("Song A", true)
            },
        );

        let mut cache = ArtworkCache::default();
        let first = probe_sources(&host, &mut cache);
        let second = probe_sources(&host, &mut cache);
        assert_eq!(host.artwork_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);

        match first {
            PollOutcome::Snapshot(snapshot) => match snapshot.artwork {
                Some(Artwork::Inline { ref base64 }) => {
                    assert_eq!(base64, &base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]));
                }
                other => panic!("expected inline artwork, got {:?}", other),
            },
            other => panic!("unexpected outcome {:?}", other),
        }

        // Track change: one more fetch
        host.set_track(
            "Spotify",
            RawNowPlaying {
                artwork_url: Some("https://img/1".to_string()),
                ..track("Song B", true)
            },
        );
        probe_sources(&host, &mut cache);
        assert_eq!(host.artwork_fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_artwork_fetch_degrades_to_remote_locator() {
        let host = FakeHost::default();
        host.set_running(&["Spotify"]);
        host.set_track(
            "Spotify",
            RawNowPlaying {
                artwork_url: Some("https://img/unreachable".to_string()),
                ..track("Song", true)
            },
        );

        let mut cache = ArtworkCache::default();
        match probe_sources(&host, &mut cache) {
            PollOutcome::Snapshot(snapshot) => {
                assert_eq!(
                    snapshot.artwork,
                    Some(Artwork::Remote {
                        url: "https://img/unreachable".to_string()
                    })
                );
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
