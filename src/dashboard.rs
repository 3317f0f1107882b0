use crate::expansion::{effective_delay, ExpansionController};
use crate::files::{DroppedFile, TrayFile};
use crate::hover::{HotZone, PointerZoneMonitor};
use crate::media::{MediaHost, MediaState, PollOutcome, Poller};
use crate::models::{HoldReason, MediaSnapshot, TransportCommand};

use std::path::PathBuf;
use std::sync::Arc;
use tauri::{command, State};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Everything that can happen to the dashboard. All inputs — pointer
/// samples, poll results, user commands, timer expiry — are funneled
/// through one channel into the loop task, which is the only place
/// observable state is mutated.
#[derive(Debug)]
pub enum StateEvent {
    /// A pointer sample from either observation channel (top-left origin)
    PointerSample { x: f64, y: f64 },
    /// Outcome of a media probe (periodic or reconciliation)
    MediaPoll(PollOutcome),
    /// A transport command from the dashboard UI
    MediaCommand(TransportCommand),
    /// Files dropped onto the overlay
    AddFiles(Vec<PathBuf>),
    /// A tray entry removed by the user
    RemoveFile(PathBuf),
    /// Tray visibility toggled by the user
    SetTrayOpen(bool),
    /// An external drag entered or left the overlay
    SetDragActive(bool),
    /// The debounced collapse timer fired
    CollapseElapsed,
    /// The configured hover delay changed
    SetHoverDelay(f64),
    /// A (re)connected frontend wants the current state
    Republish,
}

/// Downstream notification interface. Implementations receive each
/// callback only when the published value actually changed (except for
/// an explicit republish).
pub trait DashboardSink: Send + Sync {
    fn expansion_changed(&self, expanded: bool);
    fn media_changed(&self, snapshot: &MediaSnapshot);
    fn files_changed(&self, files: &[TrayFile], tray_open: bool);
}

/// Cloneable sender half handed to Tauri commands and samplers.
#[derive(Clone)]
pub struct DashboardHandle {
    events: UnboundedSender<StateEvent>,
}

impl DashboardHandle {
    pub fn new(events: UnboundedSender<StateEvent>) -> Self {
        Self { events }
    }

    pub fn send(&self, event: StateEvent) {
        if self.events.send(event).is_err() {
            log::error!("dashboard loop is gone; dropping event");
        }
    }
}

/// Aggregated dashboard state: expansion, media snapshot, dropped files,
/// tray flag. Owned exclusively by the loop task; everything else talks
/// to it through `StateEvent`s.
pub struct Dashboard {
    zone: PointerZoneMonitor,
    expansion: ExpansionController,
    media: MediaState,
    poller: Poller,
    files: Vec<DroppedFile>,
    tray_open: bool,
    host: Arc<dyn MediaHost>,
    sink: Arc<dyn DashboardSink>,
}

impl Dashboard {
    pub fn new(
        zone: HotZone,
        hover_delay: f64,
        restored_files: Vec<PathBuf>,
        host: Arc<dyn MediaHost>,
        sink: Arc<dyn DashboardSink>,
        events: UnboundedSender<StateEvent>,
    ) -> Self {
        let mut expansion = ExpansionController::new(effective_delay(hover_delay), events.clone());
        let poller = Poller::new(host.clone(), events);

        let files: Vec<DroppedFile> = restored_files
            .into_iter()
            .map(DroppedFile::without_scope)
            .collect();
        if !files.is_empty() {
            // Restored entries hold the overlay open like fresh drops do;
            // the edge is published by the initial republish in run().
            let _ = expansion.set_files_present(true);
        }

        Self {
            zone: PointerZoneMonitor::new(zone),
            expansion,
            media: MediaState::default(),
            poller,
            files,
            tray_open: false,
            host,
            sink,
        }
    }

    /// Run the loop until every sender is gone.
    pub async fn run(mut self, mut events: UnboundedReceiver<StateEvent>) {
        let poll_task = self.poller.spawn_periodic();
        self.republish();

        while let Some(event) = events.recv().await {
            self.handle(event);
        }

        poll_task.abort();
    }

    /// Apply one event. Public so tests can step the loop synchronously.
    pub fn handle(&mut self, event: StateEvent) {
        match event {
            StateEvent::PointerSample { x, y } => {
                if let Some(inside) = self.zone.sample(x, y) {
                    let change = self
                        .expansion
                        .set_hold_reason(HoldReason::PointerInZone, inside);
                    self.publish_expansion(change);
                }
            }
            StateEvent::MediaPoll(outcome) => {
                if let Some(snapshot) = self.media.apply(outcome) {
                    self.sink.media_changed(&snapshot);
                }
            }
            StateEvent::MediaCommand(command) => self.handle_media_command(command),
            StateEvent::AddFiles(paths) => self.add_files(paths),
            StateEvent::RemoveFile(path) => self.remove_file(&path),
            StateEvent::SetTrayOpen(open) => self.set_tray_open(open),
            StateEvent::SetDragActive(active) => {
                let change = self
                    .expansion
                    .set_hold_reason(HoldReason::DragActive, active);
                self.publish_expansion(change);
            }
            StateEvent::CollapseElapsed => {
                let change = self.expansion.collapse_elapsed();
                self.publish_expansion(change);
            }
            StateEvent::SetHoverDelay(delay) => self.expansion.set_hover_delay(delay),
            StateEvent::Republish => self.republish(),
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.expansion.is_expanded()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    fn handle_media_command(&mut self, command: TransportCommand) {
        let Some(app) = self.media.tracked_app() else {
            log::debug!("media command {:?} ignored: no tracked source", command);
            return;
        };

        // Local projection first so the UI answers immediately; the
        // external invocation follows and the poll reconciles.
        if command == TransportCommand::PlayPause {
            if let Some(snapshot) = self.media.toggle_playing() {
                self.sink.media_changed(&snapshot);
            }
        }

        let host = self.host.clone();
        tokio::spawn(async move {
            host.transport(&app, command);
        });

        if matches!(
            command,
            TransportCommand::NextTrack | TransportCommand::PreviousTrack
        ) {
            self.poller.repoll_soon();
        }
    }

    fn add_files(&mut self, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            return;
        }
        for path in paths {
            self.files.push(DroppedFile::new(path));
        }
        self.tray_open = true;

        let change = self
            .expansion
            .set_hold_reason(HoldReason::TrayOpen, true)
            .or(self.expansion.set_files_present(true));
        self.publish_files();
        self.publish_expansion(change);
    }

    fn remove_file(&mut self, path: &PathBuf) {
        let before = self.files.len();
        self.files.retain(|file| file.path() != path.as_path());
        if self.files.len() == before {
            return;
        }

        let mut change = None;
        if self.files.is_empty() {
            // An emptied tray closes itself; the collapse then goes
            // through the normal debounce, never immediately.
            self.tray_open = false;
            change = self
                .expansion
                .set_hold_reason(HoldReason::TrayOpen, false)
                .or(self.expansion.set_files_present(false));
        }
        self.publish_files();
        self.publish_expansion(change);
    }

    fn set_tray_open(&mut self, open: bool) {
        if self.tray_open == open {
            return;
        }
        self.tray_open = open;

        if !open {
            // Scopes must not outlive the tray session; entries stay
            // listed with degraded capability.
            for file in &mut self.files {
                file.release_scope();
            }
        }

        let change = self.expansion.set_hold_reason(HoldReason::TrayOpen, open);
        self.publish_files();
        self.publish_expansion(change);
    }

    fn republish(&self) {
        self.sink.expansion_changed(self.expansion.is_expanded());
        self.sink.media_changed(self.media.current());
        self.publish_files();
    }

    fn publish_expansion(&self, change: Option<bool>) {
        if let Some(expanded) = change {
            self.sink.expansion_changed(expanded);
        }
    }

    fn publish_files(&self) {
        let files: Vec<TrayFile> = self.files.iter().map(DroppedFile::tray_file).collect();
        self.sink.files_changed(&files, self.tray_open);
    }
}

#[command]
pub fn pointer_moved(dashboard: State<DashboardHandle>, x: f64, y: f64) {
    dashboard.send(StateEvent::PointerSample { x, y });
}

#[command]
pub fn add_files(dashboard: State<DashboardHandle>, paths: Vec<String>) {
    dashboard.send(StateEvent::AddFiles(
        paths.into_iter().map(PathBuf::from).collect(),
    ));
}

#[command]
pub fn remove_file(dashboard: State<DashboardHandle>, path: String) {
    dashboard.send(StateEvent::RemoveFile(PathBuf::from(path)));
}

#[command]
pub fn set_tray_open(dashboard: State<DashboardHandle>, open: bool) {
    dashboard.send(StateEvent::SetTrayOpen(open));
}

#[command]
pub fn set_drag_active(dashboard: State<DashboardHandle>, active: bool) {
    dashboard.send(StateEvent::SetDragActive(active));
}

#[command]
pub fn media_play_pause(dashboard: State<DashboardHandle>) {
    dashboard.send(StateEvent::MediaCommand(TransportCommand::PlayPause));
}

#[command]
pub fn media_next_track(dashboard: State<DashboardHandle>) {
    dashboard.send(StateEvent::MediaCommand(TransportCommand::NextTrack));
}

#[command]
pub fn media_previous_track(dashboard: State<DashboardHandle>) {
    dashboard.send(StateEvent::MediaCommand(TransportCommand::PreviousTrack));
}

#[command]
pub fn republish_state(dashboard: State<DashboardHandle>) {
    dashboard.send(StateEvent::Republish);
}
