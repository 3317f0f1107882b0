use crate::models::NotchInfo;
use crate::window::FALLBACK_NOTCH_HEIGHT;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Width of the hot-zone band, wider than the notch itself
pub const HOVER_ZONE_WIDTH: f64 = 300.0;
/// Minimum depth of the hot-zone below the screen's top edge
pub const HOVER_ZONE_HEIGHT: f64 = 40.0;

/// Cadence of the background pointer sampler
#[cfg(target_os = "macos")]
const SAMPLE_INTERVAL_MS: u64 = 20;

/// The fixed on-screen rectangle whose pointer occupancy triggers
/// expansion: a band horizontally centered on the screen, spanning from
/// the top edge down to `max(HOVER_ZONE_HEIGHT, notch height)`.
///
/// Coordinates are top-left-origin logical points; the macOS sampler
/// flips Cocoa's bottom-left-origin y before feeding samples in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotZone {
    min_x: f64,
    max_x: f64,
    depth: f64,
}

impl HotZone {
    pub fn from_screen(info: &NotchInfo) -> Self {
        Self::with_width(info, HOVER_ZONE_WIDTH)
    }

    pub fn with_width(info: &NotchInfo, width: f64) -> Self {
        let notch_height = if info.notch_height > 0.0 {
            info.notch_height
        } else {
            FALLBACK_NOTCH_HEIGHT
        };
        let mid_x = info.screen_width / 2.0;

        Self {
            min_x: mid_x - width / 2.0,
            max_x: mid_x + width / 2.0,
            depth: notch_height.max(HOVER_ZONE_HEIGHT),
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y <= self.depth
    }
}

/// Edge-triggered occupancy detector for the hot-zone.
///
/// Samples arrive from two channels with identical semantics: the
/// background sampler thread (works without input focus) and the
/// webview's local mousemove events (`pointer_moved` command). Both are
/// funneled through the dashboard loop, so detection state has a single
/// owner and a transition is reported exactly once.
#[derive(Debug)]
pub struct PointerZoneMonitor {
    zone: HotZone,
    inside: bool,
}

impl PointerZoneMonitor {
    pub fn new(zone: HotZone) -> Self {
        Self { zone, inside: false }
    }

    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Feed one pointer sample. Returns `Some(inside)` only on a
    /// transition edge, `None` while occupancy is unchanged.
    pub fn sample(&mut self, x: f64, y: f64) -> Option<bool> {
        let inside = self.zone.contains(x, y);
        self.update(inside)
    }

    /// Feed a pre-computed occupancy level; edge-filtered the same way.
    pub fn update(&mut self, inside: bool) -> Option<bool> {
        if inside == self.inside {
            return None;
        }
        self.inside = inside;
        Some(inside)
    }
}

/// Keeps the background sampler thread alive; the thread exits once the
/// handle is stopped or dropped.
pub struct SamplerHandle {
    stop: Arc<AtomicBool>,
}

impl SamplerHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the focus-independent pointer sampler: polls the global pointer
/// location and forwards a sample whenever hot-zone occupancy flips.
/// Edge detection proper still happens on the dashboard loop; the
/// thread-side filter only keeps the channel quiet while the pointer
/// stays far from the notch.
#[cfg(target_os = "macos")]
pub fn spawn_sampler(
    events: tokio::sync::mpsc::UnboundedSender<crate::dashboard::StateEvent>,
    zone: HotZone,
) -> SamplerHandle {
    use crate::dashboard::StateEvent;

    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = stop.clone();

    std::thread::spawn(move || {
        let (_, mut screen_height, _, _) = crate::window::get_screen_info();
        let mut last_inside = false;
        let mut refresh_counter: u16 = 0;

        while !thread_stop.load(Ordering::Relaxed) {
            // Screen geometry can change (display re-plug); re-probe occasionally
            refresh_counter = refresh_counter.wrapping_add(1);
            if refresh_counter % 500 == 0 {
                let (_, height, _, _) = crate::window::get_screen_info();
                screen_height = height;
            }

            let (x, y) = pointer_location(screen_height);
            let inside = zone.contains(x, y);
            if inside != last_inside {
                last_inside = inside;
                if events.send(StateEvent::PointerSample { x, y }).is_err() {
                    break;
                }
            }

            std::thread::sleep(std::time::Duration::from_millis(SAMPLE_INTERVAL_MS));
        }
    });

    SamplerHandle { stop }
}

#[cfg(not(target_os = "macos"))]
pub fn spawn_sampler(
    _events: tokio::sync::mpsc::UnboundedSender<crate::dashboard::StateEvent>,
    _zone: HotZone,
) -> SamplerHandle {
    // No global pointer capability; the local channel still works.
    SamplerHandle {
        stop: Arc::new(AtomicBool::new(false)),
    }
}

/// Read the global pointer location in top-left-origin coordinates.
#[cfg(target_os = "macos")]
fn pointer_location(screen_height: f64) -> (f64, f64) {
    use crate::window::CGPoint;
    use objc2::*;

    let location: CGPoint = unsafe { msg_send![class!(NSEvent), mouseLocation] };
    (location.x, screen_height - location.y)
}
