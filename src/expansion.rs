use crate::dashboard::StateEvent;
use crate::models::HoldReason;

use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Collapse delay applied when no override is configured.
pub const DEFAULT_COLLAPSE_DELAY_SECS: f64 = 2.0;
/// Lower bound for configured overrides.
pub const MIN_COLLAPSE_DELAY_SECS: f64 = 0.5;

/// Normalize a user-configured hover delay. Zero (the unset marker) and
/// negative values mean "use the default"; positive values are clamped
/// to the minimum. Zero never means "collapse instantly".
pub fn effective_delay(configured: f64) -> Duration {
    let secs = if configured <= 0.0 {
        DEFAULT_COLLAPSE_DELAY_SECS
    } else {
        configured.max(MIN_COLLAPSE_DELAY_SECS)
    };
    Duration::from_secs_f64(secs)
}

/// Expand/collapse state machine over the hold-reason set, with debounced
/// collapse.
///
/// Expansion is derived, never set directly: expanded iff at least one
/// hold reason is active or the file list is non-empty. Activating any
/// reason expands immediately and cancels a pending collapse; clearing
/// the last one schedules a collapse that re-checks the predicate when it
/// fires. Mutators return `Some(expanded)` only on a state edge so the
/// owner forwards exactly one notification per change.
///
/// All methods must be called from the dashboard loop; the timer task
/// only sends `StateEvent::CollapseElapsed` back into that loop, so
/// scheduling, cancellation and firing never interleave.
pub struct ExpansionController {
    reasons: HashSet<HoldReason>,
    files_present: bool,
    expanded: bool,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
    wake: UnboundedSender<StateEvent>,
}

impl ExpansionController {
    pub fn new(delay: Duration, wake: UnboundedSender<StateEvent>) -> Self {
        Self {
            reasons: HashSet::new(),
            files_present: false,
            expanded: false,
            delay,
            pending: None,
            wake,
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Apply a runtime settings change. Takes effect from the next
    /// scheduling; an already-pending timer keeps its deadline.
    pub fn set_hover_delay(&mut self, configured: f64) {
        self.delay = effective_delay(configured);
    }

    /// Add or remove a hold reason. No-op (and no rescheduling) when the
    /// set membership doesn't actually change.
    pub fn set_hold_reason(&mut self, reason: HoldReason, active: bool) -> Option<bool> {
        let changed = if active {
            self.reasons.insert(reason)
        } else {
            self.reasons.remove(&reason)
        };
        if !changed {
            return None;
        }
        self.recompute()
    }

    /// Tell the controller whether the dropped-file list is non-empty.
    pub fn set_files_present(&mut self, present: bool) -> Option<bool> {
        if self.files_present == present {
            return None;
        }
        self.files_present = present;
        self.recompute()
    }

    /// The debounce timer fired. Collapses only if the predicate is still
    /// false; a stale fire (a reason re-activated since) does nothing.
    pub fn collapse_elapsed(&mut self) -> Option<bool> {
        self.pending = None;
        if self.held() || !self.expanded {
            return None;
        }
        self.expanded = false;
        Some(false)
    }

    fn held(&self) -> bool {
        !self.reasons.is_empty() || self.files_present
    }

    fn recompute(&mut self) -> Option<bool> {
        if self.held() {
            self.cancel_pending();
            if !self.expanded {
                self.expanded = true;
                return Some(true);
            }
            None
        } else {
            // Reached only on a held -> unheld transition: mutations that
            // leave the predicate unheld are rejected as no-ops above.
            self.schedule_collapse();
            None
        }
    }

    fn schedule_collapse(&mut self) {
        self.cancel_pending();
        let delay = self.delay;
        let wake = self.wake.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = wake.send(StateEvent::CollapseElapsed);
        }));
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for ExpansionController {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn controller(delay_secs: f64) -> (ExpansionController, UnboundedReceiver<StateEvent>) {
        let (tx, rx) = unbounded_channel();
        (
            ExpansionController::new(Duration::from_secs_f64(delay_secs), tx),
            rx,
        )
    }

    /// Let spawned timer tasks observe an advanced clock.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    /// Drain the wake channel into the controller, returning the last edge.
    fn pump(
        ctl: &mut ExpansionController,
        rx: &mut UnboundedReceiver<StateEvent>,
    ) -> Option<bool> {
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, StateEvent::CollapseElapsed) {
                if let Some(edge) = ctl.collapse_elapsed() {
                    last = Some(edge);
                }
            }
        }
        last
    }

    #[test]
    fn delay_normalization() {
        assert_eq!(effective_delay(0.0), Duration::from_secs_f64(2.0));
        assert_eq!(effective_delay(-1.0), Duration::from_secs_f64(2.0));
        assert_eq!(effective_delay(0.2), Duration::from_secs_f64(0.5));
        assert_eq!(effective_delay(3.5), Duration::from_secs_f64(3.5));
    }

    #[tokio::test(start_paused = true)]
    async fn expansion_follows_hold_reasons_immediately() {
        let (mut ctl, _rx) = controller(2.0);
        assert!(!ctl.is_expanded());

        assert_eq!(ctl.set_hold_reason(HoldReason::PointerInZone, true), Some(true));
        assert!(ctl.is_expanded());

        // A second reason changes nothing observable
        assert_eq!(ctl.set_hold_reason(HoldReason::DragActive, true), None);
        assert!(ctl.is_expanded());

        // Clearing one of two reasons keeps the hold
        assert_eq!(ctl.set_hold_reason(HoldReason::PointerInZone, false), None);
        assert!(ctl.is_expanded());
    }

    #[tokio::test(start_paused = true)]
    async fn redundant_mutations_are_noops() {
        let (mut ctl, mut rx) = controller(0.5);

        assert_eq!(ctl.set_hold_reason(HoldReason::TrayOpen, false), None);
        assert_eq!(ctl.set_files_present(false), None);
        assert_eq!(ctl.set_hold_reason(HoldReason::TrayOpen, true), Some(true));
        assert_eq!(ctl.set_hold_reason(HoldReason::TrayOpen, true), None);

        // None of the above scheduled a collapse
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(pump(&mut ctl, &mut rx), None);
        assert!(ctl.is_expanded());
    }

    #[tokio::test(start_paused = true)]
    async fn collapse_waits_for_the_full_delay() {
        let (mut ctl, mut rx) = controller(0.5);

        ctl.set_hold_reason(HoldReason::PointerInZone, true);
        assert_eq!(ctl.set_hold_reason(HoldReason::PointerInZone, false), None);
        assert!(ctl.is_expanded());
        settle().await;

        tokio::time::advance(Duration::from_millis(499)).await;
        settle().await;
        assert_eq!(pump(&mut ctl, &mut rx), None);
        assert!(ctl.is_expanded());

        tokio::time::advance(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(pump(&mut ctl, &mut rx), Some(false));
        assert!(!ctl.is_expanded());
    }

    #[tokio::test(start_paused = true)]
    async fn reactivation_cancels_pending_collapse() {
        let (mut ctl, mut rx) = controller(0.5);

        ctl.set_hold_reason(HoldReason::PointerInZone, true);
        ctl.set_hold_reason(HoldReason::PointerInZone, false);
        settle().await;

        tokio::time::advance(Duration::from_millis(300)).await;
        settle().await;
        assert_eq!(ctl.set_hold_reason(HoldReason::PointerInZone, true), None);

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(pump(&mut ctl, &mut rx), None);
        assert!(ctl.is_expanded());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduled_collapse_gets_a_fresh_full_delay() {
        let (mut ctl, mut rx) = controller(0.5);

        ctl.set_hold_reason(HoldReason::PointerInZone, true);
        ctl.set_hold_reason(HoldReason::PointerInZone, false);
        settle().await;

        // Re-activate at 0.3s, then clear again: no credit from the first timer
        tokio::time::advance(Duration::from_millis(300)).await;
        settle().await;
        ctl.set_hold_reason(HoldReason::PointerInZone, true);
        ctl.set_hold_reason(HoldReason::PointerInZone, false);
        settle().await;

        tokio::time::advance(Duration::from_millis(499)).await;
        settle().await;
        assert_eq!(pump(&mut ctl, &mut rx), None);
        assert!(ctl.is_expanded());

        tokio::time::advance(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(pump(&mut ctl, &mut rx), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn files_hold_expansion_without_any_reason() {
        let (mut ctl, mut rx) = controller(0.5);

        assert_eq!(ctl.set_files_present(true), Some(true));
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(pump(&mut ctl, &mut rx), None);
        assert!(ctl.is_expanded());

        // Emptying the list collapses via the same debounce, not instantly
        assert_eq!(ctl.set_files_present(false), None);
        assert!(ctl.is_expanded());
        settle().await;
        tokio::time::advance(Duration::from_millis(501)).await;
        settle().await;
        assert_eq!(pump(&mut ctl, &mut rx), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_fire_with_reason_active_does_nothing() {
        let (mut ctl, mut rx) = controller(0.5);

        ctl.set_hold_reason(HoldReason::PointerInZone, true);
        ctl.set_hold_reason(HoldReason::PointerInZone, false);
        settle().await;

        // Timer fires and the event is queued...
        tokio::time::advance(Duration::from_millis(501)).await;
        settle().await;
        // ...but a reason became active before the queue drained: the
        // collapse processed first reflects the pre-reactivation timeline.
        let mut saw_collapse = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, StateEvent::CollapseElapsed) {
                ctl.set_hold_reason(HoldReason::PointerInZone, true);
                assert_eq!(ctl.collapse_elapsed(), None);
                saw_collapse = true;
            }
        }
        assert!(saw_collapse);
        assert!(ctl.is_expanded());
    }
}
