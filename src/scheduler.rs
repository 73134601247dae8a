use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// Why a refresh cycle was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Recurring auto-refresh tick.
    Timer,
    /// Explicit user refresh, fires regardless of the auto-refresh toggle.
    Manual,
    /// Auto-refresh was just switched on.
    Toggle,
    /// The session became visible again after being paused.
    Resume,
}

/// Auto-refresh state. Mutated only by the scheduler; lives for the whole
/// watch session.
struct RefreshState {
    enabled: bool,
    visible: bool,
    interval: Duration,
    timer: Option<JoinHandle<()>>,
}

/// Owns the auto-refresh timer and converts timer ticks, toggles, manual
/// refreshes and visibility changes into cycle triggers on a channel.
///
/// Invariant: at most one timer task is live at any instant. Every spawn is
/// preceded by cancelling the previous task, so rapid toggles cannot leak
/// timers and double-fire cycles.
pub struct RefreshScheduler {
    state: RefreshState,
    trigger_tx: mpsc::UnboundedSender<TriggerReason>,
}

impl RefreshScheduler {
    pub fn new(
        interval: Duration,
        enabled: bool,
        trigger_tx: mpsc::UnboundedSender<TriggerReason>,
    ) -> Self {
        Self {
            state: RefreshState {
                enabled,
                visible: true,
                interval,
                timer: None,
            },
            trigger_tx,
        }
    }

    /// Begin the recurring timer. Cancels any existing timer first; does
    /// nothing while disabled or hidden.
    pub fn start(&mut self) {
        self.cancel_timer();
        if !self.state.enabled || !self.state.visible {
            return;
        }

        let period = self.state.interval;
        let tx = self.trigger_tx.clone();
        debug!(interval_secs = period.as_secs(), "starting refresh timer");
        self.state.timer = Some(tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the cadence starts one
            // full interval from now, like the page's setInterval did.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(TriggerReason::Timer).is_err() {
                    break;
                }
            }
        }));
    }

    /// Cancel the pending timer. Idempotent.
    pub fn stop(&mut self) {
        self.cancel_timer();
    }

    /// Flip the auto-refresh toggle. Turning it on triggers one immediate
    /// cycle and restarts the timer; turning it off stops the timer.
    /// Returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.state.enabled = !self.state.enabled;
        if self.state.enabled {
            info!("auto-refresh enabled");
            let _ = self.trigger_tx.send(TriggerReason::Toggle);
            self.start();
        } else {
            info!("auto-refresh disabled");
            self.stop();
        }
        self.state.enabled
    }

    /// React to the session being hidden or shown. Hidden stops the timer to
    /// avoid wasted polling; becoming visible while enabled restarts it and
    /// triggers an immediate catch-up cycle.
    pub fn on_visibility_change(&mut self, visible: bool) {
        if visible == self.state.visible {
            return;
        }
        self.state.visible = visible;
        if !visible {
            debug!("session hidden, pausing auto-refresh");
            self.stop();
        } else if self.state.enabled {
            debug!("session visible, resuming auto-refresh");
            self.start();
            let _ = self.trigger_tx.send(TriggerReason::Resume);
        }
    }

    /// Trigger exactly one cycle outside the timer cadence, regardless of
    /// the auto-refresh toggle.
    pub fn on_manual_refresh(&self) {
        let _ = self.trigger_tx.send(TriggerReason::Manual);
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    #[cfg(test)]
    fn has_active_timer(&self) -> bool {
        self.state
            .timer
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.state.timer.take() {
            handle.abort();
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn scheduler(
        interval_secs: u64,
        enabled: bool,
    ) -> (RefreshScheduler, UnboundedReceiver<TriggerReason>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            RefreshScheduler::new(Duration::from_secs(interval_secs), enabled, tx),
            rx,
        )
    }

    fn drain(rx: &mut UnboundedReceiver<TriggerReason>) -> Vec<TriggerReason> {
        let mut out = Vec::new();
        while let Ok(reason) = rx.try_recv() {
            out.push(reason);
        }
        out
    }

    /// Let spawned timer tasks run up to their next await point.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance_secs(secs: u64) {
        for _ in 0..secs {
            tokio::time::advance(Duration::from_secs(1)).await;
            settle().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_once_per_interval() {
        let (mut sched, mut rx) = scheduler(5, true);
        sched.start();
        settle().await;

        advance_secs(15).await;
        let triggers = drain(&mut rx);
        assert_eq!(triggers.len(), 3);
        assert!(triggers.iter().all(|t| *t == TriggerReason::Timer));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_does_not_double_fire() {
        let (mut sched, mut rx) = scheduler(1, true);
        sched.start();
        settle().await;
        sched.start();
        sched.start();
        settle().await;

        advance_secs(4).await;
        // One tick per elapsed second, not one per live timer copy.
        assert_eq!(drain(&mut rx).len(), 4);
        assert!(sched.has_active_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_cancels_ticks() {
        let (mut sched, mut rx) = scheduler(1, true);
        sched.start();
        settle().await;
        sched.stop();
        sched.stop();

        advance_secs(5).await;
        assert!(drain(&mut rx).is_empty());
        assert!(!sched.has_active_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_toggles_leave_at_most_one_timer() {
        let (mut sched, mut rx) = scheduler(1, true);
        sched.start();
        settle().await;

        for _ in 0..4 {
            sched.toggle();
        }
        settle().await;
        drain(&mut rx);

        // Ended enabled again; exactly one timer worth of ticks.
        assert!(sched.is_enabled());
        advance_secs(3).await;
        assert_eq!(drain(&mut rx).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_on_triggers_immediate_cycle() {
        let (mut sched, mut rx) = scheduler(30, false);
        assert!(!sched.is_enabled());

        assert!(sched.toggle());
        settle().await;
        assert_eq!(drain(&mut rx), vec![TriggerReason::Toggle]);

        assert!(!sched.toggle());
        settle().await;
        assert!(drain(&mut rx).is_empty());
        assert!(!sched.has_active_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_session_pauses_until_visible_again() {
        let (mut sched, mut rx) = scheduler(2, true);
        sched.start();
        settle().await;

        sched.on_visibility_change(false);
        advance_secs(10).await;
        assert!(drain(&mut rx).is_empty());

        sched.on_visibility_change(true);
        settle().await;
        assert_eq!(drain(&mut rx), vec![TriggerReason::Resume]);

        advance_secs(2).await;
        assert_eq!(drain(&mut rx), vec![TriggerReason::Timer]);
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_change_while_disabled_does_not_start_timer() {
        let (mut sched, mut rx) = scheduler(1, false);
        sched.on_visibility_change(false);
        sched.on_visibility_change(true);
        settle().await;

        advance_secs(3).await;
        assert!(drain(&mut rx).is_empty());
        assert!(!sched.has_active_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_bypasses_disabled_toggle() {
        let (sched, mut rx) = scheduler(30, false);
        sched.on_manual_refresh();
        settle().await;

        assert_eq!(drain(&mut rx), vec![TriggerReason::Manual]);
        advance_secs(60).await;
        assert!(drain(&mut rx).is_empty());
    }
}
