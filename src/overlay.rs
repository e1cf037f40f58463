//! Window-independent half of the splash overlay.
//!
//! The controller lives on the UI thread. It decides when the window must be
//! raised again and when it must close; the GUI only carries out the
//! resulting [`OverlayCommand`]s. Other threads talk to it exclusively through
//! a [`DismissSender`].

use crate::detector::{Decision, DecisionSink};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissRequest {
    Detector(Decision),
    SafetyTimeout,
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayCommand {
    Raise,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayLifecycle {
    Showing,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    pub safety_timeout: Duration,
    pub keep_on_top_interval: Duration,
    pub keep_on_top_repeats: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            safety_timeout: Duration::from_secs(20),
            keep_on_top_interval: Duration::from_millis(100),
            keep_on_top_repeats: 100,
        }
    }
}

/// Cloneable handle for requesting teardown from any thread.
#[derive(Clone)]
pub struct DismissSender {
    tx: Sender<DismissRequest>,
    wake: Arc<dyn Fn() + Send + Sync>,
}

impl DismissSender {
    /// Queue `request` and wake the UI loop. Sending after the overlay is gone
    /// is silently ignored.
    pub fn send(&self, request: DismissRequest) {
        if self.tx.send(request).is_ok() {
            (self.wake)();
        }
    }
}

impl DecisionSink for DismissSender {
    fn deliver(&self, decision: Decision) {
        self.send(DismissRequest::Detector(decision));
    }
}

/// Create the request queue. `wake` is called after every successful send so
/// an idle event loop picks the request up promptly.
pub fn dismiss_channel(
    wake: impl Fn() + Send + Sync + 'static,
) -> (DismissSender, Receiver<DismissRequest>) {
    let (tx, rx) = channel();
    (
        DismissSender {
            tx,
            wake: Arc::new(wake),
        },
        rx,
    )
}

pub struct OverlayController {
    rx: Receiver<DismissRequest>,
    config: OverlayConfig,
    /// `None` when the safety timeout lies beyond what `Instant` can hold.
    deadline: Option<Instant>,
    next_raise: Instant,
    raises: u32,
    lifecycle: OverlayLifecycle,
    close_reason: Option<DismissRequest>,
}

impl OverlayController {
    pub fn new(rx: Receiver<DismissRequest>, config: OverlayConfig, now: Instant) -> Self {
        Self {
            rx,
            deadline: now.checked_add(config.safety_timeout),
            next_raise: now,
            raises: 0,
            lifecycle: OverlayLifecycle::Showing,
            close_reason: None,
            config,
        }
    }

    pub fn lifecycle(&self) -> OverlayLifecycle {
        self.lifecycle
    }

    pub fn close_reason(&self) -> Option<DismissRequest> {
        self.close_reason
    }

    pub fn raises(&self) -> u32 {
        self.raises
    }

    /// Advance the controller to `now`: drain pending requests, check the
    /// absolute deadline and schedule the keep-on-top raises.
    pub fn tick(&mut self, now: Instant) -> Vec<OverlayCommand> {
        let mut commands = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(request) => {
                    if self.teardown(request) {
                        commands.push(OverlayCommand::Close);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if self.deadline.is_some_and(|deadline| now >= deadline)
            && self.teardown(DismissRequest::SafetyTimeout)
        {
            commands.push(OverlayCommand::Close);
        }

        if self.lifecycle == OverlayLifecycle::Showing
            && self.raises < self.config.keep_on_top_repeats
            && now >= self.next_raise
        {
            self.raises += 1;
            self.next_raise = now + self.config.keep_on_top_interval;
            commands.push(OverlayCommand::Raise);
        }
        commands
    }

    /// Close the overlay for `reason`. Returns `true` only for the first call;
    /// everything after that is a no-op.
    pub fn teardown(&mut self, reason: DismissRequest) -> bool {
        if self.lifecycle == OverlayLifecycle::Closed {
            tracing::debug!(?reason, "overlay already closed");
            return false;
        }
        tracing::info!(?reason, "dismissing splash");
        self.lifecycle = OverlayLifecycle::Closed;
        self.close_reason = Some(reason);
        true
    }

    /// How long the UI may sleep before the next scheduled action.
    pub fn next_wakeup(&self, now: Instant) -> Option<Duration> {
        if self.lifecycle == OverlayLifecycle::Closed {
            return None;
        }
        let raise = (self.raises < self.config.keep_on_top_repeats).then_some(self.next_raise);
        let due = match (self.deadline, raise) {
            (Some(deadline), Some(raise)) => deadline.min(raise),
            (Some(due), None) | (None, Some(due)) => due,
            (None, None) => return None,
        };
        Some(due.saturating_duration_since(now))
    }
}
