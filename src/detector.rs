//! Boot-phase detection from successive frame classifications.
//!
//! The firmware splash is light yellow; once it is gone (or the grey startup
//! screen shows up) the overlay may be dismissed. Single frames are noisy, so
//! the yellow screen has to stay gone for several frames before we act.

use crate::capture::FrameError;
use crate::classify::ClassificationSample;
use serde::{Deserialize, Serialize};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    DismissNow,
    DismissOnTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Waiting,
    YellowSeen,
    Confirmed,
    GaveUp,
}

impl DetectorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::GaveUp)
    }
}

/// What made the detector decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    GreyScreen,
    YellowCleared,
    YellowNeverSeen,
    AttemptsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub decision: Decision,
    pub trigger: Trigger,
    /// Pause before the decision is delivered.
    pub settle: Duration,
    pub attempt: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Decided(Verdict),
    /// A verdict was already reached; further frames are ignored.
    Finished,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Thresholds {
    /// Yellow share above which the firmware screen counts as visible.
    #[serde(default = "default_yellow_seen_pct")]
    pub yellow_seen_pct: f32,
    /// Yellow share below which a frame counts as "firmware gone".
    #[serde(default = "default_yellow_clear_pct")]
    pub yellow_clear_pct: f32,
    #[serde(default = "default_grey_dismiss_pct")]
    pub grey_dismiss_pct: f32,
    /// Frames without yellow needed after yellow was seen.
    #[serde(default = "default_clear_frames")]
    pub clear_frames: u32,
}

fn default_yellow_seen_pct() -> f32 {
    20.0
}

fn default_yellow_clear_pct() -> f32 {
    10.0
}

fn default_grey_dismiss_pct() -> f32 {
    50.0
}

fn default_clear_frames() -> u32 {
    2
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            yellow_seen_pct: default_yellow_seen_pct(),
            yellow_clear_pct: default_yellow_clear_pct(),
            grey_dismiss_pct: default_grey_dismiss_pct(),
            clear_frames: default_clear_frames(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub max_attempts: u32,
    pub safety_net_after: Option<u32>,
    pub thresholds: Thresholds,
    pub startup_delay: Duration,
    pub poll_interval: Duration,
    pub grey_confirm: Duration,
    pub yellow_clear: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 80,
            safety_net_after: Some(40),
            thresholds: Thresholds::default(),
            startup_delay: Duration::from_secs(2),
            poll_interval: Duration::from_millis(250),
            grey_confirm: Duration::from_millis(500),
            yellow_clear: Duration::from_millis(300),
        }
    }
}

pub struct BootPhaseDetector {
    config: DetectorConfig,
    state: DetectorState,
    attempts: u32,
    post_yellow_frames: u32,
    verdict: Option<Verdict>,
}

impl BootPhaseDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: DetectorState::Waiting,
            attempts: 0,
            post_yellow_frames: 0,
            verdict: None,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn post_yellow_frames(&self) -> u32 {
        self.post_yellow_frames
    }

    /// The verdict that stands without taking another frame: one reached
    /// earlier, or giving up because the attempt budget is already spent.
    pub fn settled(&mut self) -> Option<Verdict> {
        if self.verdict.is_none() && self.attempts >= self.config.max_attempts {
            return Some(self.give_up());
        }
        self.verdict
    }

    /// Fold one attempt into the state. `None` means the attempt produced no
    /// usable frame; it only counts against the attempt budget.
    pub fn observe(&mut self, frame: Option<ClassificationSample>) -> Step {
        if self.state.is_terminal() {
            return Step::Finished;
        }
        self.attempts += 1;
        let t = &self.config.thresholds;

        if let Some(sample) = frame {
            if sample.grey_pct > t.grey_dismiss_pct {
                return self.confirm(Trigger::GreyScreen, self.config.grey_confirm);
            }
            if sample.yellow_pct > t.yellow_seen_pct {
                if self.state != DetectorState::YellowSeen {
                    tracing::info!(attempt = self.attempts, "firmware screen detected");
                }
                self.state = DetectorState::YellowSeen;
                self.post_yellow_frames = 0;
            } else if self.state == DetectorState::YellowSeen
                && sample.yellow_pct < t.yellow_clear_pct
            {
                self.post_yellow_frames += 1;
                if self.post_yellow_frames >= t.clear_frames {
                    return self.confirm(Trigger::YellowCleared, self.config.yellow_clear);
                }
            }
        }

        if self.state == DetectorState::Waiting
            && self
                .config
                .safety_net_after
                .is_some_and(|limit| self.attempts >= limit)
        {
            return self.confirm(Trigger::YellowNeverSeen, Duration::ZERO);
        }
        if self.attempts >= self.config.max_attempts {
            return Step::Decided(self.give_up());
        }
        Step::Continue
    }

    fn confirm(&mut self, trigger: Trigger, settle: Duration) -> Step {
        self.state = DetectorState::Confirmed;
        Step::Decided(self.decide(Decision::DismissNow, trigger, settle))
    }

    fn give_up(&mut self) -> Verdict {
        self.state = DetectorState::GaveUp;
        self.decide(
            Decision::DismissOnTimeout,
            Trigger::AttemptsExhausted,
            Duration::ZERO,
        )
    }

    fn decide(&mut self, decision: Decision, trigger: Trigger, settle: Duration) -> Verdict {
        let verdict = Verdict {
            decision,
            trigger,
            settle,
            attempt: self.attempts,
        };
        self.verdict = Some(verdict);
        verdict
    }
}

/// Produces one classified frame per call.
pub trait SampleSource {
    fn sample(&mut self) -> Result<ClassificationSample, FrameError>;
}

/// Receives the single decision of a run.
pub trait DecisionSink {
    fn deliver(&self, decision: Decision);
}

pub trait Sleep {
    fn sleep(&mut self, duration: Duration);
}

pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Poll `source` until the detector reaches a verdict, then hand the decision
/// to `sink`. Failed attempts are logged and count as frames without signal.
pub fn run<S, K, Z>(
    source: &mut S,
    config: &DetectorConfig,
    sink: &K,
    sleeper: &mut Z,
) -> Verdict
where
    S: SampleSource + ?Sized,
    K: DecisionSink + ?Sized,
    Z: Sleep + ?Sized,
{
    sleeper.sleep(config.startup_delay);
    let mut detector = BootPhaseDetector::new(config.clone());
    let verdict = loop {
        if let Some(verdict) = detector.settled() {
            break verdict;
        }
        let attempt = detector.attempts() + 1;
        let frame = match source.sample() {
            Ok(sample) => {
                tracing::debug!(attempt, "frame {sample}");
                Some(sample)
            }
            Err(e) => {
                tracing::debug!(attempt, "no frame: {e}");
                None
            }
        };
        match detector.observe(frame) {
            Step::Continue => sleeper.sleep(config.poll_interval),
            Step::Decided(verdict) => break verdict,
            // picked up by `settled` on the next turn
            Step::Finished => {}
        }
    };

    tracing::info!(
        attempt = verdict.attempt,
        trigger = ?verdict.trigger,
        decision = ?verdict.decision,
        "boot detection finished"
    );
    sleeper.sleep(verdict.settle);
    sink.deliver(verdict.decision);
    verdict
}

/// Run the detector on its own thread. The handle may be dropped; the thread
/// ends on its own once the attempt budget is spent.
pub fn spawn<S, K>(
    mut source: S,
    config: DetectorConfig,
    sink: K,
) -> std::io::Result<JoinHandle<Verdict>>
where
    S: SampleSource + Send + 'static,
    K: DecisionSink + Send + 'static,
{
    thread::Builder::new()
        .name("boot-detector".to_string())
        .spawn(move || run(&mut source, &config, &sink, &mut ThreadSleep))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yellow(pct: f32) -> Option<ClassificationSample> {
        Some(ClassificationSample {
            yellow_pct: pct,
            ..Default::default()
        })
    }

    fn grey(pct: f32) -> Option<ClassificationSample> {
        Some(ClassificationSample {
            grey_pct: pct,
            ..Default::default()
        })
    }

    fn blank() -> Option<ClassificationSample> {
        Some(ClassificationSample::default())
    }

    #[test]
    fn yellow_must_clear_for_two_frames() {
        let mut d = BootPhaseDetector::new(DetectorConfig::default());
        for _ in 0..3 {
            assert_eq!(d.observe(yellow(80.0)), Step::Continue);
        }
        assert_eq!(d.state(), DetectorState::YellowSeen);
        assert_eq!(d.observe(yellow(5.0)), Step::Continue);
        match d.observe(yellow(5.0)) {
            Step::Decided(v) => {
                assert_eq!(v.decision, Decision::DismissNow);
                assert_eq!(v.trigger, Trigger::YellowCleared);
                assert_eq!(v.attempt, 5);
                assert_eq!(v.settle, Duration::from_millis(300));
            }
            other => panic!("expected a verdict, got {other:?}"),
        }
        assert_eq!(d.state(), DetectorState::Confirmed);
        assert_eq!(d.observe(grey(0.0)), Step::Finished);
    }

    #[test]
    fn yellow_flicker_resets_the_clear_counter() {
        let mut d = BootPhaseDetector::new(DetectorConfig::default());
        d.observe(yellow(80.0));
        d.observe(yellow(5.0));
        assert_eq!(d.post_yellow_frames(), 1);
        d.observe(yellow(60.0));
        assert_eq!(d.post_yellow_frames(), 0);
        assert_eq!(d.observe(yellow(5.0)), Step::Continue);
    }

    #[test]
    fn in_between_yellow_neither_resets_nor_counts() {
        let mut d = BootPhaseDetector::new(DetectorConfig::default());
        d.observe(yellow(80.0));
        d.observe(yellow(5.0));
        d.observe(yellow(15.0));
        assert_eq!(d.post_yellow_frames(), 1);
        assert!(matches!(d.observe(yellow(5.0)), Step::Decided(_)));
    }

    #[test]
    fn grey_screen_overrides_yellow_history() {
        let mut d = BootPhaseDetector::new(DetectorConfig::default());
        d.observe(yellow(80.0));
        match d.observe(grey(60.0)) {
            Step::Decided(v) => {
                assert_eq!(v.trigger, Trigger::GreyScreen);
                assert_eq!(v.settle, Duration::from_millis(500));
            }
            other => panic!("expected a verdict, got {other:?}"),
        }
        assert_eq!(d.state(), DetectorState::Confirmed);
    }

    #[test]
    fn grey_at_exactly_threshold_is_not_enough() {
        let mut d = BootPhaseDetector::new(DetectorConfig::default());
        assert_eq!(d.observe(grey(50.0)), Step::Continue);
    }

    #[test]
    fn safety_net_fires_at_its_attempt() {
        let mut d = BootPhaseDetector::new(DetectorConfig::default());
        for _ in 0..39 {
            assert_eq!(d.observe(blank()), Step::Continue);
        }
        match d.observe(blank()) {
            Step::Decided(v) => {
                assert_eq!(v.decision, Decision::DismissNow);
                assert_eq!(v.trigger, Trigger::YellowNeverSeen);
                assert_eq!(v.attempt, 40);
            }
            other => panic!("expected a verdict, got {other:?}"),
        }
    }

    #[test]
    fn safety_net_ignored_once_yellow_seen() {
        let mut d = BootPhaseDetector::new(DetectorConfig::default());
        d.observe(yellow(80.0));
        for _ in 0..60 {
            assert_eq!(d.observe(yellow(30.0)), Step::Continue);
        }
        assert_eq!(d.state(), DetectorState::YellowSeen);
    }

    #[test]
    fn budget_exhaustion_gives_up() {
        let config = DetectorConfig {
            safety_net_after: None,
            ..Default::default()
        };
        let mut d = BootPhaseDetector::new(config);
        for _ in 0..79 {
            assert_eq!(d.observe(blank()), Step::Continue);
        }
        match d.observe(blank()) {
            Step::Decided(v) => {
                assert_eq!(v.decision, Decision::DismissOnTimeout);
                assert_eq!(v.trigger, Trigger::AttemptsExhausted);
                assert_eq!(v.attempt, 80);
            }
            other => panic!("expected a verdict, got {other:?}"),
        }
        assert_eq!(d.state(), DetectorState::GaveUp);
        assert_eq!(d.observe(blank()), Step::Finished);
    }

    #[test]
    fn zero_budget_is_settled_before_any_frame() {
        let config = DetectorConfig {
            max_attempts: 0,
            safety_net_after: None,
            ..Default::default()
        };
        let mut d = BootPhaseDetector::new(config);
        let verdict = d.settled().expect("spent budget settles immediately");
        assert_eq!(verdict.decision, Decision::DismissOnTimeout);
        assert_eq!(verdict.attempt, 0);
        assert_eq!(d.state(), DetectorState::GaveUp);
        assert_eq!(d.settled(), Some(verdict));
        assert_eq!(d.observe(blank()), Step::Finished);
    }

    #[test]
    fn settled_is_empty_while_running() {
        let mut d = BootPhaseDetector::new(DetectorConfig::default());
        assert_eq!(d.settled(), None);
        d.observe(yellow(80.0));
        assert_eq!(d.settled(), None);
        d.observe(grey(90.0));
        assert!(matches!(d.settled(), Some(v) if v.trigger == Trigger::GreyScreen));
    }

    #[test]
    fn missing_frames_do_not_count_as_cleared() {
        let mut d = BootPhaseDetector::new(DetectorConfig::default());
        d.observe(yellow(80.0));
        d.observe(None);
        d.observe(None);
        assert_eq!(d.post_yellow_frames(), 0);
        assert_eq!(d.attempts(), 3);
        assert_eq!(d.state(), DetectorState::YellowSeen);
    }
}
