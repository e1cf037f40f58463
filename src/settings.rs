use crate::detector::{DetectorConfig, Thresholds};
use crate::overlay::OverlayConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings file used when neither an argument nor the environment names one.
pub const DEFAULT_SETTINGS_FILE: &str = "splash_settings.json";
/// Environment variable consulted for the settings path.
pub const SETTINGS_ENV: &str = "SMART_SPLASH_SETTINGS";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Unix socket of the emulator's monitor.
    #[serde(default = "default_monitor_socket")]
    pub monitor_socket: PathBuf,
    /// Where the emulator is asked to dump each frame. The file is removed
    /// after every attempt.
    #[serde(default = "default_screenshot_path")]
    pub screenshot_path: PathBuf,
    /// Delay before the first capture so the emulator can open its monitor.
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Attempt number at which the splash is dismissed if no firmware screen
    /// was ever seen. `None` disables the check.
    #[serde(default = "default_safety_net_after")]
    pub safety_net_after: Option<u32>,
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,
    /// Time given to the emulator to finish writing the dump.
    #[serde(default = "default_capture_settle_ms")]
    pub capture_settle_ms: u64,
    #[serde(default = "default_grey_confirm_ms")]
    pub grey_confirm_ms: u64,
    #[serde(default = "default_yellow_clear_ms")]
    pub yellow_clear_ms: u64,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Hard upper bound on how long the overlay stays up.
    #[serde(default = "default_safety_timeout_secs")]
    pub safety_timeout_secs: f32,
    #[serde(default = "default_keep_on_top_interval_ms")]
    pub keep_on_top_interval_ms: u64,
    #[serde(default = "default_keep_on_top_repeats")]
    pub keep_on_top_repeats: u32,
    /// Overlay fill colour, classic Mac grey by default.
    #[serde(default = "default_background")]
    pub background: [u8; 3],
    /// When enabled the application initialises the logger at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    /// Optional file receiving a copy of the log.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_monitor_socket() -> PathBuf {
    PathBuf::from("/tmp/qemu-monitor.sock")
}

fn default_screenshot_path() -> PathBuf {
    PathBuf::from("/tmp/splash_check.ppm")
}

fn default_startup_delay_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_max_attempts() -> u32 {
    80
}

fn default_safety_net_after() -> Option<u32> {
    Some(40)
}

fn default_capture_timeout_ms() -> u64 {
    2000
}

fn default_capture_settle_ms() -> u64 {
    300
}

fn default_grey_confirm_ms() -> u64 {
    500
}

fn default_yellow_clear_ms() -> u64 {
    300
}

fn default_safety_timeout_secs() -> f32 {
    20.0
}

fn default_keep_on_top_interval_ms() -> u64 {
    100
}

fn default_keep_on_top_repeats() -> u32 {
    100
}

fn default_background() -> [u8; 3] {
    [189, 189, 189]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            monitor_socket: default_monitor_socket(),
            screenshot_path: default_screenshot_path(),
            startup_delay_ms: default_startup_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
            safety_net_after: default_safety_net_after(),
            capture_timeout_ms: default_capture_timeout_ms(),
            capture_settle_ms: default_capture_settle_ms(),
            grey_confirm_ms: default_grey_confirm_ms(),
            yellow_clear_ms: default_yellow_clear_ms(),
            thresholds: Thresholds::default(),
            safety_timeout_secs: default_safety_timeout_secs(),
            keep_on_top_interval_ms: default_keep_on_top_interval_ms(),
            keep_on_top_repeats: default_keep_on_top_repeats(),
            background: default_background(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the settings path from an explicit argument, then the
    /// environment, then [`DEFAULT_SETTINGS_FILE`].
    pub fn resolve_path(arg: Option<String>) -> String {
        arg.or_else(|| std::env::var(SETTINGS_ENV).ok())
            .unwrap_or_else(|| DEFAULT_SETTINGS_FILE.to_string())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            max_attempts: self.max_attempts,
            safety_net_after: self.safety_net_after,
            thresholds: self.thresholds.clone(),
            startup_delay: Duration::from_millis(self.startup_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            grey_confirm: Duration::from_millis(self.grey_confirm_ms),
            yellow_clear: Duration::from_millis(self.yellow_clear_ms),
        }
    }

    pub fn overlay_config(&self) -> anyhow::Result<OverlayConfig> {
        let safety_timeout = Duration::try_from_secs_f32(self.safety_timeout_secs.max(0.0))
            .with_context(|| {
                format!("safety_timeout_secs {} is out of range", self.safety_timeout_secs)
            })?;
        Ok(OverlayConfig {
            safety_timeout,
            keep_on_top_interval: Duration::from_millis(self.keep_on_top_interval_ms),
            keep_on_top_repeats: self.keep_on_top_repeats,
        })
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn capture_settle(&self) -> Duration {
        Duration::from_millis(self.capture_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let s: Settings = serde_json::from_str(r#"{"max_attempts": 10}"#).unwrap();
        assert_eq!(s.max_attempts, 10);
        assert_eq!(s.poll_interval_ms, 250);
        assert_eq!(s.safety_net_after, Some(40));
        assert_eq!(s.background, [189, 189, 189]);
    }

    #[test]
    fn null_disables_safety_net() {
        let s: Settings = serde_json::from_str(r#"{"safety_net_after": null}"#).unwrap();
        assert_eq!(s.safety_net_after, None);
    }

    #[test]
    fn explicit_path_wins() {
        assert_eq!(Settings::resolve_path(Some("x.json".into())), "x.json");
    }
}
