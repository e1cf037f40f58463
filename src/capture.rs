use crate::classify::{classify, ClassificationSample};
use crate::detector::SampleSource;
use crate::monitor::{CaptureError, MonitorClient};
use crate::raster::{decode, DecodeError};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Take one framebuffer snapshot into `target` and wait for the emulator to
/// finish writing it.
pub fn capture(
    monitor: &MonitorClient,
    target: &Path,
    settle: Duration,
) -> Result<(), CaptureError> {
    monitor.screendump(target)?;
    std::thread::sleep(settle);
    if target.exists() {
        Ok(())
    } else {
        Err(CaptureError::Missing(target.to_path_buf()))
    }
}

/// Best-effort removal of a consumed snapshot.
pub fn discard(target: &Path) {
    if let Err(e) = std::fs::remove_file(target) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!("failed to remove {}: {e}", target.display());
        }
    }
}

/// Capture, decode and classify through the emulator monitor.
pub struct ScreendumpSource {
    monitor: MonitorClient,
    target: PathBuf,
    settle: Duration,
}

impl ScreendumpSource {
    pub fn new(monitor: MonitorClient, target: impl Into<PathBuf>, settle: Duration) -> Self {
        Self {
            monitor,
            target: target.into(),
            settle,
        }
    }
}

impl SampleSource for ScreendumpSource {
    fn sample(&mut self) -> Result<ClassificationSample, FrameError> {
        let result = capture(&self.monitor, &self.target, self.settle)
            .map_err(FrameError::from)
            .and_then(|()| decode(&self.target).map_err(FrameError::from));
        discard(&self.target);
        Ok(classify(&result?))
    }
}
