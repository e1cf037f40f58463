use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the file writer flushing until the process exits.
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialise logging. The default level is `info`; `debug` can be explicitly
/// enabled via the settings file, in which case `RUST_LOG` may override it.
///
/// When `log_file` is set, output is also appended to that file. Calling this
/// more than once is harmless: once a subscriber is installed later calls
/// return without touching `log_file`.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    // With debug logging disabled we force `info` regardless of `RUST_LOG`
    // so frame-by-frame output never leaks into a normal boot.
    let level = if debug { "debug" } else { "info" };
    let filter = || {
        if debug {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
        } else {
            EnvFilter::new(level)
        }
    };

    let file_layer = log_file.and_then(|path| {
        let dir = path.parent().map(PathBuf::from).unwrap_or_default();
        let name = path.file_name()?.to_owned();
        let appender = tracing_appender::rolling::never(dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        if FILE_GUARD.set(guard).is_err() {
            // A file writer is already running; its subscriber wins anyway.
            return None;
        }
        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter()),
        )
    });

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter()))
        .with(file_layer)
        .try_init();
}
