use anyhow::{anyhow, Context};
use eframe::egui;
use once_cell::sync::OnceCell;
use smart_splash::capture::ScreendumpSource;
use smart_splash::classify::classify;
use smart_splash::detector;
use smart_splash::gui::{self, SplashApp};
use smart_splash::logging;
use smart_splash::monitor::MonitorClient;
use smart_splash::overlay::{dismiss_channel, DismissRequest, OverlayController};
use smart_splash::raster::decode;
use smart_splash::settings::Settings;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("--probe") => probe(args.get(1).map(String::as_str)),
        _ => run(args.into_iter().next()),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            logging::init(false, None);
            tracing::error!("smart splash failed: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Classify a single dump and print the composition.
fn probe(path: Option<&str>) -> anyhow::Result<ExitCode> {
    logging::init(false, None);
    let path = path.ok_or_else(|| anyhow!("usage: smart_splash --probe <file.ppm>"))?;
    let image = decode(Path::new(path)).with_context(|| format!("decoding {path}"))?;
    println!("{}x{} {}", image.width, image.height, classify(&image));
    Ok(ExitCode::SUCCESS)
}

fn run(settings_arg: Option<String>) -> anyhow::Result<ExitCode> {
    let path = Settings::resolve_path(settings_arg);
    let settings =
        Settings::load(&path).with_context(|| format!("loading settings from {path}"))?;
    logging::init(settings.debug_logging, settings.log_file.clone());
    tracing::info!(settings = %path, "starting splash");

    // Filled in once the window exists; requests queued earlier are picked
    // up by the first frame.
    let egui_ctx: Arc<OnceCell<egui::Context>> = Arc::new(OnceCell::new());
    let waker = egui_ctx.clone();
    let (dismiss, requests) = dismiss_channel(move || {
        if let Some(ctx) = waker.get() {
            ctx.request_repaint();
        }
    });

    let on_signal = dismiss.clone();
    ctrlc::set_handler(move || on_signal.send(DismissRequest::Terminate))
        .context("installing termination handler")?;

    let monitor = MonitorClient::new(&settings.monitor_socket, settings.capture_timeout());
    let source = ScreendumpSource::new(
        monitor,
        &settings.screenshot_path,
        settings.capture_settle(),
    );
    let detector_config = settings.detector_config();
    let overlay_config = settings
        .overlay_config()
        .context("invalid overlay settings")?;
    let background = settings.background;

    eframe::run_native(
        "Smart Splash",
        gui::native_options(),
        Box::new(move |cc| {
            let _ = egui_ctx.set(cc.egui_ctx.clone());
            let controller = OverlayController::new(requests, overlay_config, Instant::now());
            // Without a detector the safety timeout still closes the splash.
            if let Err(e) = detector::spawn(source, detector_config, dismiss) {
                tracing::error!("failed to start boot detector: {e}");
            }
            Box::new(SplashApp::new(controller, background))
        }),
    )
    .map_err(|e| anyhow!("splash window failed: {e}"))?;

    tracing::info!("splash closed");
    Ok(ExitCode::SUCCESS)
}
