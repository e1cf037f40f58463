use crate::overlay::{DismissRequest, OverlayCommand, OverlayController, OverlayLifecycle};
use eframe::egui;
use std::time::Instant;

/// Full-screen splash window shown while the emulator boots.
pub struct SplashApp {
    controller: OverlayController,
    background: egui::Color32,
}

impl SplashApp {
    pub fn new(controller: OverlayController, background: [u8; 3]) -> Self {
        Self {
            controller,
            background: egui::Color32::from_rgb(background[0], background[1], background[2]),
        }
    }

    fn apply(&self, ctx: &egui::Context, command: OverlayCommand) {
        match command {
            OverlayCommand::Raise => {
                ctx.send_viewport_cmd(egui::ViewportCommand::WindowLevel(
                    egui::WindowLevel::AlwaysOnTop,
                ));
            }
            OverlayCommand::Close => {
                tracing::debug!("closing splash window");
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }
}

/// Window options for a borderless, always-on-top, full-screen surface.
pub fn native_options() -> eframe::NativeOptions {
    eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Smart Splash")
            .with_fullscreen(true)
            .with_decorations(false)
            .with_always_on_top(),
        ..Default::default()
    }
}

impl eframe::App for SplashApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Closing from outside (window manager, Alt+F4) goes through the same
        // teardown so it is recorded like any other dismissal.
        if ctx.input(|i| i.viewport().close_requested()) {
            self.controller.teardown(DismissRequest::Terminate);
        }

        let now = Instant::now();
        for command in self.controller.tick(now) {
            self.apply(ctx, command);
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(self.background))
            .show(ctx, |_ui| {});

        if self.controller.lifecycle() == OverlayLifecycle::Showing {
            if let Some(wait) = self.controller.next_wakeup(now) {
                ctx.request_repaint_after(wait);
            }
        }
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        egui::Rgba::from(self.background).to_array()
    }
}
