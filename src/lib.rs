pub mod capture;
pub mod classify;
pub mod detector;
pub mod gui;
pub mod logging;
pub mod monitor;
pub mod overlay;
pub mod raster;
pub mod settings;
