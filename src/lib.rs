// Library surface for the binary, headless tests and reuse.
pub mod app;
pub mod app_dirs;
pub mod archive;
pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod haptics;
pub mod refresh;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod stopwatch;
pub mod ui;
