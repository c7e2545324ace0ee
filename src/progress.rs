use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use owo_colors::OwoColorize;

pub static PROGRESS_BAR: Lazy<ProgressBar> = Lazy::new(|| {
    let pb = ProgressBar::new(0).with_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {wide_msg}")
            .progress_chars("#>-")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.enable_steady_tick(200);
    pb
});

pub fn log_progress(message: &str) {
    PROGRESS_BAR.set_message(message.to_string());
    tracing::info!("{message}");
}

pub fn log_verbose(message: &str) {
    tracing::debug!("{message}");
}

pub fn log_warning(message: &str) {
    PROGRESS_BAR.println(message.yellow().to_string());
    tracing::warn!("{message}");
}
