//! CLI-specific progress handling for drive-dl
//!
//! Turns the library's progress events into one progress bar per transfer.

use std::sync::{Arc, Mutex};

use drive_dl::{ProgressCallback, ProgressEvent};
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner:.green} {msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {bytes_per_sec} ETA: {eta}";

/// Used when the remote service did not declare a size
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} [{elapsed_precise}] {bytes} {bytes_per_sec}";

/// Creates a progress bar for CLI display; a zero total gets a spinner
pub fn create_progress_bar(total_size: u64) -> ProgressBar {
    if total_size == 0 {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template(SPINNER_TEMPLATE)
                .expect("Failed to create spinner style"),
        );
        return pb;
    }

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .expect("Failed to create progress style")
            .progress_chars("#>-"),
    );
    pb
}

/// Owns the bar of the transfer currently in flight
#[derive(Default)]
pub struct ProgressManager {
    current: Mutex<Option<ProgressBar>>,
}

impl ProgressManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Callback to hand to the downloader
    pub fn callback(self: &Arc<Self>) -> ProgressCallback {
        let manager = Arc::clone(self);
        Arc::new(move |event: ProgressEvent<'_>| manager.handle(event))
    }

    fn handle(&self, event: ProgressEvent<'_>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        match event {
            ProgressEvent::Started { name, total } => {
                if let Some(stale) = current.take() {
                    stale.finish_and_clear();
                }
                let pb = create_progress_bar(total);
                pb.set_message(name.to_string());
                *current = Some(pb);
            }
            ProgressEvent::Advanced { downloaded } => {
                if let Some(pb) = current.as_ref() {
                    pb.set_position(downloaded);
                }
            }
            ProgressEvent::Finished => {
                if let Some(pb) = current.take() {
                    pb.finish();
                }
            }
        }
    }
}
