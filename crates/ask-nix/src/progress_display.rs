//! Terminal progress for running operations
//!
//! Subscribes to the dispatcher's progress bus and draws a spinner on stderr
//! while an operation runs. Only active when stderr is a terminal and
//! NO_COLOR is unset, so piped and JSON output stay clean. Drawing failures
//! never affect the operation.

use indicatif::{ProgressBar, ProgressStyle};
use luminous_common::ProgressBus;
use luminous_shared::ProgressEvent;
use std::io::IsTerminal;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(80);

/// Whether a spinner would be visible
pub fn spinner_enabled() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Spinner driven by progress events
///
/// One bar per operation: a 0% checkpoint starts a fresh bar and the 100%
/// checkpoint clears it.
#[derive(Clone, Default)]
pub struct ProgressDisplay {
    bar: Arc<Mutex<Option<ProgressBar>>>,
}

impl ProgressDisplay {
    /// Attach to `bus` when a spinner would be visible
    pub fn attach(bus: &ProgressBus) -> Option<Self> {
        if !spinner_enabled() {
            return None;
        }
        let display = Self::default();
        let handle = display.clone();
        bus.register_callback(move |event| handle.on_event(event));
        Some(display)
    }

    fn on_event(&self, event: &ProgressEvent) {
        let mut slot = match self.bar.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };

        if event.is_indeterminate() {
            // Raw command output: keep the spinner turning, show the latest line
            if let Some(bar) = slot.as_ref() {
                bar.set_message(shorten(&event.message));
            }
            return;
        }

        if event.percent <= 0.0 {
            if let Some(old) = slot.take() {
                old.finish_and_clear();
            }
            *slot = Some(new_spinner());
        }
        if let Some(bar) = slot.as_ref() {
            bar.set_message(format!("{:>3.0}% {}", event.percent, event.message));
        }
        if event.percent >= 100.0 {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

fn new_spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
        .template("{spinner} {msg} {elapsed:.dim}")
    {
        bar.set_style(style);
    }
    bar.enable_steady_tick(TICK);
    bar
}

fn shorten(line: &str) -> String {
    const MAX: usize = 60;
    let line = line.trim();
    if line.chars().count() <= MAX {
        line.to_string()
    } else {
        let cut: String = line.chars().take(MAX - 1).collect();
        format!("{}…", cut)
    }
}
