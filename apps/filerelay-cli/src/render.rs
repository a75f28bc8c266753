//! Terminal rendering of transfer snapshots.
//!
//! Waiting, done, error and cancel states print one status line each.
//! A running transfer drives a progress bar instead.

use filerelay_protocol::Endpoints;
use filerelay_session::{TransferSnapshot, TransferState};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const SI_UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];
const IEC_UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

/// Formats a byte count for humans, e.g. `1.50 MB` or `512 Bytes`.
///
/// SI (powers of 1000) by default, IEC (powers of 1024) when `iec` is set.
pub fn format_file_size(size: u64, iec: bool) -> String {
    let (base, units) = if iec {
        (1024.0, IEC_UNITS)
    } else {
        (1000.0, SI_UNITS)
    };

    let mut value = size as f64;
    let mut idx = 0;
    while value >= base && idx < units.len() {
        value /= base;
        idx += 1;
    }

    if idx == 0 {
        return format!("{size} Bytes");
    }
    format!("{value:.2} {}", units[idx - 1])
}

/// Turns snapshots into status lines.
pub struct Renderer {
    endpoints: Endpoints,
    iec: bool,
}

impl Renderer {
    pub fn new(endpoints: Endpoints, iec: bool) -> Self {
        Self { endpoints, iec }
    }

    /// The line describing `snap`, or `None` while bytes are flowing.
    pub fn status_line(&self, snap: &TransferSnapshot) -> Option<String> {
        if snap.cancelled {
            return Some("Transfer cancelled.".into());
        }

        let line = match &snap.state {
            TransferState::Waiting => match snap.session_id {
                None => "Please wait ...".into(),
                Some(id) => format!(
                    "Waiting for the recipient of the file. \
                     Please give the following link to your partner:\n  {}",
                    self.endpoints.download_url(id)
                ),
            },
            TransferState::Running { .. } => return None,
            TransferState::Done { .. } => {
                format!("Done ({}).", format_file_size(snap.file.size, self.iec))
            }
            TransferState::Error { cause } => format!("Error. {cause}"),
        };
        Some(line)
    }

    fn bar_style(&self) -> ProgressStyle {
        let template = if self.iec {
            "{spinner:.green} {msg} [{bar:40.cyan/blue}] {binary_bytes}/{binary_total_bytes} ({percent}%, {binary_bytes_per_sec}, {eta})"
        } else {
            "{spinner:.green} {msg} [{bar:40.cyan/blue}] {decimal_bytes}/{decimal_total_bytes} ({percent}%, {decimal_bytes_per_sec}, {eta})"
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }
}

/// What the user sees of one transfer.
pub struct TransferView {
    renderer: Renderer,
    bar: Option<ProgressBar>,
    last_line: Option<String>,
    draw: bool,
}

impl TransferView {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            renderer,
            bar: None,
            last_line: None,
            draw: true,
        }
    }

    /// A view whose progress bar is never drawn.
    #[cfg(test)]
    pub fn hidden(renderer: Renderer) -> Self {
        Self {
            draw: false,
            ..Self::new(renderer)
        }
    }

    /// Brings the terminal up to date with `snap`.
    ///
    /// Returns the status line when a new one was printed.
    pub fn show(&mut self, snap: &TransferSnapshot) -> Option<String> {
        if let (TransferState::Running { bytes_transferred }, false) = (&snap.state, snap.cancelled)
        {
            if self.bar.is_none() {
                self.bar = Some(self.new_bar(snap));
            }
            if let Some(bar) = &self.bar {
                bar.set_position(*bytes_transferred);
            }
            return None;
        }

        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        let line = self.renderer.status_line(snap)?;
        if self.last_line.as_deref() == Some(line.as_str()) {
            return None;
        }
        println!("{line}");
        self.last_line = Some(line.clone());
        Some(line)
    }

    /// Prints a message without tearing the progress bar.
    pub fn warn(&self, message: &str) {
        match &self.bar {
            Some(bar) => bar.suspend(|| eprintln!("{message}")),
            None => eprintln!("{message}"),
        }
    }

    fn new_bar(&self, snap: &TransferSnapshot) -> ProgressBar {
        let target = if self.draw {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(Some(snap.file.size), target);
        bar.set_style(self.renderer.bar_style());
        bar.set_message(format!("Sending {}", snap.file.name));
        bar
    }
}
