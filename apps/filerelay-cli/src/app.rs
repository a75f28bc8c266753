//! Runs one transfer and reports it on the terminal.

use std::sync::Arc;

use anyhow::Context;
use filerelay_protocol::Endpoints;
use filerelay_session::{
    HttpRelay, InProgressCounter, TransferSnapshot, TransferStatus, UploadController,
    UploadHandle,
};
use filerelay_transport::{TransportClient, UploadFile};
use tokio::sync::mpsc;

use crate::cli::Cli;
use crate::config::Config;
use crate::render::{Renderer, TransferView};

const IN_PROGRESS_WARNING: &str = "An upload is in progress. Press Ctrl-C again to cancel.";

enum Step {
    Changed,
    Stopped,
    Interrupted,
}

/// What to do about a Ctrl-C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Warn,
    Cancel,
}

/// The first Ctrl-C during an active transfer only warns.
#[derive(Debug, Default)]
pub struct InterruptGuard {
    warned: bool,
}

impl InterruptGuard {
    pub fn on_interrupt(&mut self, any_active: bool) -> Interrupt {
        if any_active && !self.warned {
            self.warned = true;
            Interrupt::Warn
        } else {
            Interrupt::Cancel
        }
    }
}

/// Sends the file named on the command line. Returns `true` when the
/// receiver got it.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<bool> {
    let server = cli.server.unwrap_or(config.server_url);
    let endpoints =
        Endpoints::new(&server).with_context(|| format!("invalid relay URL {server:?}"))?;

    let file = UploadFile::from_path(&cli.file, cli.name.as_deref().unwrap_or(""))
        .await
        .with_context(|| format!("cannot read {}", cli.file.display()))?;

    let mut interrupts = listen_for_interrupts()?;

    let transport = TransportClient::new(endpoints.clone())?;
    let counter = InProgressCounter::shared();
    let handle = UploadController::start(Arc::new(HttpRelay::new(transport)), file, counter.clone());

    let mut view = TransferView::new(Renderer::new(endpoints, cli.iec || config.iec_units));
    let last = watch_transfer(
        handle,
        &mut view,
        &counter,
        &mut interrupts,
        &mut InterruptGuard::default(),
    )
    .await;

    Ok(last.state.status() == TransferStatus::Done && !last.cancelled)
}

/// Installs the Ctrl-C handler once; every press arrives as one `()`.
fn listen_for_interrupts() -> anyhow::Result<mpsc::Receiver<()>> {
    #[cfg(unix)]
    let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .context("cannot listen for Ctrl-C")?;
    #[cfg(windows)]
    let mut signal = tokio::signal::windows::ctrl_c().context("cannot listen for Ctrl-C")?;

    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        while signal.recv().await.is_some() {
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });
    Ok(rx)
}

/// Shows every status change until the transfer ends, answering
/// interrupts through `guard`.
async fn watch_transfer(
    mut handle: UploadHandle,
    view: &mut TransferView,
    counter: &InProgressCounter,
    interrupts: &mut mpsc::Receiver<()>,
    guard: &mut InterruptGuard,
) -> TransferSnapshot {
    loop {
        let snap = handle.snapshot();
        view.show(&snap);
        if snap.is_final() {
            break;
        }

        let step = tokio::select! {
            changed = handle.changed() => match changed {
                Some(_) => Step::Changed,
                None => Step::Stopped,
            },
            Some(()) = interrupts.recv() => Step::Interrupted,
        };

        match step {
            Step::Changed => {}
            Step::Stopped => break,
            Step::Interrupted => match guard.on_interrupt(counter.any_active()) {
                Interrupt::Warn => view.warn(IN_PROGRESS_WARNING),
                Interrupt::Cancel => {
                    tracing::info!("cancelling transfer");
                    handle.cancel();
                }
            },
        }
    }

    let last = handle.wait().await;
    view.show(&last);
    last
}
