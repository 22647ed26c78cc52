// Beamdrop daemon: peer transport, registry event loop, broadcast driver.

mod app;
mod config;
mod transport;

use std::time::Duration;

use anyhow::Context;
use beam_core::FileBlob;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::{App, AppEvent, UserIntent};
use crate::transport::TcpTransport;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Delay between session start and dialing a deep-link peer, giving the
/// local identifier time to register with the transport.
const SETTLE_DELAY: Duration = Duration::from_secs(2);
/// Delay between dialing and auto-triggering a broadcast of staged files,
/// giving the handshake time to land.
const TRIGGER_DELAY: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    let mut file_args: Vec<String> = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("beam-daemon {}", VERSION);
            return Ok(());
        }
        file_args.push(arg);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = config::load();
    let staged = stage_files(&file_args)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let (transport_tx, mut transport_rx) = tokio::sync::mpsc::unbounded_channel();
        let (app_tx, app_rx) = tokio::sync::mpsc::unbounded_channel();

        let bind_addr = cfg
            .bind_addr()
            .parse()
            .with_context(|| format!("bad listen address {}", cfg.bind_addr()))?;
        let transport = TcpTransport::new(bind_addr, transport_tx);
        let mut app = App::new(transport, cfg.download_dir());
        let local_id = app.start().await?;
        info!(identifier = %local_id, "session started; share this identifier with peers");

        // Transport lifecycle events feed the same single-consumer channel
        // as user intents.
        let forward_tx = app_tx.clone();
        tokio::spawn(async move {
            while let Some(ev) = transport_rx.recv().await {
                if forward_tx.send(AppEvent::Transport(ev)).is_err() {
                    break;
                }
            }
        });

        if !staged.is_empty() {
            let _ = app_tx.send(AppEvent::Intent(UserIntent::SetFiles(staged.clone())));
        }

        // Deep-link bootstrap: dial the configured peer once the session has
        // settled; if files were staged on the command line, broadcast them
        // to the (auto-selected) peer shortly after.
        if let Some(peer) = cfg.connect.clone() {
            let boot_tx = app_tx.clone();
            let auto_send = !staged.is_empty();
            tokio::spawn(async move {
                tokio::time::sleep(SETTLE_DELAY).await;
                let _ = boot_tx.send(AppEvent::Intent(UserIntent::DiscoverPeer(peer)));
                if auto_send {
                    tokio::time::sleep(TRIGGER_DELAY).await;
                    let _ = boot_tx.send(AppEvent::Intent(UserIntent::TriggerBroadcast));
                }
            });
        } else if !staged.is_empty() {
            warn!("files staged but no peer configured to connect to; waiting for inbound peers");
        }

        tokio::spawn(app.run(app_rx));
        shutdown_signal().await
    })
}

/// Read command-line file arguments into staged blobs.
fn stage_files(paths: &[String]) -> anyhow::Result<Vec<FileBlob>> {
    let mut out = Vec::with_capacity(paths.len());
    for p in paths {
        let bytes = std::fs::read(p).with_context(|| format!("cannot read {}", p))?;
        let name = std::path::Path::new(p)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.clone());
        out.push(FileBlob::new(name, "application/octet-stream", bytes));
    }
    Ok(out)
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
