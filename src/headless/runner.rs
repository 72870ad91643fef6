//! Headless mode runner - bridge loop and one-shot image scans

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use qrscan_app::{MethodCall, ScanSettings, ViewRegistry};
use qrscan_core::prelude::*;
use qrscan_core::HostEvent;
use qrscan_device::{gallery, StillImageCamera, SystemPermissions};

use super::HeadlessEvent;

/// Options of the `bridge` subcommand
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Image played back as the camera preview
    pub feed: PathBuf,
    pub fps: u32,
    pub view_id: i32,
}

/// One stdin line: a method call plus the id its response should echo
#[derive(Debug, Deserialize)]
struct InboundCall {
    #[serde(default)]
    id: Value,
    #[serde(flatten)]
    call: MethodCall,
}

/// Run a single view against a still-image camera until stdin closes
pub async fn run_bridge(settings: &ScanSettings, options: BridgeOptions) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("qrscan starting in BRIDGE mode");
    info!("Feed: {}", options.feed.display());
    info!("═══════════════════════════════════════════════════════");

    let preview = gallery::load_bitmap(&options.feed, 0)
        .with_context(|| format!("Failed to load camera feed {}", options.feed.display()))?;
    let camera = StillImageCamera::new(preview, options.fps);

    let registry = ViewRegistry::new(settings);
    let (bridge, mut events) = registry
        .create_view(
            options.view_id,
            1.0,
            Box::new(camera),
            Arc::new(SystemPermissions),
        )
        .context("Failed to create scan view")?;
    let bridge = Arc::new(bridge);

    let (call_tx, mut call_rx) = mpsc::channel::<InboundCall>(32);
    std::thread::spawn(move || {
        spawn_stdin_reader_blocking(call_tx);
    });

    HeadlessEvent::ready(options.view_id, settings.decoder.backend.as_str()).emit();

    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            inbound = call_rx.recv() => {
                let Some(InboundCall { id, call }) = inbound else {
                    info!("stdin closed");
                    break;
                };
                // Calls run concurrently so a pending permission prompt
                // doesn't block the rest of the host's traffic
                let bridge = Arc::clone(&bridge);
                in_flight.spawn(async move {
                    let response = bridge.handle(call).await;
                    HeadlessEvent::response(id, response).emit();
                });
            }
            Some(event) = events.recv() => {
                HeadlessEvent::callback(options.view_id, &event).emit();
            }
            Some(joined) = in_flight.join_next() => {
                if let Err(e) = joined {
                    error!("call task failed: {}", e);
                }
            }
        }
    }

    // Answer everything already accepted before tearing the view down
    drain_calls(&mut in_flight, &mut events, options.view_id).await;

    bridge.dispose().await;
    registry.dispose_all();

    // Callbacks queued before disposal still belong to the host
    while let Ok(event) = events.try_recv() {
        HeadlessEvent::callback(options.view_id, &event).emit();
    }
    HeadlessEvent::stopped().emit();

    info!("qrscan bridge exiting");
    Ok(())
}

/// Wait for in-flight calls, forwarding callbacks raised meanwhile
async fn drain_calls(
    in_flight: &mut JoinSet<()>,
    events: &mut mpsc::UnboundedReceiver<HostEvent>,
    view_id: i32,
) {
    while !in_flight.is_empty() {
        tokio::select! {
            Some(joined) = in_flight.join_next() => {
                if let Err(e) = joined {
                    error!("call task failed: {}", e);
                }
            }
            Some(event) = events.recv() => {
                HeadlessEvent::callback(view_id, &event).emit();
            }
        }
    }
}

/// Decode each image once and report its codes
pub async fn run_scan_images(settings: &ScanSettings, paths: &[PathBuf]) -> Result<usize> {
    let registry = ViewRegistry::new(settings);
    let scanner = registry.gallery();
    let mut failures = 0;

    for path in paths {
        match scanner.scan(path.clone()).await {
            Ok(results) => {
                let codes = results.into_iter().filter_map(|r| r.text).collect();
                HeadlessEvent::image_scanned(path, codes).emit();
            }
            Err(e) => {
                warn!("scan of {} failed: {}", path.display(), e);
                HeadlessEvent::image_failed(path, &e).emit();
                failures += 1;
            }
        }
    }

    Ok(failures)
}

/// Read NDJSON method calls from stdin (blocking version)
fn spawn_stdin_reader_blocking(call_tx: mpsc::Sender<InboundCall>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        match line {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match parse_inbound(trimmed) {
                    Ok(inbound) => {
                        if call_tx.blocking_send(inbound).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Unparseable stdin line: {}", e);
                        HeadlessEvent::error(format!("invalid call: {}", e), false).emit();
                    }
                }
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
}

fn parse_inbound(line: &str) -> Result<InboundCall> {
    Ok(serde_json::from_str(line)?)
}

/// Directory settings are resolved against
pub fn working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf())
}
