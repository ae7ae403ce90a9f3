//! Check-in kiosk - headless runtime
//!
//! Reads guest QR codes from a serial scanner, validates them and keeps the
//! capture feed healthy with periodic forced refreshes.
//!
//! Module structure:
//! - `domain/` - Guest identifiers, capture devices, capture errors
//! - `io/` - External interfaces (capture hosts, analytics sinks)
//! - `services/` - Session logic (CameraSession, CheckinSession, Kiosk)
//! - `infra/` - Infrastructure (Config, Metrics, StateStore)
//!
//! Commands on stdin: `r` start over, `c` switch camera, `s <device>` select,
//! `d` dismiss notice, `q` quit. Any other line is handled as a typed code.

use checkin_kiosk::domain::DeviceId;
use checkin_kiosk::infra::{Config, Metrics, StateStore};
use checkin_kiosk::io::{create_analytics_channel, AnalyticsPublisher, SerialScannerHost};
use checkin_kiosk::services::{Kiosk, KioskCommand, KioskView};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Check-in kiosk - guest QR scanning station
#[derive(Parser, Debug)]
#[command(name = "checkin-kiosk", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE or config/kiosk.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Default: INFO, use RUST_LOG=debug for every status transition
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = env!("GIT_HASH"), "checkin-kiosk starting");

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(|| Config::resolve_config_path(&[]));
    let config = Config::load_from_path(&config_path);

    info!(
        config_file = %config.config_file(),
        site_id = %config.site_id(),
        platform = %config.platform().resolve().as_str(),
        refresh_interval_secs = config.refresh_interval().as_secs(),
        store_path = %config.store_path(),
        analytics = config.analytics_enabled(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());
    let store = StateStore::file(config.store_path());

    // Analytics channel and publisher (if enabled)
    let analytics = if config.analytics_enabled() {
        let (sender, rx) = create_analytics_channel(
            config.analytics_buffer_size(),
            config.site_id().to_string(),
            metrics.clone(),
        );
        let publisher = AnalyticsPublisher::new(&config, rx);
        let publisher_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            publisher.run(publisher_shutdown).await;
        });
        Some(sender)
    } else {
        None
    };

    // Metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    let host = Arc::new(SerialScannerHost::new(&config));
    let kiosk = Kiosk::new(&config, host, store, analytics, metrics);

    // Log view changes so a headless operator can follow along
    let mut view_rx = kiosk.subscribe();
    tokio::spawn(async move {
        let mut last = KioskView::default();
        while view_rx.changed().await.is_ok() {
            let view = view_rx.borrow_and_update().clone();
            log_view_change(&last, &view);
            last = view;
        }
    });

    let (command_tx, command_rx) = mpsc::channel(32);
    let kiosk_handle = tokio::spawn(kiosk.run(command_rx, shutdown_rx));

    // Stdin commands
    let stdin_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            let command = match line {
                "" => continue,
                "q" => {
                    let _ = stdin_shutdown.send(true);
                    break;
                }
                "r" => KioskCommand::Reset,
                "c" => KioskCommand::CycleCamera,
                "d" => KioskCommand::DismissNotice,
                "x" => KioskCommand::ClosePicker,
                _ => match line.strip_prefix("s ") {
                    Some(device) => KioskCommand::SelectDevice(DeviceId::new(device.trim())),
                    None => KioskCommand::ManualEntry(line.to_string()),
                },
            };
            if command_tx.send(command).await.is_err() {
                break;
            }
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    kiosk_handle.await?;

    info!("checkin-kiosk shutdown complete");
    Ok(())
}

fn log_view_change(last: &KioskView, view: &KioskView) {
    if last.session != view.session || last.pass != view.pass {
        match &view.pass {
            Some(pass) => info!(guest_id = %pass.guest_id, display = %pass.display, "pass_displayed"),
            None => info!(session = %view.session.as_str(), "session_view"),
        }
    }
    if view.invalid && !last.invalid {
        info!("invalid_code_hint_shown");
    }
    if view.notice != last.notice {
        if let Some(notice) = &view.notice {
            info!(kind = %notice.kind.as_str(), message = %notice.message, "capture_notice_shown");
        }
    }
    if view.picker_open && !last.picker_open {
        let devices: Vec<String> =
            view.devices.iter().map(|d| format!("{} ({})", d.label, d.device_id)).collect();
        info!(devices = ?devices, "device_picker_opened");
    }
}
