//! Live bridge monitor.
//!
//! Demonstrates:
//! - Resolving the bridge URL from the environment
//! - Subscribing to decoded events
//! - Reading the device store
//! - Flashing every connected device once
//!
//! Usage:
//!   cargo run --example monitor
//!   cargo run --example monitor -- --debug
//!   cargo run --example monitor -- --no-wait
//!   COSMO_WS_URL=ws://192.168.1.20:8080 cargo run --example monitor

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::Context;
use cosmo_bridge::protocol::MAX_LUMINOSITY;
use cosmo_bridge::{BridgeConfig, ClientEvent, ConnectionState, CosmoClient};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let debug = args.iter().any(|a| a == "--debug");
    let no_wait = args.iter().any(|a| a == "--no-wait");

    let filter = if debug { "cosmo_bridge=debug" } else { "cosmo_bridge=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    if let Err(e) = run(no_wait).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(no_wait: bool) -> anyhow::Result<()> {
    println!("=== Cosmo bridge monitor ===\n");

    let config = BridgeConfig::from_env();
    let client = CosmoClient::new(config).context("creating client")?;
    println!("[1] Bridge: {}", client.manager().url());

    let _listener = client.add_listener(|event: &ClientEvent| match event {
        ClientEvent::Bridge(message) => match message.device_id() {
            Some(device) => println!("    <- {} ({device})", message.kind()),
            None => println!("    <- {}", message.kind()),
        },
        ClientEvent::Error(err) => println!("    !! {}", err.error),
        other => println!("    -- {}", other.kind()),
    });

    client.connect();

    println!("[2] Waiting for connection...");
    let mut states = client.subscribe_state();
    tokio::time::timeout(
        Duration::from_secs(10),
        states.wait_for(|state| *state == ConnectionState::Connected),
    )
    .await
    .context("bridge did not answer within 10s")?
    .context("client dropped")?;

    sleep(Duration::from_millis(500)).await;

    println!("[3] Devices:");
    for device in client.devices() {
        let battery = device
            .battery_level
            .map_or_else(|| "?".to_string(), |level| format!("{level}%"));
        println!(
            "    {:<12} {:<10} button={} battery={battery}",
            device.id, device.status, device.button_state
        );
    }

    println!("[4] Flashing connected devices...");
    for device in client.devices().into_iter().filter(|d| d.connected) {
        client.set_color(device.id.clone(), 0, 4, 0);
        client.set_luminosity(device.id, MAX_LUMINOSITY);
    }

    if no_wait {
        println!("[--no-wait] Skipping wait");
    } else {
        println!("\nPress Ctrl+C to exit...");
        tokio::signal::ctrl_c().await.ok();
    }

    client.disconnect(true);
    println!("\n=== Done ===");
    Ok(())
}
