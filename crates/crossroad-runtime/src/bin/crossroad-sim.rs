//! Two controllers at one crossroad, simulated in-process
//!
//! The pair negotiates, alternates green, and at the midpoint an emergency
//! vehicle passes and beacons both controllers into four-way stop.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crossroad_core::{CrossroadResult, Light};
use crossroad_runtime::{start, Controller, ControllerConfig, SharedLamps};
use crossroad_transport::MemoryRadio;
use crossroad_wire::Frame;

const RUN_TIME: Duration = Duration::from_secs(12);
const SAMPLE: Duration = Duration::from_millis(250);
const BEACON_AT: Duration = Duration::from_secs(5);
const BEACON_FOR: Duration = Duration::from_secs(1);
const BEACON_EVERY: Duration = Duration::from_millis(20);

#[tokio::main]
async fn main() -> CrossroadResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (north_tx, east_rx) = mpsc::channel(64);
    let (east_tx, north_rx) = mpsc::channel(64);
    let to_north = east_tx.clone();
    let to_east = north_tx.clone();

    let north = start(
        ControllerConfig::simulated("north", rand::random()),
        MemoryRadio::new(north_tx, north_rx),
        Box::new(SharedLamps::new()),
    )
    .await?;
    let east = start(
        ControllerConfig::simulated("east", rand::random()),
        MemoryRadio::new(east_tx, east_rx),
        Box::new(SharedLamps::new()),
    )
    .await?;

    tokio::spawn(async move {
        tokio::time::sleep(BEACON_AT).await;
        tracing::warn!("emergency vehicle approaching");
        let beacon = match Frame::beacon().serialize() {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                tracing::error!("beacon encoding failed: {}", e);
                return;
            }
        };
        let until = tokio::time::Instant::now() + BEACON_FOR;
        while tokio::time::Instant::now() < until {
            let _ = to_north.try_send(beacon.clone());
            let _ = to_east.try_send(beacon.clone());
            tokio::time::sleep(BEACON_EVERY).await;
        }
        tracing::warn!("emergency vehicle gone");
    });

    let mut both_green = 0u32;
    let started = tokio::time::Instant::now();
    while started.elapsed() < RUN_TIME {
        tokio::time::sleep(SAMPLE).await;
        report(&north);
        report(&east);
        if north.snapshot().light == Light::Green && east.snapshot().light == Light::Green {
            both_green += 1;
        }
    }

    tracing::info!(both_green, north = ?north.stats(), east = ?east.stats(), "simulation finished");
    Ok(())
}

fn report(controller: &Controller) {
    let s = controller.snapshot();
    tracing::info!(
        node = controller.label(),
        role = %s.role,
        light = %s.light,
        roll = %s.roll,
        disconnected = s.disconnected,
        sos = s.sos_mode,
        outbound = %s.outbound,
        "state"
    );
}
