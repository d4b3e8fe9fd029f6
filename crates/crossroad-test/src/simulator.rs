//! Intersection simulator
//!
//! Two controllers, north and east, each on an in-memory radio. Every frame
//! one controller transmits crosses a `ChaosAir` relay before the other
//! hears it. The harness can cut the air entirely, inject emergency
//! beacons, and sample what both approaches show.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crossroad_core::{Color, CrossroadResult, Light, LightMode, NodeSnapshot, Roll};
use crossroad_runtime::{start, Controller, ControllerConfig, SharedLamps};
use crossroad_transport::{FrameReceiver, FrameSender, MemoryRadio};
use crossroad_wire::Frame;

use crate::chaos::{ChaosAir, ChaosConfig, ChaosStats};

/// Frames buffered per direction before the air starts dropping them
const AIR_CAPACITY: usize = 64;

/// One side of the crossroad
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Approach {
    North,
    East,
}

impl Approach {
    pub const BOTH: [Approach; 2] = [Approach::North, Approach::East];
}

/// Intersection configuration
#[derive(Clone, Debug)]
pub struct IntersectionConfig {
    pub north: ControllerConfig,
    pub east: ControllerConfig,
    /// Air conditions, applied in both directions
    pub chaos: ChaosConfig,
    /// Seed for the air
    pub seed: u64,
}

impl IntersectionConfig {
    /// Fast timers on clean air, every RNG derived from `seed`
    pub fn new(seed: u64) -> Self {
        IntersectionConfig {
            north: ControllerConfig::simulated("north", seed),
            east: ControllerConfig::simulated("east", seed.wrapping_add(1)),
            chaos: ChaosConfig::clean(),
            seed,
        }
    }

    pub fn with_chaos(mut self, chaos: ChaosConfig) -> Self {
        self.chaos = chaos;
        self
    }

    /// Pin both first rolls
    pub fn with_rolls(mut self, north: Roll, east: Roll) -> Self {
        self.north.initial_roll = Some(north);
        self.east.initial_roll = Some(east);
        self
    }
}

/// What was seen while observing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    pub samples: u64,
    /// Samples where both approaches were green
    pub both_green: u64,
    pub north_green: u64,
    pub east_green: u64,
    /// Samples where both approaches blinked red
    pub four_way_stop: u64,
    /// Times green moved from one approach to the other
    pub handovers: u64,
}

/// Two controllers sharing one crossroad
pub struct Intersection {
    north: Controller,
    east: Controller,
    north_lamps: SharedLamps,
    east_lamps: SharedLamps,
    /// Injection points straight into each controller's receiver
    to_north: FrameSender,
    to_east: FrameSender,
    severed: Arc<AtomicBool>,
    air_stats: [Arc<Mutex<ChaosStats>>; 2],
    relays: Vec<JoinHandle<()>>,
}

impl Intersection {
    /// Start both controllers and the air between them
    pub async fn start(config: IntersectionConfig) -> CrossroadResult<Self> {
        let (north_out, north_air) = mpsc::channel(AIR_CAPACITY);
        let (east_out, east_air) = mpsc::channel(AIR_CAPACITY);
        let (to_north, north_in) = mpsc::channel(AIR_CAPACITY);
        let (to_east, east_in) = mpsc::channel(AIR_CAPACITY);

        let severed = Arc::new(AtomicBool::new(false));
        let air_stats = [
            Arc::new(Mutex::new(ChaosStats::default())),
            Arc::new(Mutex::new(ChaosStats::default())),
        ];

        let relays = vec![
            tokio::spawn(relay(
                north_air,
                to_east.clone(),
                ChaosAir::new(config.chaos.clone(), config.seed),
                Arc::clone(&severed),
                Arc::clone(&air_stats[0]),
            )),
            tokio::spawn(relay(
                east_air,
                to_north.clone(),
                ChaosAir::new(config.chaos.clone(), config.seed.wrapping_add(1)),
                Arc::clone(&severed),
                Arc::clone(&air_stats[1]),
            )),
        ];

        let north_lamps = SharedLamps::new();
        let east_lamps = SharedLamps::new();
        let north = start(
            config.north,
            MemoryRadio::new(north_out, north_in),
            Box::new(north_lamps.clone()),
        )
        .await?;
        let east = start(
            config.east,
            MemoryRadio::new(east_out, east_in),
            Box::new(east_lamps.clone()),
        )
        .await?;

        Ok(Intersection {
            north,
            east,
            north_lamps,
            east_lamps,
            to_north,
            to_east,
            severed,
            air_stats,
            relays,
        })
    }

    pub fn controller(&self, approach: Approach) -> &Controller {
        match approach {
            Approach::North => &self.north,
            Approach::East => &self.east,
        }
    }

    pub fn lamps(&self, approach: Approach) -> &SharedLamps {
        match approach {
            Approach::North => &self.north_lamps,
            Approach::East => &self.east_lamps,
        }
    }

    pub fn snapshot(&self, approach: Approach) -> NodeSnapshot {
        self.controller(approach).snapshot()
    }

    /// Approach currently holding green, if exactly one does
    pub fn green_approach(&self) -> Option<Approach> {
        match (self.shows_green(Approach::North), self.shows_green(Approach::East)) {
            (true, false) => Some(Approach::North),
            (false, true) => Some(Approach::East),
            _ => None,
        }
    }

    /// Green in the node state or on the lamps
    pub fn shows_green(&self, approach: Approach) -> bool {
        self.snapshot(approach).light == Light::Green
            || self.lamps(approach).mode(Color::Green) == LightMode::On
    }

    /// Stop all traffic on the air
    pub fn sever(&self) {
        tracing::info!("air severed");
        self.severed.store(true, Ordering::SeqCst);
    }

    pub fn restore(&self) {
        tracing::info!("air restored");
        self.severed.store(false, Ordering::SeqCst);
    }

    /// Air statistics, north-to-east then east-to-north
    pub fn air_stats(&self) -> [ChaosStats; 2] {
        [self.air_stats[0].lock().clone(), self.air_stats[1].lock().clone()]
    }

    /// Deliver one emergency beacon to `approach`
    pub fn beacon(&self, approach: Approach) {
        let target = match approach {
            Approach::North => &self.to_north,
            Approach::East => &self.to_east,
        };
        match Frame::beacon().serialize() {
            Ok(bytes) => {
                let _ = target.try_send(bytes.to_vec());
            }
            Err(e) => tracing::error!("beacon encoding failed: {}", e),
        }
    }

    /// An emergency vehicle passes: both controllers hear its beacon every
    /// `every` for `duration`
    pub fn emergency_vehicle(&self, duration: Duration, every: Duration) -> JoinHandle<()> {
        let targets = [self.to_north.clone(), self.to_east.clone()];
        tokio::spawn(async move {
            let beacon = match Frame::beacon().serialize() {
                Ok(bytes) => bytes.to_vec(),
                Err(e) => {
                    tracing::error!("beacon encoding failed: {}", e);
                    return;
                }
            };
            let until = Instant::now() + duration;
            while Instant::now() < until {
                for target in &targets {
                    let _ = target.try_send(beacon.clone());
                }
                tokio::time::sleep(every).await;
            }
        })
    }

    /// Sample both approaches every `every` for `duration`
    pub async fn observe(&self, duration: Duration, every: Duration) -> Observation {
        let mut seen = Observation::default();
        let mut last_green = None;
        let until = Instant::now() + duration;

        while Instant::now() < until {
            tokio::time::sleep(every).await;
            seen.samples += 1;

            let north = self.shows_green(Approach::North);
            let east = self.shows_green(Approach::East);
            if north && east {
                seen.both_green += 1;
                tracing::error!("both approaches green");
            }
            if north {
                seen.north_green += 1;
            }
            if east {
                seen.east_green += 1;
            }
            if self.north_lamps.is_four_way_stop() && self.east_lamps.is_four_way_stop() {
                seen.four_way_stop += 1;
            }

            if let Some(green) = self.green_approach() {
                if last_green.is_some_and(|last| last != green) {
                    seen.handovers += 1;
                }
                last_green = Some(green);
            }
        }
        seen
    }

    /// Wait until `approach` holds green with at least `left` of it to run
    ///
    /// Returns false if that did not happen within `within`.
    pub async fn wait_for_green(&self, approach: Approach, left: Duration, within: Duration) -> bool {
        let until = Instant::now() + within;
        while Instant::now() < until {
            let shared = self.controller(approach).shared();
            if self.green_approach() == Some(approach)
                && shared.green_left().is_some_and(|remaining| remaining >= left)
            {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    /// Wait until either approach holds green
    pub async fn wait_for_any_green(&self, within: Duration) -> Option<Approach> {
        let until = Instant::now() + within;
        while Instant::now() < until {
            if let Some(green) = self.green_approach() {
                return Some(green);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }
}

impl Drop for Intersection {
    fn drop(&mut self) {
        for relay in self.relays.drain(..) {
            relay.abort();
        }
    }
}

/// Carry frames from one controller's transmitter across the air
async fn relay(
    mut from: FrameReceiver,
    to: FrameSender,
    mut air: ChaosAir,
    severed: Arc<AtomicBool>,
    stats: Arc<Mutex<ChaosStats>>,
) {
    // Fixed flight time: one courier delivers strictly in order
    let (courier_tx, courier_rx) = mpsc::unbounded_channel();
    tokio::spawn(courier(courier_rx, to.clone()));
    let in_order = air.config().preserves_order();

    while let Some(frame) = from.recv().await {
        if severed.load(Ordering::SeqCst) {
            continue;
        }
        for delay in air.transmit() {
            let at = Instant::now() + delay;
            if in_order {
                let _ = courier_tx.send((at, frame.clone()));
            } else {
                let to = to.clone();
                let frame = frame.clone();
                tokio::spawn(async move {
                    tokio::time::sleep_until(at).await;
                    let _ = to.try_send(frame);
                });
            }
        }
        *stats.lock() = air.stats().clone();
    }
}

/// Deliver queued frames at their arrival times; ends with the relay
async fn courier(mut queue: mpsc::UnboundedReceiver<(Instant, Vec<u8>)>, to: FrameSender) {
    while let Some((at, frame)) = queue.recv().await {
        tokio::time::sleep_until(at).await;
        let _ = to.try_send(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: Duration = Duration::from_millis(10);

    fn roll(value: u8) -> Roll {
        Roll::new(value).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_air_alternates_green() {
        let crossroad = Intersection::start(IntersectionConfig::new(11)).await.unwrap();

        let seen = crossroad.observe(Duration::from_secs(6), SAMPLE).await;

        assert_eq!(seen.both_green, 0);
        assert!(seen.north_green > 0);
        assert!(seen.east_green > 0);
        assert!(seen.handovers >= 2);
        for approach in Approach::BOTH {
            assert!(!crossroad.snapshot(approach).disconnected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_higher_roll_gets_green_first() {
        let config = IntersectionConfig::new(3).with_rolls(roll(45), roll(67));
        let crossroad = Intersection::start(config).await.unwrap();

        let first = crossroad.wait_for_any_green(Duration::from_secs(2)).await;
        assert_eq!(first, Some(Approach::East));

        let north = crossroad.snapshot(Approach::North);
        assert_eq!(north.light, Light::Red);
        assert_eq!(north.outbound, crossroad_core::Payload::Green);
        let east = crossroad.snapshot(Approach::East);
        assert_eq!(east.role, crossroad_core::Role::Boss);
        assert_eq!(east.outbound, crossroad_core::Payload::Red);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tied_rolls_are_broken() {
        let config = IntersectionConfig::new(21).with_rolls(roll(50), roll(50));
        let crossroad = Intersection::start(config).await.unwrap();

        let first = crossroad.wait_for_any_green(Duration::from_secs(3)).await;
        assert!(first.is_some());

        let rerolls: u64 = Approach::BOTH
            .iter()
            .map(|a| crossroad.controller(*a).stats().rerolls)
            .sum();
        assert!(rerolls >= 1);

        let seen = crossroad.observe(Duration::from_secs(3), SAMPLE).await;
        assert_eq!(seen.both_green, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_air_falls_back_to_four_way_stop() {
        let crossroad = Intersection::start(IntersectionConfig::new(5)).await.unwrap();
        let timing = crossroad.controller(Approach::North).shared().timing().clone();

        let boss = crossroad.wait_for_any_green(Duration::from_secs(2)).await.unwrap();
        assert!(
            crossroad
                .wait_for_green(boss, Duration::from_millis(500), Duration::from_secs(3))
                .await
        );

        crossroad.sever();
        tokio::time::sleep(timing.heartbeat * 2).await;

        for approach in Approach::BOTH {
            assert!(crossroad.snapshot(approach).disconnected);
            assert!(crossroad.lamps(approach).is_four_way_stop());
            assert!(!crossroad.shows_green(approach));
        }
        let timeouts: u64 = Approach::BOTH
            .iter()
            .map(|a| crossroad.controller(*a).stats().heartbeat_timeouts)
            .sum();
        assert!(timeouts >= 2);

        crossroad.restore();
        // The interrupted boss resumes its partial green
        assert_eq!(
            crossroad.wait_for_any_green(Duration::from_secs(1)).await,
            Some(boss)
        );
        let seen = crossroad.observe(Duration::from_secs(3), SAMPLE).await;
        assert_eq!(seen.both_green, 0);
        assert!(seen.handovers >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_preempts_and_restores() {
        let crossroad = Intersection::start(IntersectionConfig::new(8)).await.unwrap();
        let timing = crossroad.controller(Approach::North).shared().timing().clone();

        let boss = crossroad.wait_for_any_green(Duration::from_secs(2)).await.unwrap();
        assert!(
            crossroad
                .wait_for_green(boss, Duration::from_millis(600), Duration::from_secs(3))
                .await
        );
        let before: Vec<_> = Approach::BOTH
            .iter()
            .map(|a| crossroad.snapshot(*a).outbound)
            .collect();

        let vehicle = crossroad.emergency_vehicle(Duration::from_millis(300), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(150)).await;

        for approach in Approach::BOTH {
            let snapshot = crossroad.snapshot(approach);
            assert!(snapshot.sos_mode);
            assert!(snapshot.disconnected);
            assert_eq!(snapshot.outbound, crossroad_core::Payload::Sos);
            assert!(crossroad.lamps(approach).is_four_way_stop());
        }

        vehicle.await.unwrap();
        tokio::time::sleep(timing.sos_silence * 2).await;

        for (approach, outbound) in Approach::BOTH.iter().zip(before) {
            let snapshot = crossroad.snapshot(*approach);
            assert!(!snapshot.sos_mode);
            assert_eq!(snapshot.outbound, outbound);
            assert_eq!(crossroad.controller(*approach).stats().emergencies, 1);
        }

        // Negotiation picks up where it left off
        assert_eq!(
            crossroad.wait_for_any_green(Duration::from_secs(1)).await,
            Some(boss)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_beacon_is_relayed() {
        let crossroad = Intersection::start(IntersectionConfig::new(13)).await.unwrap();
        crossroad.wait_for_any_green(Duration::from_secs(2)).await.unwrap();

        crossroad.beacon(Approach::North);
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(crossroad.snapshot(Approach::North).sos_mode);
        // East only hears the tagged relay, which is not a beacon
        assert!(!crossroad.snapshot(Approach::East).sos_mode);
        assert_eq!(crossroad.controller(Approach::East).stats().emergencies, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_noisy_air_keeps_exclusion() {
        let config = IntersectionConfig::new(17).with_chaos(ChaosConfig::noisy());
        let crossroad = Intersection::start(config).await.unwrap();

        let seen = crossroad.observe(Duration::from_secs(8), SAMPLE).await;

        assert_eq!(seen.both_green, 0);
        assert!(seen.north_green > 0);
        assert!(seen.east_green > 0);
        let [north_to_east, east_to_north] = crossroad.air_stats();
        assert!(north_to_east.frames_sent > 0);
        assert!(east_to_north.frames_sent > 0);
    }
}
