//! Supervisor - one-time controller startup
//!
//! Allocates the frame buffers, draws the first roll, brings the radio up,
//! starts the phase controller and receiver in four-way stop, and finally
//! starts the sender after a random delay so two controllers powered up
//! together do not transmit in lockstep.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crossroad_core::{CrossroadResult, LightPanel, NodeSnapshot, NodeState, Payload, Roll};
use crossroad_transport::Radio;
use crossroad_wire::{Frame, FrameBuf, FRAME_SIZE};

use crate::phase::run_phase_controller;
use crate::receiver::run_receiver;
use crate::sender::run_sender;
use crate::{ControllerConfig, RuntimeStats, Shared};

/// Handle to a running controller
pub struct Controller {
    label: String,
    shared: Arc<Shared>,
    tasks: Vec<JoinHandle<()>>,
}

impl Controller {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        self.shared.snapshot()
    }

    pub fn stats(&self) -> RuntimeStats {
        self.shared.stats()
    }

    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Stop every machine
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.shared.abort_override();
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bring a controller up on `radio`, driving `panel`
///
/// Fails only before any machine has started: buffer allocation, radio
/// configuration, or opening the link.
pub async fn start<R: Radio>(
    config: ControllerConfig,
    mut radio: R,
    panel: Box<dyn LightPanel>,
) -> CrossroadResult<Controller> {
    let span = tracing::info_span!("controller", node = %config.label);

    let (inbound, mut outbound) = allocate_buffers().map_err(|e| {
        tracing::error!(parent: &span, "buffer allocation failed: {}", e);
        e
    })?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let roll = config.initial_roll.unwrap_or_else(|| Roll::random(&mut rng));
    let node = NodeState::new(roll);
    outbound.load(&Frame::tagged(Payload::roll(roll)).serialize()?);

    radio.configure(&config.radio).map_err(|e| {
        tracing::error!(parent: &span, "radio configuration failed: {}", e);
        e
    })?;
    radio.enable_tx();
    radio.enable_rx();
    let link = Arc::new(radio.open().await.map_err(|e| {
        tracing::error!(parent: &span, "link open failed: {}", e);
        e
    })?);

    tracing::info!(parent: &span, %roll, "controller starting");

    let shared = Arc::new(Shared::new(node, panel, config.timing.clone()));
    let mut tasks = Vec::with_capacity(3);

    tasks.push(tokio::spawn(
        run_phase_controller(Arc::clone(&shared))
            .instrument(tracing::info_span!(parent: &span, "phase")),
    ));

    let receiver_rng = StdRng::seed_from_u64(rng.gen());
    tasks.push(tokio::spawn(
        run_receiver(Arc::clone(&shared), Arc::clone(&link), inbound, receiver_rng)
            .instrument(tracing::info_span!(parent: &span, "receiver")),
    ));

    // Four-way stop until the peer is heard
    shared.update(|core| core.node.disconnected = true);

    let jitter = startup_jitter(&mut rng, config.timing.startup_jitter);
    let sender_shared = Arc::clone(&shared);
    tasks.push(tokio::spawn(
        async move {
            tokio::time::sleep(jitter).await;
            tracing::debug!(?jitter, "sender starting");
            run_sender(sender_shared, link, outbound).await;
        }
        .instrument(tracing::info_span!(parent: &span, "sender")),
    ));

    Ok(Controller {
        label: config.label,
        shared,
        tasks,
    })
}

fn allocate_buffers() -> CrossroadResult<(FrameBuf, FrameBuf)> {
    let inbound = FrameBuf::allocate(FRAME_SIZE)?;
    let outbound = FrameBuf::allocate(FRAME_SIZE)?;
    Ok((inbound, outbound))
}

/// Random delay in `[0, bound)`
fn startup_jitter<R: Rng>(rng: &mut R, bound: Duration) -> Duration {
    if bound.is_zero() {
        return Duration::ZERO;
    }
    let millis = u64::try_from(bound.as_millis()).unwrap_or(u64::MAX).max(1);
    Duration::from_millis(rng.gen_range(0..millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SharedLamps;
    use crossroad_core::{CrossroadError, Role};
    use crossroad_transport::{MemoryRadio, RadioConfig, MAX_POWER};

    #[tokio::test(start_paused = true)]
    async fn test_start_in_four_way_stop() {
        let (radio, _peer) = MemoryRadio::pair(8);
        let lamps = SharedLamps::new();
        let config = ControllerConfig::simulated("solo", 1);

        let controller = start(config, radio, Box::new(lamps.clone())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshot = controller.snapshot();
        assert!(snapshot.disconnected);
        assert_eq!(snapshot.role, Role::Listener);
        assert!(lamps.is_four_way_stop());
        assert_eq!(snapshot.outbound, Payload::roll(snapshot.roll));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pinned_roll() {
        let (radio, _peer) = MemoryRadio::pair(8);
        let roll = Roll::new(77).unwrap();
        let config = ControllerConfig::simulated("pinned", 1).with_initial_roll(roll);

        let controller = start(config, radio, Box::new(SharedLamps::new())).await.unwrap();
        assert_eq!(controller.snapshot().roll, roll);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_radio_config_is_fatal() {
        let (radio, _peer) = MemoryRadio::pair(8);
        let mut config = ControllerConfig::simulated("bad", 1);
        config.radio = RadioConfig {
            power: MAX_POWER + 1,
            ..Default::default()
        };

        let result = start(config, radio, Box::new(SharedLamps::new())).await;
        assert!(matches!(result, Err(CrossroadError::RadioConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_send_within_jitter_bound() {
        let (radio, mut peer) = MemoryRadio::pair(8);
        peer.enable_rx();
        let peer = peer.open().await.unwrap();
        let config = ControllerConfig::simulated("jitter", 9);
        let bound = config.timing.startup_jitter + config.timing.send_interval;

        let start_at = tokio::time::Instant::now();
        let _controller = start(config, radio, Box::new(SharedLamps::new())).await.unwrap();

        let mut buf = [0u8; FRAME_SIZE];
        crossroad_transport::Link::recv_frame(&peer, &mut buf).await.unwrap();
        assert!(start_at.elapsed() <= bound);
    }

    #[test]
    fn test_jitter_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let bound = Duration::from_secs(2);
        for _ in 0..1000 {
            assert!(startup_jitter(&mut rng, bound) < bound);
        }
        assert_eq!(startup_jitter(&mut rng, Duration::ZERO), Duration::ZERO);
    }
}
