//! Phase controller - this node's own light cycle
//!
//! ```text
//! Idle --green_on--> CountingDownGreen --timer--> AllRed --delay--> AnnounceGreen --> Idle
//!   \________________________ disconnected __________________________> Pause --reconnected--> Idle
//! ```

use std::sync::Arc;

use tokio::time::Instant;

use crossroad_core::{Light, Payload, Role};

use crate::Shared;

/// Phase of the light cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No light of our own; waiting to be given green or to lose the peer
    Idle,
    /// Showing green while the green timer runs
    CountingDownGreen,
    /// Red on both approaches before handing over
    AllRed,
    /// Tell the peer it may go green
    AnnounceGreen,
    /// Four-way stop until the peer is heard again
    Pause,
}

/// Run the light cycle forever
pub async fn run_phase_controller(shared: Arc<Shared>) {
    let mut phase = Phase::Idle;
    loop {
        let next = step(&shared, phase).await;
        if next != phase {
            tracing::debug!(from = ?phase, to = ?next, "phase");
        }
        phase = next;
    }
}

/// Execute one phase and return the next
pub async fn step(shared: &Shared, phase: Phase) -> Phase {
    let timing = shared.timing().clone();

    match phase {
        Phase::Idle => {
            shared.update(|core| core.node.green_on = false);
            tokio::select! {
                biased;
                _ = shared.disconnected.wait(true) => Phase::Pause,
                _ = shared.green_on.wait(true) => Phase::CountingDownGreen,
            }
        }

        Phase::CountingDownGreen => {
            let green = shared.update(|core| {
                core.node.light = Light::Green;
                core.node.green_time(timing.green_duration)
            });
            let deadline = Instant::now() + green;
            shared.set_green_deadline(Some(deadline));

            let next = tokio::select! {
                biased;
                _ = shared.disconnected.wait(true) => Phase::Pause,
                _ = tokio::time::sleep_until(deadline) => Phase::AllRed,
            };
            shared.set_green_deadline(None);
            next
        }

        Phase::AllRed => {
            shared.update(|core| {
                core.node.role = Role::Listener;
                core.node.light = Light::Red;
                core.node.handing_over = true;
                core.panel.show(Light::Red);
            });
            tracing::info!("green over, all red");

            tokio::select! {
                biased;
                _ = shared.disconnected.wait(true) => Phase::Pause,
                _ = tokio::time::sleep(timing.all_red) => Phase::AnnounceGreen,
            }
        }

        Phase::AnnounceGreen => {
            shared.update(|core| {
                // The emergency owns the outbound payload until it ends
                if !core.node.sos_mode {
                    core.node.outbound = Payload::Green;
                }
                core.node.resume_timer = Some(timing.green_duration);
            });
            shared.send_now();
            Phase::Idle
        }

        Phase::Pause => {
            shared.update(|core| {
                core.panel.four_way_stop();
                core.node.light = Light::Unset;
                core.node.role = Role::Listener;
                // An announced handover survives the outage; an unannounced one is void
                let announced = core.node.saved_outbound.as_ref().unwrap_or(&core.node.outbound)
                    == &Payload::Green;
                if !announced {
                    core.node.handing_over = false;
                }
            });
            shared.disconnected.wait(false).await;
            Phase::Idle
        }
    }
}
