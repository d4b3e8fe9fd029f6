//! Receiver - the negotiation decision engine
//!
//! The receiver is the only machine that interprets inbound frames. The
//! decisions themselves are plain functions over `NodeState` so they can be
//! driven without a radio; `run_receiver` wraps them in the heartbeat loop.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tokio::time::Instant;

use crossroad_core::{Light, LightPanel, NodeState, Payload, Role, Roll, Timing};
use crossroad_transport::Link;
use crossroad_wire::{Frame, FrameBuf, Message};

use crate::emergency;
use crate::Shared;

/// What the receiver must do after a frame has been applied
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reaction {
    /// Frame counts as proof of life: restart the heartbeat window
    pub heartbeat: bool,
    /// Transmit the outbound payload immediately
    pub send_now: bool,
    /// `disconnected` was cleared by this frame
    pub reconnected: bool,
    /// `disconnected` was raised by this frame
    pub disconnected: bool,
    /// An emergency beacon was heard
    pub emergency: bool,
    /// The local roll was redrawn
    pub rerolled: bool,
}

/// Apply one decoded message to the node
///
/// `green_left` is the time remaining on a running green phase, used if the
/// message forces the node into four-way-stop.
pub fn apply_message<R: Rng + ?Sized>(
    state: &mut NodeState,
    message: &Message,
    timing: &Timing,
    rng: &mut R,
    panel: &mut dyn LightPanel,
    green_left: Option<Duration>,
) -> Reaction {
    match message {
        Message::Tagged(payload) => apply_payload(state, payload, timing, rng, panel),
        Message::Beacon => apply_beacon(state, timing, green_left),
        Message::Noise => Reaction::default(),
    }
}

fn apply_payload<R: Rng + ?Sized>(
    state: &mut NodeState,
    payload: &Payload,
    timing: &Timing,
    rng: &mut R,
    panel: &mut dyn LightPanel,
) -> Reaction {
    let mut reaction = Reaction {
        heartbeat: true,
        ..Default::default()
    };

    // Negotiation is frozen while an emergency is being relayed
    if !state.sos_mode {
        match payload {
            Payload::Green => {
                // A "green" heard while handing over predates our announcement
                if state.role != Role::Boss && !state.light.is_green() && !state.handing_over {
                    state.outbound = Payload::Red;
                    state.role = Role::Boss;
                    state.light = Light::Green;
                    panel.show(Light::Green);
                    tracing::info!("peer yielded, taking green");
                }
            }
            Payload::Red => {
                state.handing_over = false;
                let listening_off_red = state.role == Role::Listener && state.light != Light::Red;
                if listening_off_red || state.role == Role::Undetermined {
                    state.role = Role::Listener;
                    state.outbound = Payload::Green;
                    state.light = Light::Red;
                    panel.show(Light::Red);
                    tracing::info!("peer holds green, showing red");
                }
            }
            Payload::Roll(peer) => {
                // The peer is negotiating from scratch
                state.handing_over = false;
                apply_roll(state, *peer, rng, panel, &mut reaction);
            }
            Payload::Sos | Payload::Unrecognized => {}
        }

        if state.disconnected {
            state.disconnected = false;
            reaction.reconnected = true;
        }
    }

    if state.resume_timer.is_none() {
        state.resume_timer = Some(timing.green_duration);
    }

    if state.is_boss_at_green() {
        state.green_on = true;
    }

    reaction
}

fn apply_roll<R: Rng + ?Sized>(
    state: &mut NodeState,
    peer: i32,
    rng: &mut R,
    panel: &mut dyn LightPanel,
    reaction: &mut Reaction,
) {
    match state.roll.cmp_peer(peer) {
        Ordering::Equal => {
            state.roll = Roll::random(rng);
            state.outbound = Payload::roll(state.roll);
            reaction.send_now = true;
            reaction.rerolled = true;
            tracing::debug!(roll = %state.roll, "tie, re-rolled");
        }
        Ordering::Greater => {
            state.outbound = Payload::Red;
            tracing::debug!(mine = %state.roll, peer, "won roll");
        }
        Ordering::Less => {
            state.role = Role::Listener;
            state.light = Light::Red;
            panel.show(Light::Red);
            state.outbound = Payload::Green;
            state.green_on = false;
            tracing::debug!(mine = %state.roll, peer, "lost roll");
        }
    }
}

fn apply_beacon(state: &mut NodeState, timing: &Timing, green_left: Option<Duration>) -> Reaction {
    if !state.sos_mode {
        tracing::warn!("emergency beacon heard");
    }
    state.sos_mode = true;

    if state.saved_outbound.is_none() {
        state.saved_outbound = Some(state.outbound.clone());
    }
    state.outbound = Payload::Sos;

    Reaction {
        heartbeat: true,
        send_now: true,
        emergency: true,
        disconnected: mark_disconnected(state, timing, green_left),
        ..Default::default()
    }
}

/// The heartbeat window elapsed without a valid frame
///
/// Returns true if this newly marked the node disconnected.
pub fn on_heartbeat_timeout(
    state: &mut NodeState,
    timing: &Timing,
    green_left: Option<Duration>,
) -> bool {
    mark_disconnected(state, timing, green_left)
}

fn mark_disconnected(state: &mut NodeState, timing: &Timing, green_left: Option<Duration>) -> bool {
    if state.disconnected {
        return false;
    }
    state.resume_timer = Some(green_left.unwrap_or(timing.green_duration));
    state.disconnected = true;
    true
}

/// Pause after a failed receive before trying the link again
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Receive loop with heartbeat supervision
pub async fn run_receiver<L: Link>(
    shared: Arc<Shared>,
    link: Arc<L>,
    mut inbound: FrameBuf,
    mut rng: StdRng,
) {
    let timing = shared.timing().clone();
    let mut deadline = Instant::now() + timing.heartbeat;

    loop {
        // A link that fails at once never lets `timeout_at` fire
        if Instant::now() >= deadline {
            heartbeat_lost(&shared, &timing);
            deadline = Instant::now() + timing.heartbeat;
        }

        let received = tokio::time::timeout_at(deadline, link.recv_frame(inbound.as_mut_slice())).await;

        match received {
            Ok(Ok(len)) => {
                let frame = Frame::parse(&inbound.as_slice()[..len]);
                let green_left = shared.green_left();

                let (reaction, start_override) = shared.update(|core| {
                    let reaction = apply_message(
                        &mut core.node,
                        &frame.message,
                        &timing,
                        &mut rng,
                        core.panel.as_mut(),
                        green_left,
                    );
                    core.stats.frames_in += 1;
                    if !reaction.heartbeat {
                        core.stats.noise_frames += 1;
                    }
                    if reaction.rerolled {
                        core.stats.rerolls += 1;
                    }
                    let start_override = reaction.emergency && !core.override_active;
                    if start_override {
                        core.override_active = true;
                        core.stats.emergencies += 1;
                    }
                    (reaction, start_override)
                });

                if start_override {
                    emergency::start(&shared);
                }
                if reaction.emergency {
                    shared.refresh_sos();
                }
                if reaction.send_now {
                    shared.send_now();
                }
                if reaction.reconnected {
                    tracing::info!("peer reconnected");
                }
                if reaction.disconnected {
                    tracing::info!("emergency, entering four-way stop");
                }

                // Noise keeps whatever is left of the current window
                if reaction.heartbeat {
                    deadline = Instant::now() + timing.heartbeat;
                }
            }
            Ok(Err(e)) => {
                // Treated like noise: the window keeps running
                shared.update(|core| core.stats.recv_errors += 1);
                tracing::warn!("receive error: {}", e);
                tokio::time::sleep_until(deadline.min(Instant::now() + RECV_ERROR_BACKOFF)).await;
            }
            // Window elapsed, handled at the top of the loop
            Err(_) => {}
        }
    }
}

fn heartbeat_lost(shared: &Shared, timing: &Timing) {
    let green_left = shared.green_left();
    let newly = shared.update(|core| {
        core.stats.heartbeat_timeouts += 1;
        on_heartbeat_timeout(&mut core.node, timing, green_left)
    });
    if newly {
        tracing::info!(?green_left, "heartbeat lost, entering four-way stop");
    }
}
