//! Sender - periodic and on-demand transmission

use std::sync::Arc;

use crossroad_transport::Link;
use crossroad_wire::{Frame, FrameBuf};

use crate::Shared;

/// Transmit the outbound payload every `send_interval`, or sooner on request
pub async fn run_sender<L: Link>(shared: Arc<Shared>, link: Arc<L>, mut outbound: FrameBuf) {
    let interval = shared.timing().send_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shared.send_requested() => {}
        }

        let payload = shared.update(|core| core.node.outbound.clone());
        let bytes = match Frame::tagged(payload).serialize() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("outbound payload not sendable: {}", e);
                continue;
            }
        };
        outbound.load(&bytes);

        // No retry: the next period resends
        let sent = link.send_frame(outbound.as_slice()).await;
        shared.update(|core| match &sent {
            Ok(()) => core.stats.frames_out += 1,
            Err(_) => core.stats.send_errors += 1,
        });
        if let Err(e) = sent {
            tracing::warn!("send failed: {}", e);
        }
    }
}
