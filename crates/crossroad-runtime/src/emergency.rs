//! Emergency override
//!
//! Started by the receiver on the first beacon. It holds emergency mode
//! until the beacon has been silent for `sos_silence`, then puts back the
//! payload the node was sending before the emergency.

use std::sync::Arc;

use tracing::Instrument;

use crate::Shared;

/// Spawn the override machine
///
/// The caller must already have claimed `Core::override_active`.
pub(crate) fn start(shared: &Arc<Shared>) {
    let task = tokio::spawn(
        run_override(Arc::clone(shared)).instrument(tracing::info_span!("emergency")),
    );
    shared.set_override_task(task);
}

/// Wait out the beacon, then restore normal transmission
pub async fn run_override(shared: Arc<Shared>) {
    let silence = shared.timing().sos_silence;

    loop {
        // A beacon heard right at the deadline still extends the emergency
        tokio::select! {
            biased;
            _ = shared.sos_refreshed() => continue,
            _ = tokio::time::sleep(silence) => break,
        }
    }

    let restored = shared.update(|core| {
        if let Some(saved) = core.node.saved_outbound.take() {
            core.node.outbound = saved;
        }
        core.node.sos_mode = false;
        core.override_active = false;
        core.node.outbound.clone()
    });
    shared.send_now();

    tracing::info!(%restored, "emergency over");
}
