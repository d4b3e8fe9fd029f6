//! State shared by the controller's machines
//!
//! All machines mutate the node through `Shared::update`, which holds the
//! lock for the duration of the closure and then mirrors the boolean
//! conditions into watch channels so blocked machines wake up. The lock is
//! never held across an `.await`.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crossroad_core::{LightPanel, NodeSnapshot, NodeState, Timing};

/// Runtime counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub frames_in: u64,
    pub frames_out: u64,
    pub noise_frames: u64,
    pub send_errors: u64,
    pub recv_errors: u64,
    pub heartbeat_timeouts: u64,
    pub rerolls: u64,
    pub emergencies: u64,
}

/// Everything guarded by the node lock
pub struct Core {
    pub node: NodeState,
    pub panel: Box<dyn LightPanel>,
    pub stats: RuntimeStats,
    /// An emergency override machine is running
    pub override_active: bool,
}

/// Boolean condition machines can block on
///
/// Waiting is level based: a machine asking for a value the condition
/// already holds proceeds immediately; otherwise every waiter is released
/// together when the value flips.
pub struct Condition {
    tx: watch::Sender<bool>,
}

impl Condition {
    pub fn new(initial: bool) -> Self {
        let (tx, _) = watch::channel(initial);
        Condition { tx }
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    fn set(&self, value: bool) {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Block until the condition equals `want`
    pub async fn wait(&self, want: bool) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `Shared`, so the channel cannot close under us
        let _ = rx.wait_for(|value| *value == want).await.map(|_| ());
    }
}

/// Node state plus the signalling primitives around it
pub struct Shared {
    core: Mutex<Core>,
    timing: Timing,
    /// Mirror of `NodeState::green_on`
    pub green_on: Condition,
    /// Mirror of `NodeState::disconnected`
    pub disconnected: Condition,
    send_now: Notify,
    sos_refresh: Notify,
    green_deadline: Mutex<Option<Instant>>,
    override_task: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    pub fn new(node: NodeState, panel: Box<dyn LightPanel>, timing: Timing) -> Self {
        let green_on = Condition::new(node.green_on);
        let disconnected = Condition::new(node.disconnected);
        Shared {
            core: Mutex::new(Core {
                node,
                panel,
                stats: RuntimeStats::default(),
                override_active: false,
            }),
            timing,
            green_on,
            disconnected,
            send_now: Notify::new(),
            sos_refresh: Notify::new(),
            green_deadline: Mutex::new(None),
            override_task: Mutex::new(None),
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Mutate the node under the lock, then publish condition changes
    pub fn update<R>(&self, f: impl FnOnce(&mut Core) -> R) -> R {
        let mut core = self.core.lock();
        let result = f(&mut core);
        self.green_on.set(core.node.green_on);
        self.disconnected.set(core.node.disconnected);
        result
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        self.core.lock().node.snapshot()
    }

    pub fn stats(&self) -> RuntimeStats {
        self.core.lock().stats.clone()
    }

    /// Ask the sender to transmit now
    pub fn send_now(&self) {
        self.send_now.notify_one();
    }

    pub async fn send_requested(&self) {
        self.send_now.notified().await;
    }

    /// Restart the emergency override's silence window
    pub fn refresh_sos(&self) {
        self.sos_refresh.notify_one();
    }

    pub async fn sos_refreshed(&self) {
        self.sos_refresh.notified().await;
    }

    /// Publish (or clear) the end of the running green phase
    pub fn set_green_deadline(&self, deadline: Option<Instant>) {
        *self.green_deadline.lock() = deadline;
    }

    /// Green time left on the running phase, if one is running
    pub fn green_left(&self) -> Option<Duration> {
        self.green_deadline
            .lock()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub(crate) fn set_override_task(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.override_task.lock().replace(handle) {
            previous.abort();
        }
    }

    pub(crate) fn abort_override(&self) {
        if let Some(handle) = self.override_task.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossroad_core::{LampBank, Roll};
    use std::sync::Arc;

    fn shared() -> Arc<Shared> {
        let node = NodeState::new(Roll::new(50).unwrap());
        Arc::new(Shared::new(node, Box::new(LampBank::new()), Timing::fast()))
    }

    #[tokio::test]
    async fn test_update_mirrors_conditions() {
        let shared = shared();
        assert!(shared.disconnected.is_raised());
        assert!(!shared.green_on.is_raised());

        shared.update(|core| {
            core.node.disconnected = false;
            core.node.green_on = true;
        });

        assert!(!shared.disconnected.is_raised());
        assert!(shared.green_on.is_raised());
    }

    #[tokio::test(start_paused = true)]
    async fn test_condition_wakes_all_waiters() {
        let shared = shared();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move { shared.disconnected.wait(false).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(waiters.iter().all(|w| !w.is_finished()));

        shared.update(|core| core.node.disconnected = false);
        for waiter in waiters {
            waiter.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_wait_on_held_condition_returns() {
        let shared = shared();
        shared.disconnected.wait(true).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_green_left_counts_down() {
        let shared = shared();
        assert_eq!(shared.green_left(), None);

        shared.set_green_deadline(Some(Instant::now() + Duration::from_secs(4)));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(shared.green_left(), Some(Duration::from_secs(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_request_is_remembered_once() {
        let shared = shared();
        shared.send_now();
        shared.send_now();
        shared.send_requested().await;

        let second =
            tokio::time::timeout(Duration::from_millis(10), shared.send_requested()).await;
        assert!(second.is_err());
    }
}
