//! In-memory radio for simulation and tests
//!
//! Frames travel over tokio channels. A closed channel behaves like an empty
//! ether: the receiver just hears nothing.

use tokio::sync::{mpsc, Mutex};

use crossroad_core::{CrossroadError, CrossroadResult};

use crate::{Link, Radio, RadioConfig};

/// Frames headed onto the simulated air
pub type FrameSender = mpsc::Sender<Vec<u8>>;

/// Frames arriving from the simulated air
pub type FrameReceiver = mpsc::Receiver<Vec<u8>>;

/// Radio backed by a pair of channels
pub struct MemoryRadio {
    outgoing: FrameSender,
    incoming: Option<FrameReceiver>,
    config: RadioConfig,
    tx_enabled: bool,
    rx_enabled: bool,
}

impl MemoryRadio {
    /// Radio transmitting into `outgoing` and listening on `incoming`
    pub fn new(outgoing: FrameSender, incoming: FrameReceiver) -> Self {
        MemoryRadio {
            outgoing,
            incoming: Some(incoming),
            config: RadioConfig::default(),
            tx_enabled: false,
            rx_enabled: false,
        }
    }

    /// Two radios wired directly to each other
    pub fn pair(capacity: usize) -> (MemoryRadio, MemoryRadio) {
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);
        (MemoryRadio::new(a_tx, a_rx), MemoryRadio::new(b_tx, b_rx))
    }
}

impl Radio for MemoryRadio {
    type Link = MemoryLink;

    fn configure(&mut self, config: &RadioConfig) -> CrossroadResult<()> {
        config.validate()?;
        self.config = config.clone();
        Ok(())
    }

    fn enable_tx(&mut self) {
        self.tx_enabled = true;
    }

    fn enable_rx(&mut self) {
        self.rx_enabled = true;
    }

    async fn open(&mut self) -> CrossroadResult<MemoryLink> {
        let incoming = self
            .incoming
            .take()
            .ok_or_else(|| CrossroadError::LinkUnavailable("memory radio already open".into()))?;

        Ok(MemoryLink {
            outgoing: self.outgoing.clone(),
            incoming: Mutex::new(incoming),
            config: self.config.clone(),
            tx_enabled: self.tx_enabled,
            rx_enabled: self.rx_enabled,
        })
    }
}

/// Opened in-memory link
pub struct MemoryLink {
    outgoing: FrameSender,
    incoming: Mutex<FrameReceiver>,
    config: RadioConfig,
    tx_enabled: bool,
    rx_enabled: bool,
}

impl Link for MemoryLink {
    async fn send_frame(&self, frame: &[u8]) -> CrossroadResult<()> {
        if !self.tx_enabled {
            tracing::trace!("transmitter off, frame dropped");
            return Ok(());
        }

        let mut bytes = frame.to_vec();
        self.config.stamp(&mut bytes);

        match self.outgoing.try_send(bytes) {
            Ok(()) => Ok(()),
            // A full ether loses the frame, like a collision would
            Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(CrossroadError::TransportError("memory link closed".into()))
            }
        }
    }

    async fn recv_frame(&self, buf: &mut [u8]) -> CrossroadResult<usize> {
        let mut incoming = self.incoming.lock().await;
        loop {
            let Some(frame) = incoming.recv().await else {
                return std::future::pending().await;
            };
            if !self.rx_enabled || !self.config.accepts(&frame) {
                continue;
            }
            let n = frame.len().min(buf.len());
            buf[..n].copy_from_slice(&frame[..n]);
            return Ok(n);
        }
    }
}
