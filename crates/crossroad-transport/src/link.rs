//! Radio and link interfaces
//!
//! A `Radio` is configured, switched on, then opened once to obtain the
//! `Link` both the receiver and the sender share.

use std::future::Future;

use crossroad_core::{CrossroadError, CrossroadResult};

/// Highest transmit power level a radio accepts
pub const MAX_POWER: u8 = 7;

/// Radio session/channel/power settings
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct RadioConfig {
    /// Network session; 0 accepts frames from any session
    pub session: u16,
    /// Channel number
    pub channel: u8,
    /// Transmit power level (0..=MAX_POWER)
    pub power: u8,
}

impl RadioConfig {
    pub fn validate(&self) -> CrossroadResult<()> {
        if self.power > MAX_POWER {
            return Err(CrossroadError::RadioConfig(format!(
                "power {} exceeds {}",
                self.power, MAX_POWER
            )));
        }
        Ok(())
    }

    /// Write the session into the reserved header bytes
    pub fn stamp(&self, frame: &mut [u8]) {
        if frame.len() >= 2 {
            frame[..2].copy_from_slice(&self.session.to_le_bytes());
        }
    }

    /// Whether a received frame belongs to this session
    pub fn accepts(&self, frame: &[u8]) -> bool {
        if self.session == 0 {
            return true;
        }
        frame.len() >= 2 && u16::from_le_bytes([frame[0], frame[1]]) == self.session
    }
}

/// Physical radio collaborator
pub trait Radio {
    type Link: Link;

    /// Apply session, channel and power
    fn configure(&mut self, config: &RadioConfig) -> CrossroadResult<()>;

    /// Switch the transmitter on
    fn enable_tx(&mut self);

    /// Switch the receiver on
    fn enable_rx(&mut self);

    /// Open the logical connection
    fn open(&mut self) -> impl Future<Output = CrossroadResult<Self::Link>> + Send;
}

/// Opened logical connection
pub trait Link: Send + Sync + 'static {
    /// Transmit one frame
    fn send_frame(&self, frame: &[u8]) -> impl Future<Output = CrossroadResult<()>> + Send;

    /// Wait for one frame, returning its length
    fn recv_frame(&self, buf: &mut [u8]) -> impl Future<Output = CrossroadResult<usize>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_validation() {
        let mut config = RadioConfig::default();
        assert!(config.validate().is_ok());
        config.power = MAX_POWER + 1;
        assert!(matches!(config.validate(), Err(CrossroadError::RadioConfig(_))));
    }

    #[test]
    fn test_session_filter() {
        let config = RadioConfig {
            session: 0x0102,
            ..Default::default()
        };
        let mut frame = [0u8; 20];
        assert!(!config.accepts(&frame));
        config.stamp(&mut frame);
        assert!(config.accepts(&frame));
        assert!(RadioConfig::default().accepts(&frame));
    }
}
