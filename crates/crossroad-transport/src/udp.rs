//! UDP radio implementation
//!
//! Each controller binds a local socket and talks to exactly one peer. The
//! channel number offsets both ports so several intersections can share a
//! host.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crossroad_core::{CrossroadError, CrossroadResult};

use crate::{Link, Radio, RadioConfig};

/// Radio carried over UDP
pub struct UdpRadio {
    local: SocketAddr,
    peer: SocketAddr,
    config: RadioConfig,
    tx_enabled: bool,
    rx_enabled: bool,
}

impl UdpRadio {
    pub fn new(local: SocketAddr, peer: SocketAddr) -> Self {
        UdpRadio {
            local,
            peer,
            config: RadioConfig::default(),
            tx_enabled: false,
            rx_enabled: false,
        }
    }
}

/// Shift a port by the channel number; port 0 stays ephemeral
fn on_channel(addr: SocketAddr, channel: u8) -> CrossroadResult<SocketAddr> {
    if addr.port() == 0 {
        return Ok(addr);
    }
    let port = addr.port().checked_add(u16::from(channel)).ok_or_else(|| {
        CrossroadError::RadioConfig(format!("channel {} overflows port {}", channel, addr.port()))
    })?;
    Ok(SocketAddr::new(addr.ip(), port))
}

impl Radio for UdpRadio {
    type Link = UdpLink;

    fn configure(&mut self, config: &RadioConfig) -> CrossroadResult<()> {
        config.validate()?;
        on_channel(self.local, config.channel)?;
        on_channel(self.peer, config.channel)?;
        tracing::debug!(
            session = config.session,
            channel = config.channel,
            power = config.power,
            "UDP radio configured"
        );
        self.config = config.clone();
        Ok(())
    }

    fn enable_tx(&mut self) {
        self.tx_enabled = true;
    }

    fn enable_rx(&mut self) {
        self.rx_enabled = true;
    }

    async fn open(&mut self) -> CrossroadResult<UdpLink> {
        let local = on_channel(self.local, self.config.channel)?;
        let peer = on_channel(self.peer, self.config.channel)?;

        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| CrossroadError::LinkUnavailable(e.to_string()))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| CrossroadError::LinkUnavailable(e.to_string()))?;

        Ok(UdpLink {
            socket,
            local_addr,
            peer,
            config: self.config.clone(),
            tx_enabled: self.tx_enabled,
            rx_enabled: self.rx_enabled,
        })
    }
}

/// Opened UDP link
pub struct UdpLink {
    socket: UdpSocket,
    local_addr: SocketAddr,
    peer: SocketAddr,
    config: RadioConfig,
    tx_enabled: bool,
    rx_enabled: bool,
}

impl UdpLink {
    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Link for UdpLink {
    async fn send_frame(&self, frame: &[u8]) -> CrossroadResult<()> {
        if !self.tx_enabled {
            return Ok(());
        }

        let mut bytes = frame.to_vec();
        self.config.stamp(&mut bytes);
        self.socket
            .send_to(&bytes, self.peer)
            .await
            .map_err(|e| CrossroadError::TransportError(e.to_string()))?;
        Ok(())
    }

    async fn recv_frame(&self, buf: &mut [u8]) -> CrossroadResult<usize> {
        loop {
            let (len, _) = self
                .socket
                .recv_from(buf)
                .await
                .map_err(|e| CrossroadError::TransportError(e.to_string()))?;

            if self.rx_enabled && self.config.accepts(&buf[..len]) {
                return Ok(len);
            }
        }
    }
}
