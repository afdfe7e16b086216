//! UDP discovery responder advertising the controller endpoint
//!
//! Devices broadcast a [`DiscoveryPacket::Probe`] carrying the service id
//! they look for. When it matches, the responder answers the sender with a
//! [`DiscoveryPacket::Announce`] naming the stream port to connect to.

use crate::config::AdvertiseConfig;
use crate::lifecycle::ServerError;
use log::{debug, info, warn};
use shared::{DiscoveryPacket, PROTOCOL_VERSION};
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::sync::watch;

pub struct Advertiser {
    socket: UdpSocket,
    config: AdvertiseConfig,
    stream_port: u16,
    shutdown: watch::Receiver<bool>,
}

impl Advertiser {
    /// Binds the discovery socket on `ip` and the configured port
    pub async fn bind(
        ip: IpAddr,
        config: AdvertiseConfig,
        stream_port: u16,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, ServerError> {
        let addr = SocketAddr::new(ip, config.port);
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Advertise { addr, source })?;

        Ok(Self {
            socket,
            config,
            stream_port,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    fn announcement(&self) -> DiscoveryPacket {
        DiscoveryPacket::Announce {
            service_name: self.config.service_name.clone(),
            service_id: self.config.service_id.clone(),
            protocol_version: PROTOCOL_VERSION,
            port: self.stream_port,
        }
    }

    /// Answers probes until the server shuts down
    pub async fn run(mut self) {
        let announce = match self.announcement().to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode announcement, not advertising: {}", e);
                return;
            }
        };

        info!(
            "Advertising '{}' on {:?}",
            self.config.service_name,
            self.local_addr()
        );

        let mut buffer = [0u8; 512];
        loop {
            let (len, addr) = tokio::select! {
                result = self.socket.recv_from(&mut buffer) => match result {
                    Ok(pair) => pair,
                    Err(e) => {
                        debug!("Discovery receive error: {}", e);
                        continue;
                    }
                },
                _ = self.shutdown.changed() => break,
            };

            match DiscoveryPacket::from_bytes(&buffer[..len]) {
                Ok(DiscoveryPacket::Probe { service_id }) if service_id == self.config.service_id => {
                    debug!("Discovery probe from {}", addr);
                    if let Err(e) = self.socket.send_to(&announce, addr).await {
                        warn!("Failed to answer discovery probe from {}: {}", addr, e);
                    }
                }
                Ok(other) => debug!("Ignoring discovery packet from {}: {:?}", addr, other),
                Err(e) => debug!("Undecodable discovery datagram from {}: {}", addr, e),
            }
        }

        info!("Advertising stopped");
    }
}
