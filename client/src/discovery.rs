//! Server discovery over UDP

use crate::ClientError;
use log::debug;
use shared::{DiscoveryPacket, PROTOCOL_VERSION};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

/// Probes `target` (usually a broadcast address) for `service_id`
///
/// Returns the stream address from the first matching announcement. Replies
/// for other services or other protocol versions are skipped.
pub async fn discover(
    target: SocketAddr,
    service_id: &str,
    wait: Duration,
) -> Result<SocketAddr, ClientError> {
    let unspecified = if target.is_ipv4() {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        IpAddr::V6(Ipv6Addr::UNSPECIFIED)
    };
    let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0)).await?;
    socket.set_broadcast(true)?;

    let probe = DiscoveryPacket::Probe {
        service_id: service_id.to_string(),
    };
    socket.send_to(&probe.to_bytes()?, target).await?;

    let deadline = Instant::now() + wait;
    let mut buffer = [0u8; 512];
    loop {
        let (len, from) = timeout_at(deadline, socket.recv_from(&mut buffer))
            .await
            .map_err(|_| ClientError::DiscoveryTimeout)??;

        match DiscoveryPacket::from_bytes(&buffer[..len]) {
            Ok(DiscoveryPacket::Announce {
                service_name,
                service_id: announced,
                protocol_version,
                port,
            }) if announced == service_id && protocol_version == PROTOCOL_VERSION => {
                debug!("Found '{}' at {}:{}", service_name, from.ip(), port);
                return Ok(SocketAddr::new(from.ip(), port));
            }
            Ok(other) => debug!("Skipping discovery reply from {}: {:?}", from, other),
            Err(e) => debug!("Undecodable discovery reply from {}: {}", from, e),
        }
    }
}
