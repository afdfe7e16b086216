//! Server configuration injected at construction time

use shared::{SERVICE_ID, SERVICE_NAME};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_PORT: u16 = 4242;
pub const DEFAULT_DISCOVERY_PORT: u16 = 4243;

/// How a peer's transport address maps to a device identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityMode {
    /// Full `ip:port`; every connection is a distinct device
    #[default]
    Address,
    /// IP only; a reconnecting host gets its previous slot back
    Host,
}

impl IdentityMode {
    pub fn identify(self, peer: SocketAddr) -> String {
        match self {
            IdentityMode::Address => peer.to_string(),
            IdentityMode::Host => peer.ip().to_string(),
        }
    }
}

/// Endpoint advertisement over UDP discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertiseConfig {
    pub port: u16,
    pub service_name: String,
    pub service_id: String,
}

impl Default for AdvertiseConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DISCOVERY_PORT,
            service_name: SERVICE_NAME.to_string(),
            service_id: SERVICE_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address of the listening stream endpoint
    pub bind_addr: SocketAddr,
    pub identity: IdentityMode,
    /// Discovery responder settings, `None` disables advertising
    pub advertise: Option<AdvertiseConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            identity: IdentityMode::Address,
            advertise: Some(AdvertiseConfig::default()),
        }
    }
}

impl ServerConfig {
    /// Loopback configuration on ephemeral ports, advertising included
    pub fn local() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            identity: IdentityMode::Address,
            advertise: Some(AdvertiseConfig {
                port: 0,
                ..AdvertiseConfig::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_modes() {
        let peer: SocketAddr = "192.168.1.20:50123".parse().unwrap();
        assert_eq!(IdentityMode::Address.identify(peer), "192.168.1.20:50123");
        assert_eq!(IdentityMode::Host.identify(peer), "192.168.1.20");
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.identity, IdentityMode::Address);
        let advertise = config.advertise.unwrap();
        assert_eq!(advertise.port, DEFAULT_DISCOVERY_PORT);
        assert_eq!(advertise.service_id, SERVICE_ID);
    }

    #[test]
    fn test_local_config_uses_ephemeral_ports() {
        let config = ServerConfig::local();
        assert!(config.bind_addr.ip().is_loopback());
        assert_eq!(config.bind_addr.port(), 0);
        assert_eq!(config.advertise.unwrap().port, 0);
    }
}
