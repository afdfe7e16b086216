//! # Controller Simulator Library
//!
//! Software stand-in for a physical controller device. It speaks the same
//! single-byte protocol a real pad does, which makes it useful both for
//! driving the server by hand and for exercising it from tests.
//!
//! ## Module Organization
//!
//! ### Controller Module (`controller`)
//! Connection handshake and control messages:
//! - Connecting and reading the assignment byte
//! - Sending direction, action and pause bytes
//!
//! ### Discovery Module (`discovery`)
//! Locating a server before connecting:
//! - Probing the discovery port with the service identifier
//! - Turning the announcement into a stream address

pub mod controller;
pub mod discovery;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server rejected the connection: all player slots are taken")]
    Rejected,
    #[error("protocol error: {0}")]
    Protocol(#[from] shared::ProtocolError),
    #[error("no server answered the discovery probe")]
    DiscoveryTimeout,
}
