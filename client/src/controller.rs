//! Simulated controller connection

use crate::ClientError;
use log::{debug, info};
use shared::{AssignmentReply, ControlMessage, Direction};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Connects to `addr` and reads the assignment byte
///
/// Returns the open stream together with the decoded reply, including a
/// rejection. Most callers want [`Controller::connect`] instead.
pub async fn request_slot(addr: SocketAddr) -> Result<(TcpStream, AssignmentReply), ClientError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|source| ClientError::Connect { addr, source })?;
    stream.set_nodelay(true)?;

    let byte = stream.read_u8().await?;
    let reply = AssignmentReply::decode(byte)?;
    debug!("Assignment byte {} from {}", byte, addr);

    Ok((stream, reply))
}

/// A connected controller holding a player slot
pub struct Controller {
    stream: TcpStream,
    player: usize,
}

impl Controller {
    /// Connects and waits for a player slot
    ///
    /// Fails with [`ClientError::Rejected`] when the server is full.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        match request_slot(addr).await? {
            (stream, AssignmentReply::Slot(player)) => {
                info!("Connected to {} as player {}", addr, player + 1);
                Ok(Self { stream, player })
            }
            (_, AssignmentReply::Full) => Err(ClientError::Rejected),
        }
    }

    /// Zero-based player index assigned by the server
    pub fn player(&self) -> usize {
        self.player
    }

    /// Sends one control message
    pub async fn send(&mut self, message: ControlMessage) -> Result<(), ClientError> {
        self.stream.write_all(&[message.encode()]).await?;
        Ok(())
    }

    /// Sends raw bytes, including ones outside the protocol
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    /// Reports the direction now held, replacing the previous one
    pub async fn direction(&mut self, direction: Direction) -> Result<(), ClientError> {
        self.send(ControlMessage::Direction(direction)).await
    }

    /// Presses the action button
    pub async fn press(&mut self) -> Result<(), ClientError> {
        self.send(ControlMessage::ActionPressed).await
    }

    /// Releases the action button
    pub async fn release(&mut self) -> Result<(), ClientError> {
        self.send(ControlMessage::ActionReleased).await
    }

    /// Asks the game to pause
    pub async fn pause(&mut self) -> Result<(), ClientError> {
        self.send(ControlMessage::Pause).await
    }

    /// Waits until the server closes the connection
    pub async fn closed(&mut self) -> Result<(), ClientError> {
        let mut buffer = [0u8; 16];
        while self.stream.read(&mut buffer).await? > 0 {}
        Ok(())
    }

    /// Closes the connection cleanly
    pub async fn disconnect(mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
