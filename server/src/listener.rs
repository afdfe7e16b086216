//! Accept loop assigning player slots to incoming controller connections

use crate::config::IdentityMode;
use crate::decoder::ConnectionDecoder;
use crate::slot_table::{Lease, SlotTable};
use log::{debug, error, info, warn};
use shared::AssignmentReply;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections until the server shuts down
///
/// Each accepted connection receives its assignment byte before any decoding
/// starts, then gets its own detached [`ConnectionDecoder`]. Accepting never
/// waits on a decoder.
pub struct ListenLoop {
    listener: TcpListener,
    table: Arc<SlotTable>,
    identity: IdentityMode,
    shutdown: watch::Receiver<bool>,
}

impl ListenLoop {
    pub fn new(
        listener: TcpListener,
        table: Arc<SlotTable>,
        identity: IdentityMode,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            table,
            identity,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        loop {
            let (stream, peer) = tokio::select! {
                result = self.listener.accept() => match result {
                    Ok(pair) => pair,
                    Err(e) => {
                        // Usually transient, e.g. out of file descriptors.
                        error!("Accept failed, retrying: {}", e);
                        if back_off(&mut self.shutdown, ACCEPT_BACKOFF).await {
                            continue;
                        }
                        break;
                    }
                },
                _ = self.shutdown.changed() => break,
            };

            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to disable Nagle for {}: {}", peer, e);
            }

            let identity = self.identity.identify(peer);
            admit(stream, identity, &self.table, &self.shutdown).await;
        }

        info!("Listen loop stopped");
    }
}

/// Sleeps for `delay`; false if the server shut down meanwhile
async fn back_off(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => !*shutdown.borrow(),
        _ = shutdown.changed() => false,
    }
}

/// Reserves a slot for a new connection, replies, and starts its decoder
///
/// When the reply cannot be delivered the reservation is released again, so
/// a peer that vanished during the handshake never leaks a slot. Rejected
/// peers are closed right after the full byte.
pub(crate) async fn admit<S>(
    mut stream: S,
    identity: String,
    table: &Arc<SlotTable>,
    shutdown: &watch::Receiver<bool>,
) -> Option<Lease>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let lease = table.assign(&identity);
    let reply = match lease {
        Some(lease) => AssignmentReply::Slot(lease.index),
        None => AssignmentReply::Full,
    };

    if let Err(e) = stream.write_all(&[reply.encode()]).await {
        warn!("Failed to send assignment to {}: {}", identity, e);
        if let Some(lease) = lease {
            table.release(lease);
        }
        return None;
    }

    match lease {
        Some(lease) => {
            ConnectionDecoder::new(stream, lease, Arc::clone(table), shutdown.clone(), identity)
                .spawn();
            Some(lease)
        }
        None => {
            warn!(
                "Rejected {}: all {} slots occupied",
                identity,
                table.len()
            );
            if let Err(e) = stream.shutdown().await {
                debug!("Closing rejected {} failed: {}", identity, e);
            }
            None
        }
    }
}
