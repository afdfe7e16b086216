//! Per-connection decoder turning controller bytes into slot updates

use crate::slot_table::{Lease, SlotTable};
use log::{debug, info, warn};
use shared::ControlMessage;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;

/// Reads one controller's byte stream and applies it to its leased slot
///
/// The decoder owns the stream until it exits. It exits when the peer closes
/// the stream, when a read fails, when the server shuts down, or when its
/// lease is taken over. In every case the slot is released (if still owned)
/// and the stream is dropped.
pub struct ConnectionDecoder<S> {
    stream: S,
    lease: Lease,
    table: Arc<SlotTable>,
    shutdown: watch::Receiver<bool>,
    peer: String,
}

impl<S> ConnectionDecoder<S>
where
    S: AsyncRead + Unpin,
{
    pub fn new(
        stream: S,
        lease: Lease,
        table: Arc<SlotTable>,
        shutdown: watch::Receiver<bool>,
        peer: String,
    ) -> Self {
        Self {
            stream,
            lease,
            table,
            shutdown,
            peer,
        }
    }

    pub async fn run(mut self) {
        let player = self.lease.index + 1;

        let stopping = *self.shutdown.borrow();
        if stopping || !self.table.activate(self.lease) {
            debug!("Player {} lease for {} expired before decoding", player, self.peer);
            self.table.release(self.lease);
            return;
        }
        info!("Player {} connected from {}", player, self.peer);

        let mut buffer = [0u8; 64];
        loop {
            tokio::select! {
                result = self.stream.read(&mut buffer) => match result {
                    Ok(0) => {
                        debug!("Player {} closed the stream", player);
                        break;
                    }
                    Ok(len) => {
                        if !self.apply_bytes(&buffer[..len]) {
                            info!("Player {} slot taken over, dropping {}", player, self.peer);
                            break;
                        }
                    }
                    Err(e) => {
                        // Expected on abrupt disconnects.
                        debug!("Player {} read error: {}", player, e);
                        break;
                    }
                },
                _ = self.shutdown.changed() => break,
            }
        }

        if self.table.release(self.lease) {
            info!("Player {} disconnected", player);
        }
    }

    /// Applies bytes in arrival order; false once the lease is lost
    fn apply_bytes(&self, bytes: &[u8]) -> bool {
        bytes.iter().all(|&byte| self.apply_byte(byte))
    }

    fn apply_byte(&self, byte: u8) -> bool {
        let player = self.lease.index + 1;
        match ControlMessage::decode(byte) {
            Ok(ControlMessage::Direction(direction)) => {
                debug!("Player {} direction {}", player, direction);
                self.table.set_direction(self.lease, direction)
            }
            Ok(ControlMessage::ActionPressed) => {
                debug!("Player {} action pressed", player);
                self.table.set_action_pressed(self.lease, true)
            }
            Ok(ControlMessage::ActionReleased) => {
                debug!("Player {} action released", player);
                self.table.set_action_pressed(self.lease, false)
            }
            Ok(ControlMessage::Pause) => {
                info!("Player {} paused the game", player);
                self.table.pause(self.lease)
            }
            Err(e) => {
                warn!("Player {} sent {}, ignoring", player, e);
                true
            }
        }
    }
}

impl<S> ConnectionDecoder<S>
where
    S: AsyncRead + Unpin + Send + 'static,
{
    /// Runs the decoder as a detached task
    pub fn spawn(self) {
        tokio::spawn(self.run());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Direction;
    use std::io;
    use std::time::Duration;
    use tokio_test::io::Builder;

    fn leased_table(players: usize) -> (Arc<SlotTable>, Lease) {
        let table = Arc::new(SlotTable::new(players));
        let lease = table.assign("peer").unwrap();
        (table, lease)
    }

    #[tokio::test]
    async fn test_clean_close_releases_slot() {
        let (table, lease) = leased_table(2);
        let (_tx, rx) = watch::channel(false);

        // Stream ends after the reads, so the decoder releases the slot.
        let stream = Builder::new().read(&[3]).build();
        let decoder = ConnectionDecoder::new(stream, lease, Arc::clone(&table), rx, "peer".into());

        decoder.run().await;

        assert!(table.slot(0).is_free());
        assert_eq!(table.connected_count(), 0);
    }

    #[tokio::test]
    async fn test_latest_direction_wins() {
        let (table, lease) = leased_table(1);
        let (_tx, rx) = watch::channel(false);

        let decoder = ConnectionDecoder::new(
            Builder::new().build(),
            lease,
            Arc::clone(&table),
            rx,
            "peer".into(),
        );
        table.activate(lease);

        assert!(decoder.apply_bytes(&[3, 1, 4]));
        assert_eq!(table.slot(0).direction, Direction::Right);
        assert!(decoder.apply_bytes(&[5]));
        assert_eq!(table.slot(0).direction, Direction::None);
    }

    #[tokio::test]
    async fn test_action_and_pause_bytes() {
        let (table, lease) = leased_table(1);
        let (_tx, rx) = watch::channel(false);
        let decoder = ConnectionDecoder::new(
            Builder::new().build(),
            lease,
            Arc::clone(&table),
            rx,
            "peer".into(),
        );
        table.activate(lease);

        decoder.apply_bytes(&[100]);
        assert!(table.slot(0).action_pressed);

        decoder.apply_bytes(&[101]);
        assert!(!table.slot(0).action_pressed);

        decoder.apply_bytes(&[200]);
        assert!(table.is_paused());

        // Pause sets rather than toggles.
        decoder.apply_bytes(&[200]);
        assert!(table.is_paused());
    }

    #[tokio::test]
    async fn test_unknown_bytes_are_ignored() {
        let (table, lease) = leased_table(1);
        let (_tx, rx) = watch::channel(false);
        let decoder = ConnectionDecoder::new(
            Builder::new().build(),
            lease,
            Arc::clone(&table),
            rx,
            "peer".into(),
        );
        table.activate(lease);

        assert!(decoder.apply_bytes(&[2, 0, 42, 255]));
        let slot = table.slot(0);
        assert_eq!(slot.direction, Direction::Down);
        assert!(slot.connected);
    }

    #[tokio::test]
    async fn test_read_error_releases_slot() {
        let (table, lease) = leased_table(1);
        let (_tx, rx) = watch::channel(false);

        let stream = Builder::new()
            .read(&[4, 100])
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        ConnectionDecoder::new(stream, lease, Arc::clone(&table), rx, "peer".into())
            .run()
            .await;

        let slot = table.slot(0);
        assert!(slot.is_free());
        assert_eq!(slot.direction, Direction::None);
        assert!(!slot.action_pressed);
    }

    #[tokio::test]
    async fn test_shutdown_unblocks_pending_read() {
        let (table, lease) = leased_table(1);
        let (tx, rx) = watch::channel(false);

        // A stream that would stay silent for far longer than the test.
        let stream = Builder::new().wait(Duration::from_secs(60)).build();
        let task = tokio::spawn(
            ConnectionDecoder::new(stream, lease, Arc::clone(&table), rx, "peer".into()).run(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(table.connected_count(), 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("decoder did not observe shutdown")
            .unwrap();

        assert_eq!(table.connected_count(), 0);
    }

    #[tokio::test]
    async fn test_taken_over_decoder_leaves_slot_alone() {
        let (table, old_lease) = leased_table(1);
        let (_tx, rx) = watch::channel(false);

        // The old device stays quiet until after the takeover, then sends.
        let stream = Builder::new()
            .wait(Duration::from_millis(200))
            .read(&[3])
            .build();
        let task = tokio::spawn(
            ConnectionDecoder::new(stream, old_lease, Arc::clone(&table), rx, "peer".into()).run(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(table.connected_count(), 1);

        let new_lease = table.assign("peer").unwrap();
        assert!(table.activate(new_lease));
        assert!(table.set_direction(new_lease, Direction::Up));

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("superseded decoder kept running")
            .unwrap();

        let slot = table.slot(0);
        assert!(slot.connected);
        assert_eq!(slot.identity, "peer");
        assert_eq!(slot.direction, Direction::Up);
    }

    #[tokio::test]
    async fn test_stale_lease_skips_decoding() {
        let (table, old_lease) = leased_table(1);
        let (_tx, rx) = watch::channel(false);
        let new_lease = table.assign("peer").unwrap();
        table.activate(new_lease);

        ConnectionDecoder::new(Builder::new().build(), old_lease, Arc::clone(&table), rx, "peer".into())
            .run()
            .await;

        assert!(table.slot(0).connected);
        assert!(table.set_direction(new_lease, Direction::Left));
    }

    #[tokio::test]
    async fn test_shutdown_before_start_skips_activation() {
        let (table, lease) = leased_table(1);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        ConnectionDecoder::new(Builder::new().build(), lease, Arc::clone(&table), rx, "peer".into())
            .run()
            .await;

        assert_eq!(table.connected_count(), 0);
        assert!(table.slot(0).is_free());
    }
}
