//! Read relay for an open link.
//!
//! One task per link reads the transport and posts decoded text to the
//! display surface until it is told to stop or the transport fails.  A
//! failure is reported back to the bridge as a [`LinkEvent`]; the relay
//! never tears the link down itself.

use crate::serial::error::SerialError;
use crate::serial::host::DisplaySurface;
use crate::serial::transport::SerialTransport;
use crate::serial::types::DisplayMessage;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Relay → bridge notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The transport reported an unrecoverable read error.
    Failed { link_id: Uuid, error: SerialError },
    /// The transport closed underneath the relay.
    Closed { link_id: Uuid },
}

impl LinkEvent {
    pub fn link_id(&self) -> Uuid {
        match self {
            Self::Failed { link_id, .. } | Self::Closed { link_id } => *link_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub bytes: u64,
    pub chunks: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Incremental UTF-8 decoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decodes a byte stream chunk by chunk.  A character split across two
/// chunks is held back until its remaining bytes arrive; invalid
/// sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush a dangling partial character.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Relay task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct RelayHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<RelayStats>,
}

impl RelayHandle {
    /// Stop the relay and wait for it to exit.
    pub async fn stop(mut self) -> RelayStats {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                log::warn!("relay task ended abnormally: {}", e);
                RelayStats::default()
            }
        }
    }
}

pub fn spawn_relay(
    link_id: Uuid,
    transport: Arc<dyn SerialTransport>,
    display: Arc<dyn DisplaySurface>,
    events: mpsc::UnboundedSender<LinkEvent>,
    buffer_size: usize,
) -> RelayHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let mut stats = RelayStats::default();
        let mut decoder = Utf8Decoder::default();
        let mut buf = vec![0u8; buffer_size.max(1)];

        loop {
            let read = tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                read = transport.read(&mut buf) => read,
            };
            match read {
                Ok(0) | Err(_) if !transport.is_open() => {
                    log::debug!("link {} closed underneath the relay", link_id);
                    let _ = events.send(LinkEvent::Closed { link_id });
                    break;
                }
                Ok(0) => {}
                Ok(n) => {
                    stats.bytes += n as u64;
                    stats.chunks += 1;
                    let text = decoder.decode(&buf[..n]);
                    if !text.is_empty() {
                        display.post(DisplayMessage::Stdout(text));
                    }
                }
                Err(error) => {
                    log::warn!("read from {} failed: {}", transport.port_name(), error);
                    let _ = events.send(LinkEvent::Failed { link_id, error });
                    break;
                }
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            display.post(DisplayMessage::Stdout(tail));
        }
        stats
    });
    RelayHandle {
        stop: Some(stop_tx),
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::transport::SimulatedTransport;
    use crate::serial::types::PortConfig;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<DisplayMessage>>);

    impl DisplaySurface for Collect {
        fn post(&self, message: DisplayMessage) {
            self.0.lock().unwrap().push(message);
        }
    }

    impl Collect {
        fn text(&self) -> String {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|m| match m {
                    DisplayMessage::Stdout(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_decoder_carries_split_character() {
        let mut d = Utf8Decoder::default();
        let bytes = "héllo".as_bytes();
        assert_eq!(d.decode(&bytes[..2]), "h");
        assert_eq!(d.decode(&bytes[2..]), "éllo");
        assert_eq!(d.finish(), "");
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut d = Utf8Decoder::default();
        assert_eq!(d.decode(b"a\xffb"), "a\u{FFFD}b");
        assert_eq!(d.decode(b"\xe2\x82"), "");
        assert_eq!(d.finish(), "\u{FFFD}");
    }

    #[tokio::test]
    async fn test_relay_forwards_and_stops() {
        let transport = SimulatedTransport::new(PortConfig::new("sim", 9600));
        let display = Arc::new(Collect::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let relay = spawn_relay(Uuid::new_v4(), transport.clone(), display.clone(), tx, 8);

        transport.inject_rx(b"hello ").await;
        transport.inject_rx(b"world").await;
        while display.text() != "hello world" {
            tokio::task::yield_now().await;
        }
        let stats = relay.stop().await;
        assert_eq!(stats.bytes, 11);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_relay_reports_failure() {
        let transport = SimulatedTransport::new(PortConfig::new("sim", 9600));
        let display = Arc::new(Collect::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let relay = spawn_relay(id, transport.clone(), display, tx, 64);

        transport.fail_next_read(SerialError::io("unplugged"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.link_id(), id);
        assert!(matches!(event, LinkEvent::Failed { .. }));
        relay.stop().await;
    }

    #[tokio::test]
    async fn test_relay_notices_transport_closed() {
        let transport = SimulatedTransport::new(PortConfig::new("sim", 9600));
        let display = Arc::new(Collect::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let relay = spawn_relay(id, transport.clone(), display, tx, 64);

        transport.close().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), LinkEvent::Closed { link_id: id });
        relay.stop().await;
    }
}
