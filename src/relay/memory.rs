// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process relay hub.
//!
//! Routes envelopes between channels by topic without encryption. Messages
//! published to a topic nobody is subscribed to are held until a
//! subscriber connects, the same way a relay bridge buffers them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{Envelope, RelayChannel, RelayTransport, TransportError, CHANNEL_CAPACITY};
use crate::session::SessionConfig;

#[derive(Default)]
struct Hub {
    subscribers: HashMap<String, mpsc::Sender<Envelope>>,
    backlog: HashMap<String, Vec<Envelope>>,
}

/// Shared in-memory relay. Clones refer to the same hub.
#[derive(Clone, Default)]
pub struct MemoryRelay {
    hub: Arc<Mutex<Hub>>,
    open: Arc<AtomicUsize>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel subscribed to `topic`, replacing any earlier subscriber.
    pub fn connect(&self, topic: &str) -> RelayChannel {
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Envelope>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let closer = CancellationToken::new();

        {
            let mut hub = self.hub();
            for envelope in hub.backlog.remove(topic).unwrap_or_default() {
                if inbound_tx.try_send(envelope).is_err() {
                    tracing::warn!(topic, "Dropping buffered relay message, inbound queue full");
                }
            }
            hub.subscribers.insert(topic.to_string(), inbound_tx.clone());
        }
        self.open.fetch_add(1, Ordering::SeqCst);

        let relay = self.clone();
        let topic = topic.to_string();
        let stop = closer.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => {
                        while let Ok(envelope) = outbound_rx.try_recv() {
                            relay.publish(envelope).await;
                        }
                        break;
                    }
                    next = outbound_rx.recv() => match next {
                        Some(envelope) => relay.publish(envelope).await,
                        None => break,
                    },
                }
            }

            {
                let mut hub = relay.hub();
                if hub
                    .subscribers
                    .get(&topic)
                    .is_some_and(|current| current.same_channel(&inbound_tx))
                {
                    hub.subscribers.remove(&topic);
                }
            }
            drop(inbound_tx);
            relay.open.fetch_sub(1, Ordering::SeqCst);
        });

        RelayChannel::new(outbound_tx, inbound_rx, closer)
    }

    /// Deliver an envelope to the current subscriber of its topic.
    pub async fn publish(&self, envelope: Envelope) {
        let subscriber = {
            let mut hub = self.hub();
            match hub.subscribers.get(&envelope.topic) {
                Some(tx) if !tx.is_closed() => Some(tx.clone()),
                _ => {
                    hub.backlog
                        .entry(envelope.topic.clone())
                        .or_default()
                        .push(envelope.clone());
                    None
                }
            }
        };

        if let Some(tx) = subscriber {
            let topic = envelope.topic.clone();
            if tx.send(envelope).await.is_err() {
                tracing::debug!(topic = %topic, "Relay subscriber went away during delivery");
            }
        }
    }

    /// Number of connections that have not been released yet.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn has_subscriber(&self, topic: &str) -> bool {
        self.hub()
            .subscribers
            .get(topic)
            .is_some_and(|tx| !tx.is_closed())
    }

    fn hub(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RelayTransport for MemoryRelay {
    async fn open(&self, _config: &SessionConfig, topic: &str) -> Result<RelayChannel, TransportError> {
        Ok(self.connect(topic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RpcRequest;
    use serde_json::json;
    use std::time::Duration;

    fn request(topic: &str, id: u64) -> Envelope {
        Envelope::new(topic, RpcRequest::new(id, "ping", json!([])))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn routes_by_topic() {
        let relay = MemoryRelay::new();
        let mut alice = relay.connect("alice");
        let bob = relay.connect("bob");

        bob.sender.send(request("alice", 1)).await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(1), alice.inbound.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, request("alice", 1));
    }

    #[tokio::test]
    async fn buffers_until_subscriber_connects() {
        let relay = MemoryRelay::new();
        relay.publish(request("late", 9)).await;

        let mut late = relay.connect("late");
        assert_eq!(late.inbound.recv().await.unwrap(), request("late", 9));
    }

    #[tokio::test]
    async fn close_releases_connection_and_ends_inbound() {
        let relay = MemoryRelay::new();
        let mut channel = relay.connect("topic");
        assert_eq!(relay.open_connections(), 1);

        channel.sender.close();
        assert!(channel.inbound.recv().await.is_none());
        settle().await;
        assert_eq!(relay.open_connections(), 0);
        assert!(!relay.has_subscriber("topic"));
        assert!(matches!(
            channel.sender.send(request("x", 1)).await,
            Err(TransportError::Closed)
        ));
    }
}
