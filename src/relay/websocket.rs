// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relay over a WebSocket pub/sub bridge.
//!
//! Frames are JSON objects `{topic, type, payload, silent}` where `type` is
//! `sub` (subscribe to `topic`) or `pub` (publish `payload` to `topic`).
//! `payload` carries a [`SealedPayload`] encoded as a JSON string.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::cipher::{EnvelopeCipher, SealedPayload};
use super::{Envelope, RelayChannel, RelayTransport, RpcMessage, TransportError, CHANNEL_CAPACITY};
use crate::session::SessionConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SocketFrame {
    topic: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: String,
    #[serde(default)]
    silent: bool,
}

impl SocketFrame {
    fn subscribe(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            kind: "sub".to_string(),
            payload: String::new(),
            silent: true,
        }
    }

    fn publish(topic: &str, payload: String) -> Self {
        Self {
            topic: topic.to_string(),
            kind: "pub".to_string(),
            payload,
            silent: true,
        }
    }
}

/// WebSocket relay transport.
#[derive(Debug, Clone, Default)]
pub struct WebSocketRelay;

impl WebSocketRelay {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RelayTransport for WebSocketRelay {
    async fn open(&self, config: &SessionConfig, topic: &str) -> Result<RelayChannel, TransportError> {
        let url = socket_url(&config.relay_endpoint)?;
        let cipher = EnvelopeCipher::from_hex_key(config.shared_key())?;

        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let subscribe = serde_json::to_string(&SocketFrame::subscribe(topic))
            .map_err(|e| TransportError::Framing(e.to_string()))?;
        sink.send(Message::Text(subscribe))
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(relay = %url, topic, "Relay connection open");

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Envelope>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let closer = CancellationToken::new();
        let stop = closer.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => {
                        while let Ok(envelope) = outbound_rx.try_recv() {
                            if let Ok(text) = encode_frame(&cipher, &envelope) {
                                let _ = sink.send(Message::Text(text)).await;
                            }
                        }
                        let _ = sink.close().await;
                        break;
                    }
                    next = outbound_rx.recv() => {
                        let Some(envelope) = next else { break };
                        let text = match encode_frame(&cipher, &envelope) {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to encode relay message");
                                continue;
                            }
                        };
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            tracing::warn!(error = %e, "Relay send failed, closing connection");
                            break;
                        }
                    }
                    incoming = source.next() => match incoming {
                        Some(Ok(Message::Text(text))) => match decode_frame(&cipher, &text) {
                            Ok(Some(envelope)) => {
                                if inbound_tx.send(envelope).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!(error = %e, "Dropping unreadable relay message");
                            }
                        },
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Relay connection failed");
                            break;
                        }
                    },
                }
            }
            stop.cancel();
            tracing::debug!("Relay connection released");
        });

        Ok(RelayChannel::new(outbound_tx, inbound_rx, closer))
    }
}

/// Map the relay endpoint onto its WebSocket URL.
fn socket_url(endpoint: &Url) -> Result<Url, TransportError> {
    let mut url = endpoint.clone();
    let scheme = match endpoint.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::Connect(format!(
                "unsupported relay scheme `{other}`"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::Connect(format!("cannot use {scheme} for {endpoint}")))?;
    Ok(url)
}

fn encode_frame(cipher: &EnvelopeCipher, envelope: &Envelope) -> Result<String, TransportError> {
    let plaintext =
        serde_json::to_vec(&envelope.message).map_err(|e| TransportError::Framing(e.to_string()))?;
    let sealed = cipher.seal(&plaintext)?;
    let payload =
        serde_json::to_string(&sealed).map_err(|e| TransportError::Framing(e.to_string()))?;
    serde_json::to_string(&SocketFrame::publish(&envelope.topic, payload))
        .map_err(|e| TransportError::Framing(e.to_string()))
}

/// Returns `None` for frames that carry no message (acks, subscriptions).
fn decode_frame(cipher: &EnvelopeCipher, text: &str) -> Result<Option<Envelope>, TransportError> {
    let frame: SocketFrame =
        serde_json::from_str(text).map_err(|e| TransportError::Framing(e.to_string()))?;
    if frame.kind != "pub" || frame.payload.is_empty() {
        return Ok(None);
    }

    let sealed: SealedPayload =
        serde_json::from_str(&frame.payload).map_err(|e| TransportError::Framing(e.to_string()))?;
    let plaintext = cipher.open(&sealed)?;
    let message: RpcMessage =
        serde_json::from_slice(&plaintext).map_err(|e| TransportError::Framing(e.to_string()))?;

    Ok(Some(Envelope {
        topic: frame.topic,
        message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RpcRequest;
    use serde_json::json;

    const KEY: &str = "0707070707070707070707070707070707070707070707070707070707070707";

    #[test]
    fn frames_round_trip_through_the_cipher() {
        let cipher = EnvelopeCipher::from_hex_key(KEY).unwrap();
        let envelope = Envelope::new("peer", RpcRequest::new(5, "eth_call", json!([{"to": "0x0"}])));

        let text = encode_frame(&cipher, &envelope).unwrap();
        assert!(!text.contains("eth_call"));

        let decoded = decode_frame(&cipher, &text).unwrap().unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn non_publish_frames_are_skipped() {
        let cipher = EnvelopeCipher::from_hex_key(KEY).unwrap();
        let sub = serde_json::to_string(&SocketFrame::subscribe("mine")).unwrap();
        assert!(decode_frame(&cipher, &sub).unwrap().is_none());
        assert!(decode_frame(&cipher, "not json").is_err());
    }

    #[test]
    fn http_endpoints_map_to_websocket_schemes() {
        let plain = socket_url(&"http://localhost:5001".parse().unwrap()).unwrap();
        assert_eq!(plain.as_str(), "ws://localhost:5001/");

        let tls = socket_url(&"https://relay.example.org/bridge".parse().unwrap()).unwrap();
        assert_eq!(tls.as_str(), "wss://relay.example.org/bridge");

        assert!(socket_url(&"ftp://relay.example.org".parse().unwrap()).is_err());
    }
}
