// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC messages exchanged with the remote signer, addressed by topic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const JSONRPC_VERSION: &str = "2.0";

/// A message routed through the relay to the subscriber of `topic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub message: RpcMessage,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, message: impl Into<RpcMessage>) -> Self {
        Self {
            topic: topic.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcMessage {
    Request(RpcRequest),
    Response(RpcResponse),
}

impl From<RpcRequest> for RpcMessage {
    fn from(value: RpcRequest) -> Self {
        RpcMessage::Request(value)
    }
}

impl From<RpcResponse> for RpcMessage {
    fn from(value: RpcResponse) -> Self {
        RpcMessage::Response(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
            }),
        }
    }

    /// The result payload, or the remote error object.
    pub fn into_result(self) -> Result<Value, RpcErrorObject> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}
