// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! JSON-RPC 2.0 protocol envelopes used by the WebSocket interface.

use serde::{Deserialize, Serialize};

use crate::common::consts::JSONRPC_VERSION;

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct DeribitJsonRpcRequest<T> {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: &'static str,
    /// Request ID for correlation.
    pub id: u64,
    /// JSON-RPC method name.
    pub method: String,
    /// Method-specific parameters.
    pub params: T,
}

impl<T> DeribitJsonRpcRequest<T> {
    /// Creates a new JSON-RPC request.
    #[must_use]
    pub fn new(id: u64, method: impl Into<String>, params: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeribitJsonRpcResponse<T> {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID (present for request responses).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Success result (mutually exclusive with error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    /// Error details (mutually exclusive with result).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DeribitJsonRpcError>,
    /// Whether this is from testnet.
    #[serde(default)]
    pub testnet: bool,
    /// Server receive timestamp (microseconds).
    #[serde(rename = "usIn")]
    pub us_in: Option<u64>,
    /// Server send timestamp (microseconds).
    #[serde(rename = "usOut")]
    pub us_out: Option<u64>,
    /// Processing time difference (microseconds).
    #[serde(rename = "usDiff")]
    pub us_diff: Option<u64>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeribitJsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Additional error data.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn test_request_serialization() {
        let request = DeribitJsonRpcRequest::new(8, "public/subscribe", json!({"channels": ["ticker.BTC-PERPETUAL.100ms"]}));
        let value: serde_json::Value = serde_json::from_str(&serde_json::to_string(&request).unwrap()).unwrap();

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 8);
        assert_eq!(value["method"], "public/subscribe");
        assert_eq!(value["params"]["channels"][0], "ticker.BTC-PERPETUAL.100ms");
    }

    #[rstest]
    fn test_response_deserialization() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"access_token": "abc"},
            "testnet": true,
            "usIn": 1234567890,
            "usOut": 1234567891,
            "usDiff": 1
        }"#;

        let response: DeribitJsonRpcResponse<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert_eq!(response.id, Some(1));
        assert!(response.error.is_none());
        assert!(response.testnet);
        assert_eq!(response.result.unwrap()["access_token"], "abc");
    }

    #[rstest]
    fn test_error_deserialization() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": 3,
            "error": {"code": 13004, "message": "invalid_credentials"}
        }"#;

        let response: DeribitJsonRpcResponse<serde_json::Value> = serde_json::from_str(json).unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, 13004);
        assert_eq!(error.message, "invalid_credentials");
    }
}
