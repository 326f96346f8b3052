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

//! Data structures and classification for Deribit WebSocket JSON-RPC messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ustr::Ustr;

pub use crate::common::rpc::{DeribitJsonRpcError, DeribitJsonRpcRequest, DeribitJsonRpcResponse};
use crate::websocket::{enums::DeribitRequestKind, error::DeribitWsError};

// ------------------------------------------------------------------------------------------------
// Outbound request parameters
// ------------------------------------------------------------------------------------------------

/// Authentication request parameters for the `client_signature` grant.
#[derive(Debug, Clone, Serialize)]
pub struct DeribitAuthParams {
    /// Grant type (`client_signature` for HMAC auth).
    pub grant_type: String,
    /// Client ID (API key).
    pub client_id: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    /// HMAC-SHA256 signature, lowercase hex.
    pub signature: String,
    /// Random nonce (8 characters, `[a-z0-9]`).
    pub nonce: String,
    /// Requested capability scope.
    pub scope: String,
}

/// Account summary request parameters.
#[derive(Debug, Clone, Serialize)]
pub struct DeribitAccountSummaryParams {
    /// Currency to summarize (e.g. "BTC").
    pub currency: String,
}

/// Order placement parameters for `private/buy`.
///
/// `price` is serialized only for order types that carry one on the wire
/// (`limit` and `stop_limit`).
#[derive(Debug, Clone, Serialize)]
pub struct DeribitOrderParams {
    /// Instrument name (e.g. "BTC-PERPETUAL").
    pub instrument_name: String,
    /// Access token from authentication.
    pub access_token: String,
    /// Order amount in contracts.
    pub amount: f64,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: crate::websocket::enums::DeribitOrderType,
    /// Custom order label.
    pub label: String,
    /// Time-in-force.
    pub time_in_force: crate::websocket::enums::DeribitTimeInForce,
    /// Whether the order is post-only.
    pub post_only: bool,
    /// Limit price (limit and stop-limit orders only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// Cancel request parameters.
#[derive(Debug, Clone, Serialize)]
pub struct DeribitCancelParams {
    /// The order to cancel.
    pub order_id: String,
}

/// Order book request parameters.
#[derive(Debug, Clone, Serialize)]
pub struct DeribitOrderBookParams {
    /// Instrument name.
    pub instrument_name: String,
    /// Number of levels per side.
    pub depth: u32,
}

/// Order modification parameters for `private/edit`.
#[derive(Debug, Clone, Serialize)]
pub struct DeribitEditParams {
    /// The order to modify.
    pub order_id: String,
    /// New amount.
    pub amount: f64,
    /// New price.
    pub price: f64,
    /// Whether the order is post-only.
    pub post_only: bool,
    /// Whether the order is reduce-only.
    pub reduce_only: bool,
    /// New time-in-force.
    pub time_in_force: crate::websocket::enums::DeribitTimeInForce,
}

/// Positions request parameters.
#[derive(Debug, Clone, Serialize)]
pub struct DeribitPositionsParams {
    /// Currency (e.g. "BTC").
    pub currency: String,
    /// Instrument kind (e.g. "future", "option").
    pub kind: String,
}

/// Subscription request parameters.
#[derive(Debug, Clone, Serialize)]
pub struct DeribitSubscribeParams {
    /// List of channels to subscribe to.
    pub channels: Vec<String>,
}

// ------------------------------------------------------------------------------------------------
// Typed results
// ------------------------------------------------------------------------------------------------

/// Authentication response result.
#[derive(Debug, Clone, Deserialize)]
pub struct DeribitAuthResult {
    /// Access token.
    pub access_token: String,
    /// Token expiration time in seconds.
    #[serde(default)]
    pub expires_in: u64,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: String,
    /// Granted scope.
    #[serde(default)]
    pub scope: String,
    /// Token type (bearer).
    #[serde(default)]
    pub token_type: String,
}

/// Account summary result.
#[derive(Debug, Clone, Deserialize)]
pub struct DeribitAccountSummary {
    /// Account balance.
    pub balance: f64,
    /// Currency of the summary.
    #[serde(default)]
    pub currency: String,
    /// Account equity.
    #[serde(default)]
    pub equity: f64,
    /// Initial margin requirement.
    #[serde(default)]
    pub initial_margin: f64,
    /// Maintenance margin requirement.
    #[serde(default)]
    pub maintenance_margin: f64,
    /// Funds available for trading.
    #[serde(default)]
    pub available_funds: f64,
    /// Margin balance.
    #[serde(default)]
    pub margin_balance: f64,
}

/// Order state as returned in order, cancel, and edit results.
#[derive(Debug, Clone, Deserialize)]
pub struct DeribitOrderData {
    /// Unique order identifier.
    pub order_id: String,
    /// Instrument name.
    #[serde(default)]
    pub instrument_name: Option<Ustr>,
    /// Order direction ("buy" or "sell").
    #[serde(default)]
    pub direction: Option<String>,
    /// Order amount.
    #[serde(default)]
    pub amount: Option<f64>,
    /// Order price.
    #[serde(default)]
    pub price: Option<Value>,
    /// Order type.
    #[serde(default)]
    pub order_type: Option<String>,
    /// Order state (e.g. "open", "filled", "cancelled").
    #[serde(default)]
    pub order_state: Option<String>,
    /// Filled amount.
    #[serde(default)]
    pub filled_amount: Option<f64>,
    /// Average fill price.
    #[serde(default)]
    pub average_price: Option<f64>,
    /// Time-in-force.
    #[serde(default)]
    pub time_in_force: Option<String>,
    /// Whether the order is post-only.
    #[serde(default)]
    pub post_only: Option<bool>,
    /// Whether the order is reduce-only.
    #[serde(default)]
    pub reduce_only: Option<bool>,
    /// Custom label.
    #[serde(default)]
    pub label: Option<String>,
    /// Creation timestamp in milliseconds.
    #[serde(default)]
    pub creation_timestamp: Option<u64>,
    /// Last update timestamp in milliseconds.
    #[serde(default)]
    pub last_update_timestamp: Option<u64>,
}

/// Order placement result (`private/buy`): the order plus any immediate fills.
#[derive(Debug, Clone, Deserialize)]
pub struct DeribitOrderInfo {
    /// The placed order.
    pub order: DeribitOrderData,
    /// Trades executed on placement.
    #[serde(default)]
    pub trades: Vec<Value>,
}

/// Order book snapshot result.
#[derive(Debug, Clone, Deserialize)]
pub struct DeribitOrderBook {
    /// Instrument name.
    #[serde(default)]
    pub instrument_name: Option<Ustr>,
    /// Snapshot timestamp in milliseconds.
    #[serde(default)]
    pub timestamp: u64,
    /// Last trade price.
    #[serde(default)]
    pub last_price: Option<f64>,
    /// Best bid price.
    #[serde(default)]
    pub best_bid_price: Option<f64>,
    /// Best bid amount.
    #[serde(default)]
    pub best_bid_amount: Option<f64>,
    /// Best ask price.
    #[serde(default)]
    pub best_ask_price: Option<f64>,
    /// Best ask amount.
    #[serde(default)]
    pub best_ask_amount: Option<f64>,
    /// Mark price.
    #[serde(default)]
    pub mark_price: Option<f64>,
    /// Open interest.
    #[serde(default)]
    pub open_interest: Option<f64>,
    /// Bid levels as `[price, amount]` pairs, best first.
    #[serde(default)]
    pub bids: Vec<Vec<f64>>,
    /// Ask levels as `[price, amount]` pairs, best first.
    #[serde(default)]
    pub asks: Vec<Vec<f64>>,
}

/// Position result entry.
#[derive(Debug, Clone, Deserialize)]
pub struct DeribitPosition {
    /// Instrument name.
    pub instrument_name: Ustr,
    /// Position size.
    #[serde(default)]
    pub size: f64,
    /// Position direction ("buy", "sell", or "zero").
    #[serde(default)]
    pub direction: Option<String>,
    /// Average entry price.
    #[serde(default)]
    pub average_price: Option<f64>,
    /// Mark price.
    #[serde(default)]
    pub mark_price: Option<f64>,
    /// Total profit and loss.
    #[serde(default)]
    pub total_profit_loss: Option<f64>,
    /// Floating (unrealized) profit and loss.
    #[serde(default)]
    pub floating_profit_loss: Option<f64>,
    /// Realized profit and loss.
    #[serde(default)]
    pub realized_profit_loss: Option<f64>,
    /// Initial margin requirement.
    #[serde(default)]
    pub initial_margin: Option<f64>,
    /// Maintenance margin requirement.
    #[serde(default)]
    pub maintenance_margin: Option<f64>,
    /// Position leverage.
    #[serde(default)]
    pub leverage: Option<f64>,
    /// Estimated liquidation price.
    #[serde(default)]
    pub estimated_liquidation_price: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// Inbound classification
// ------------------------------------------------------------------------------------------------

/// Subscription notification delivered for a streaming channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DeribitNotification {
    /// Channel name.
    pub channel: String,
    /// Channel payload (object, array, or scalar).
    pub data: Value,
}

/// Classified inbound WebSocket frame.
#[derive(Debug, Clone)]
pub enum DeribitWsMessage {
    /// Unsolicited subscription notification.
    Notification(DeribitNotification),
    /// JSON-RPC success response to a request.
    Response(DeribitJsonRpcResponse<Value>),
    /// JSON-RPC error response.
    Error {
        /// Request ID when the venue echoed one.
        id: Option<u64>,
        /// Error details.
        error: DeribitJsonRpcError,
    },
    /// Well-formed JSON that matches no known frame shape.
    Unrecognized(Value),
}

/// Venue error surfaced on the event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeribitWebSocketError {
    /// Error code from Deribit.
    pub code: i64,
    /// Error message.
    pub message: String,
}

impl From<DeribitJsonRpcError> for DeribitWebSocketError {
    fn from(err: DeribitJsonRpcError) -> Self {
        Self {
            code: err.code,
            message: err.message,
        }
    }
}

/// Event emitted to the consumer stream.
#[derive(Debug, Clone)]
pub enum DeribitWsEvent {
    /// Deduplicated channel payload.
    Notification(DeribitNotification),
    /// Error reported by the venue.
    Error(DeribitWebSocketError),
    /// Result with no awaiting caller, forwarded raw.
    Raw(Value),
}

/// Parses a raw JSON frame into a [`DeribitWsMessage`].
///
/// Classification precedence:
/// 1. `method == "subscription"` yields a notification; the channel is
///    accepted either as a bare string or as an object carrying a `name`
///    field, and `data` may be any JSON shape.
/// 2. A frame carrying a `result` field yields a success response.
/// 3. A frame carrying a non-null `error` field yields an error response.
/// 4. Anything else that parses as JSON is `Unrecognized`.
///
/// # Errors
///
/// Returns an error if the text is not valid JSON, or a subscription frame
/// is structurally broken (missing params, channel, or data).
pub fn parse_raw_message(text: &str) -> Result<DeribitWsMessage, DeribitWsError> {
    let value: Value = serde_json::from_str(text).map_err(|e| DeribitWsError::Json(e.to_string()))?;

    if value.get("method").and_then(Value::as_str) == Some("subscription") {
        let params = value
            .get("params")
            .and_then(Value::as_object)
            .ok_or_else(|| DeribitWsError::Parse("subscription frame missing params".to_string()))?;

        let channel = match params.get("channel") {
            Some(Value::String(name)) => name.clone(),
            Some(Value::Object(obj)) => obj
                .get("name")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| DeribitWsError::Parse("channel object missing name".to_string()))?,
            _ => return Err(DeribitWsError::Parse("invalid channel format".to_string())),
        };

        let data = params
            .get("data")
            .cloned()
            .ok_or_else(|| DeribitWsError::Parse(format!("no data field in channel '{channel}'")))?;

        return Ok(DeribitWsMessage::Notification(DeribitNotification { channel, data }));
    }

    if value.get("result").is_some() {
        let response: DeribitJsonRpcResponse<Value> =
            serde_json::from_value(value).map_err(|e| DeribitWsError::Json(e.to_string()))?;
        return Ok(DeribitWsMessage::Response(response));
    }

    if let Some(error) = value.get("error") {
        if !error.is_null() {
            let error: DeribitJsonRpcError = serde_json::from_value(error.clone())
                .map_err(|e| DeribitWsError::Json(e.to_string()))?;
            let id = value.get("id").and_then(Value::as_u64);
            return Ok(DeribitWsMessage::Error { id, error });
        }
    }

    Ok(DeribitWsMessage::Unrecognized(value))
}

/// Infers the response kind from result payload shape.
///
/// This is the fallback path for responses carrying no tracked request id.
/// `access_token` always wins over any co-occurring field. Cancel and edit
/// results are indistinguishable by shape (both expose only `order_id`), so
/// the fallback maps them to [`DeribitRequestKind::Cancel`]; correlation via
/// the pending-call map is the only reliable way to tell them apart.
#[must_use]
pub fn classify_result(result: &Value) -> Option<DeribitRequestKind> {
    if result.get("access_token").is_some() {
        Some(DeribitRequestKind::Auth)
    } else if result.get("balance").is_some() {
        Some(DeribitRequestKind::AccountSummary)
    } else if result.get("order").is_some() {
        Some(DeribitRequestKind::Buy)
    } else if result.get("order_id").is_some() {
        Some(DeribitRequestKind::Cancel)
    } else if result.get("bids").is_some() && result.get("asks").is_some() {
        Some(DeribitRequestKind::OrderBook)
    } else if result.is_array() {
        Some(DeribitRequestKind::Positions)
    } else {
        None
    }
}

/// Resolves the response kind for a result frame.
///
/// The kind tracked for the originating request takes priority; shape
/// inference applies only when the response cannot be correlated.
#[must_use]
pub fn resolve_response_kind(
    tracked: Option<DeribitRequestKind>,
    result: &Value,
) -> Option<DeribitRequestKind> {
    tracked.or_else(|| classify_result(result))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn test_parse_subscription_notification() {
        let json = r#"{
            "jsonrpc": "2.0",
            "method": "subscription",
            "params": {
                "channel": "trades.BTC-PERPETUAL.raw",
                "data": [{"trade_id": "123", "price": 50000.0}]
            }
        }"#;

        let msg = parse_raw_message(json).unwrap();
        match msg {
            DeribitWsMessage::Notification(n) => {
                assert_eq!(n.channel, "trades.BTC-PERPETUAL.raw");
                assert!(n.data.is_array());
            }
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[rstest]
    fn test_parse_notification_channel_object_form() {
        let json = r#"{
            "jsonrpc": "2.0",
            "method": "subscription",
            "params": {
                "channel": {"name": "ticker.BTC-PERPETUAL.100ms"},
                "data": 42
            }
        }"#;

        let msg = parse_raw_message(json).unwrap();
        match msg {
            DeribitWsMessage::Notification(n) => {
                assert_eq!(n.channel, "ticker.BTC-PERPETUAL.100ms");
                assert_eq!(n.data, json!(42));
            }
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[rstest]
    fn test_parse_notification_scalar_and_array_data() {
        for data in ["\"up\"", "true", "[1,2,3]"] {
            let frame = format!(
                r#"{{"jsonrpc":"2.0","method":"subscription","params":{{"channel":"c","data":{data}}}}}"#
            );
            assert!(matches!(
                parse_raw_message(&frame).unwrap(),
                DeribitWsMessage::Notification(_)
            ));
        }
    }

    #[rstest]
    fn test_parse_notification_missing_data_is_error() {
        let json = r#"{
            "jsonrpc": "2.0",
            "method": "subscription",
            "params": {"channel": "ticker.BTC-PERPETUAL.100ms"}
        }"#;

        assert!(matches!(
            parse_raw_message(json),
            Err(DeribitWsError::Parse(_))
        ));
    }

    #[rstest]
    fn test_parse_response() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": 8,
            "result": ["trades.BTC-PERPETUAL.raw"]
        }"#;

        let msg = parse_raw_message(json).unwrap();
        assert!(matches!(msg, DeribitWsMessage::Response(_)));
    }

    #[rstest]
    fn test_parse_error_response() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 10028, "message": "too_many_requests"}
        }"#;

        match parse_raw_message(json).unwrap() {
            DeribitWsMessage::Error { id, error } => {
                assert_eq!(id, Some(1));
                assert_eq!(error.code, 10028);
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[rstest]
    fn test_parse_result_takes_precedence_over_error() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"balance": 1.0},
            "error": {"code": 10028, "message": "too_many_requests"}
        }"#;

        match parse_raw_message(json).unwrap() {
            DeribitWsMessage::Response(response) => {
                assert_eq!(response.result.unwrap()["balance"], 1.0);
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[rstest]
    fn test_parse_null_error_is_unrecognized() {
        let msg = parse_raw_message(r#"{"jsonrpc": "2.0", "id": 2, "error": null}"#).unwrap();
        assert!(matches!(msg, DeribitWsMessage::Unrecognized(_)));
    }

    #[rstest]
    fn test_parse_unrecognized_frame() {
        let msg = parse_raw_message(r#"{"hello": "world"}"#).unwrap();
        assert!(matches!(msg, DeribitWsMessage::Unrecognized(_)));
    }

    #[rstest]
    fn test_parse_invalid_json_is_error() {
        assert!(matches!(
            parse_raw_message("not json"),
            Err(DeribitWsError::Json(_))
        ));
    }

    #[rstest]
    fn test_classify_access_token_wins_over_cooccurring_fields() {
        let result = json!({
            "access_token": "abc",
            "balance": 10.0,
            "order": {"order_id": "x"},
            "order_id": "x"
        });

        assert_eq!(classify_result(&result), Some(DeribitRequestKind::Auth));
    }

    #[rstest]
    fn test_classify_precedence_chain() {
        assert_eq!(
            classify_result(&json!({"balance": 1.0, "order_id": "x"})),
            Some(DeribitRequestKind::AccountSummary)
        );
        assert_eq!(
            classify_result(&json!({"order": {"order_id": "x"}})),
            Some(DeribitRequestKind::Buy)
        );
        assert_eq!(
            classify_result(&json!({"order_id": "x"})),
            Some(DeribitRequestKind::Cancel)
        );
        assert_eq!(
            classify_result(&json!({"bids": [], "asks": []})),
            Some(DeribitRequestKind::OrderBook)
        );
        assert_eq!(
            classify_result(&json!([{"instrument_name": "BTC-PERPETUAL"}])),
            Some(DeribitRequestKind::Positions)
        );
        assert_eq!(classify_result(&json!({"other": true})), None);
    }

    #[rstest]
    fn test_resolve_kind_prefers_tracked_over_shape() {
        // Cancel and edit results share the same shape; only the tracked
        // kind can disambiguate them.
        let result = json!({"order_id": "ETH-1234"});

        assert_eq!(
            resolve_response_kind(Some(DeribitRequestKind::Edit), &result),
            Some(DeribitRequestKind::Edit)
        );
        assert_eq!(
            resolve_response_kind(None, &result),
            Some(DeribitRequestKind::Cancel)
        );
    }

    #[rstest]
    fn test_order_params_price_serialization() {
        use crate::websocket::enums::{DeribitOrderType, DeribitTimeInForce};

        let mut params = DeribitOrderParams {
            instrument_name: "BTC-PERPETUAL".to_string(),
            access_token: "token".to_string(),
            amount: 10.0,
            order_type: DeribitOrderType::Market,
            label: "test".to_string(),
            time_in_force: DeribitTimeInForce::GoodTilCancelled,
            post_only: false,
            price: None,
        };

        let value = serde_json::to_value(&params).unwrap();
        assert!(value.get("price").is_none());
        assert_eq!(value["type"], "market");

        params.order_type = DeribitOrderType::Limit;
        params.price = Some(50_000.0);
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["price"], 50_000.0);
        assert_eq!(value["type"], "limit");
    }

    #[rstest]
    fn test_auth_result_deserialization() {
        let result: DeribitAuthResult = serde_json::from_value(json!({
            "access_token": "abc123",
            "expires_in": 900,
            "refresh_token": "def456",
            "scope": "session:test",
            "token_type": "bearer"
        }))
        .unwrap();

        assert_eq!(result.access_token, "abc123");
        assert_eq!(result.expires_in, 900);
    }

    #[rstest]
    fn test_positions_deserialization() {
        let positions: Vec<DeribitPosition> = serde_json::from_value(json!([
            {
                "instrument_name": "BTC-PERPETUAL",
                "size": 100.0,
                "direction": "buy",
                "average_price": 49_000.0
            }
        ]))
        .unwrap();

        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].instrument_name.as_str(), "BTC-PERPETUAL");
        assert_eq!(positions[0].size, 100.0);
    }
}
