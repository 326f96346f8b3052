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

//! Enumerations for connection lifecycle, order parameters, and request routing.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Lifecycle state of the WebSocket session.
///
/// Stored as a `u8` in an atomic shared between the client and the handler
/// task. Progression is monotonic; `Closed` is terminal.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// No socket established.
    #[default]
    Disconnected = 0,
    /// Connection attempt in flight.
    Connecting = 1,
    /// Socket open, not authenticated.
    Open = 2,
    /// Authentication request in flight.
    Authenticating = 3,
    /// Access token held.
    Authenticated = 4,
    /// Shutdown requested, receive loop still draining.
    Closing = 5,
    /// Session terminated (terminal).
    Closed = 6,
}

impl ConnectionState {
    /// Returns the numeric representation for atomic storage.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts from the numeric representation.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Authenticating,
            4 => Self::Authenticated,
            5 => Self::Closing,
            6 => Self::Closed,
            _ => Self::Disconnected,
        }
    }

    /// Returns whether outbound frames may be sent in this state.
    #[must_use]
    pub const fn can_send(self) -> bool {
        matches!(self, Self::Open | Self::Authenticating | Self::Authenticated)
    }
}

/// Deribit order types.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeribitOrderType {
    /// Limit order (requires a price).
    #[default]
    Limit,
    /// Market order.
    Market,
    /// Stop-limit order (requires a price).
    StopLimit,
    /// Stop-market order.
    StopMarket,
}

impl DeribitOrderType {
    /// Returns whether this order type carries a `price` field on the wire.
    #[must_use]
    pub const fn requires_price(&self) -> bool {
        matches!(self, Self::Limit | Self::StopLimit)
    }
}

/// Deribit time-in-force values.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeribitTimeInForce {
    /// Remains active until cancelled.
    #[default]
    GoodTilCancelled,
    /// Remains active until the end of the trading day.
    GoodTilDay,
    /// Executes in full immediately or cancels.
    FillOrKill,
    /// Executes immediately for available quantity, cancels the rest.
    ImmediateOrCancel,
}

/// Expected response kind for an outbound JSON-RPC call.
///
/// Each request is tagged with its kind at issue time and tracked in a
/// pending-call map keyed by request id, so responses are routed by
/// correlation rather than payload-shape guessing. Shape inference remains
/// only as a fallback for responses with no tracked id.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, AsRefStr, EnumIter)]
pub enum DeribitRequestKind {
    /// `public/auth`.
    Auth,
    /// `private/get_account_summary`.
    AccountSummary,
    /// `private/buy`.
    Buy,
    /// `private/cancel`.
    Cancel,
    /// `public/get_order_book`.
    OrderBook,
    /// `private/edit`.
    Edit,
    /// `private/get_positions`.
    Positions,
    /// `public/subscribe`.
    Subscribe,
    /// `public/unsubscribe`.
    Unsubscribe,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_connection_state_roundtrip() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Authenticating,
            ConnectionState::Authenticated,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
    }

    #[rstest]
    fn test_connection_state_can_send() {
        assert!(!ConnectionState::Disconnected.can_send());
        assert!(!ConnectionState::Connecting.can_send());
        assert!(ConnectionState::Open.can_send());
        assert!(ConnectionState::Authenticating.can_send());
        assert!(ConnectionState::Authenticated.can_send());
        assert!(!ConnectionState::Closing.can_send());
        assert!(!ConnectionState::Closed.can_send());
    }

    #[rstest]
    #[case(DeribitOrderType::Limit, true)]
    #[case(DeribitOrderType::Market, false)]
    #[case(DeribitOrderType::StopLimit, true)]
    #[case(DeribitOrderType::StopMarket, false)]
    fn test_order_type_requires_price(#[case] order_type: DeribitOrderType, #[case] expected: bool) {
        assert_eq!(order_type.requires_price(), expected);
    }

    #[rstest]
    fn test_wire_serialization() {
        assert_eq!(serde_json::to_string(&DeribitOrderType::StopLimit).unwrap(), "\"stop_limit\"");
        assert_eq!(
            serde_json::to_string(&DeribitTimeInForce::GoodTilCancelled).unwrap(),
            "\"good_til_cancelled\""
        );
    }
}
