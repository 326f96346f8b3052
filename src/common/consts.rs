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

//! Core constants for the Deribit adapter.

/// Venue identifier string.
pub const DERIBIT: &str = "DERIBIT";

// Production URLs
pub const DERIBIT_WS_URL: &str = "wss://www.deribit.com/ws/api/v2";

// Testnet URLs
pub const DERIBIT_TESTNET_WS_URL: &str = "wss://test.deribit.com/ws/api/v2";

// JSON-RPC constants
pub const JSONRPC_VERSION: &str = "2.0";

/// Capability scope requested during WebSocket authentication.
pub const DERIBIT_WS_AUTH_SCOPE: &str = "block_rfq:read_write block_trade:read_write trade:read_write custody:read_write account:read_write wallet:read_write mainaccount";

/// Timeout applied to authentication requests, in seconds.
pub const AUTHENTICATION_TIMEOUT_SECS: u64 = 30;

/// Timeout applied to in-flight JSON-RPC requests, in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
