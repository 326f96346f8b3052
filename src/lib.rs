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

//! [Deribit](https://www.deribit.com) crypto derivatives exchange integration.
//!
//! This crate provides an asynchronous WebSocket client for the Deribit
//! JSON-RPC v2 API:
//!
//! - Session lifecycle with explicit connection states.
//! - Challenge-response authentication (`client_signature` grant) with
//!   HMAC-SHA256 request signing.
//! - Trading operations: order placement, modification, and cancellation.
//! - Account queries: summary, positions, and order book snapshots.
//! - Channel subscriptions with duplicate-notification suppression.
//!
//! All session state is owned by a single handler task; the client correlates
//! requests to responses through per-request channels with bounded timeouts.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod common;
pub mod websocket;

pub use crate::{
    common::credential::Credential,
    websocket::{
        client::DeribitWebSocketClient,
        enums::{ConnectionState, DeribitOrderType, DeribitTimeInForce},
        error::{DeribitWsError, DeribitWsResult},
        messages::{DeribitWsEvent, DeribitWsMessage},
    },
};
