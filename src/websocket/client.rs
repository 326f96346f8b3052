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

//! Provides the Deribit WebSocket client integration.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::Context;
use futures_util::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::{
    sync::{Mutex, RwLock, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    common::{
        consts::{
            AUTHENTICATION_TIMEOUT_SECS, DERIBIT_TESTNET_WS_URL, DERIBIT_WS_URL,
            REQUEST_TIMEOUT_SECS,
        },
        credential::Credential,
        rpc::DeribitJsonRpcRequest,
    },
    websocket::{
        auth::{AuthState, build_auth_params},
        enums::{ConnectionState, DeribitOrderType, DeribitRequestKind, DeribitTimeInForce},
        error::{DeribitWsError, DeribitWsResult},
        handler::{DeribitWsHandler, HandlerCommand},
        messages::{
            DeribitAccountSummary, DeribitAccountSummaryParams, DeribitAuthResult,
            DeribitCancelParams, DeribitEditParams, DeribitOrderBook, DeribitOrderBookParams,
            DeribitOrderData, DeribitOrderInfo, DeribitOrderParams, DeribitPosition,
            DeribitPositionsParams, DeribitSubscribeParams, DeribitWsEvent,
        },
        transport::WsTransport,
    },
};

/// WebSocket client for the Deribit JSON-RPC v2 API.
///
/// The client is a thin facade: all session state lives in a handler task
/// which owns the transport. Request/response correlation uses per-request
/// oneshot channels with bounded timeouts.
pub struct DeribitWebSocketClient {
    url: String,
    credential: Option<Credential>,
    state: Arc<AtomicU8>,
    auth_state: Arc<RwLock<Option<AuthState>>>,
    request_id: AtomicU64,
    cmd_tx: Option<mpsc::UnboundedSender<HandlerCommand>>,
    out_rx: Option<mpsc::UnboundedReceiver<DeribitWsEvent>>,
    task_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for DeribitWebSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(DeribitWebSocketClient))
            .field("url", &self.url)
            .field(
                "api_key",
                &self.credential.as_ref().map(Credential::api_key_masked),
            )
            .finish_non_exhaustive()
    }
}

impl DeribitWebSocketClient {
    /// Creates a new [`DeribitWebSocketClient`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if only one of `api_key` / `api_secret` is provided.
    pub fn new(
        url: Option<String>,
        api_key: Option<String>,
        api_secret: Option<String>,
        is_testnet: bool,
    ) -> anyhow::Result<Self> {
        let credential = match (api_key, api_secret) {
            (Some(key), Some(secret)) => Some(Credential::new(key, secret)),
            (None, None) => None,
            _ => anyhow::bail!("Both api_key and api_secret must be provided together"),
        };

        let default_url = if is_testnet {
            DERIBIT_TESTNET_WS_URL
        } else {
            DERIBIT_WS_URL
        };

        Ok(Self {
            url: url.unwrap_or_else(|| default_url.to_string()),
            credential,
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected.as_u8())),
            auth_state: Arc::new(RwLock::new(None)),
            request_id: AtomicU64::new(1),
            cmd_tx: None,
            out_rx: None,
            task_handle: Arc::new(Mutex::new(None)),
        })
    }

    /// Creates a client without credentials (public endpoints only).
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` mirrors [`Self::new`].
    pub fn new_public(url: Option<String>, is_testnet: bool) -> anyhow::Result<Self> {
        Self::new(url, None, None, is_testnet)
    }

    /// Creates a client with credentials from environment variables:
    /// `DERIBIT_API_KEY` / `DERIBIT_API_SECRET`, or the `DERIBIT_TESTNET_*`
    /// variants when `is_testnet` is true.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is unset.
    pub fn with_credentials(url: Option<String>, is_testnet: bool) -> anyhow::Result<Self> {
        let (key_var, secret_var) = if is_testnet {
            ("DERIBIT_TESTNET_API_KEY", "DERIBIT_TESTNET_API_SECRET")
        } else {
            ("DERIBIT_API_KEY", "DERIBIT_API_SECRET")
        };
        let api_key = std::env::var(key_var).context(key_var)?;
        let api_secret = std::env::var(secret_var).context(secret_var)?;
        Self::new(url, Some(api_key), Some(api_secret), is_testnet)
    }

    /// Returns the WebSocket URL this client connects to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Returns whether the session is open (authenticated or not).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.connection_state().can_send()
    }

    /// Returns whether the session holds a valid access token.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.connection_state() == ConnectionState::Authenticated
    }

    /// Returns the current access token, if authenticated.
    pub async fn access_token(&self) -> Option<String> {
        self.auth_state
            .read()
            .await
            .as_ref()
            .map(|auth| auth.access_token.clone())
    }

    /// Waits until the session becomes active, polling every 10ms.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not active within `timeout_secs`.
    pub async fn wait_until_active(&self, timeout_secs: f64) -> DeribitWsResult<()> {
        let timeout = Duration::from_secs_f64(timeout_secs);
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.is_active() {
            if tokio::time::Instant::now() >= deadline {
                return Err(DeribitWsError::Timeout(format!(
                    "Client did not become active within {timeout_secs}s"
                )));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    /// Connects to the venue and spawns the session handler task.
    ///
    /// # Errors
    ///
    /// Returns an error if the WebSocket handshake fails.
    pub async fn connect(&mut self) -> DeribitWsResult<()> {
        if self.is_active() {
            warn!("Already connected");
            return Ok(());
        }

        self.state
            .store(ConnectionState::Connecting.as_u8(), Ordering::SeqCst);

        let (transport, raw_rx) = match WsTransport::connect(&self.url).await {
            Ok(parts) => parts,
            Err(e) => {
                self.state
                    .store(ConnectionState::Disconnected.as_u8(), Ordering::SeqCst);
                return Err(e);
            }
        };

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let handler = DeribitWsHandler::new(
            transport,
            raw_rx,
            cmd_rx,
            out_tx,
            Arc::clone(&self.state),
            Arc::clone(&self.auth_state),
        );
        let handle = tokio::spawn(handler.run());

        self.state
            .store(ConnectionState::Open.as_u8(), Ordering::SeqCst);
        self.cmd_tx = Some(cmd_tx);
        self.out_rx = Some(out_rx);
        *self.task_handle.lock().await = Some(handle);

        info!(url = %self.url, "Connected");
        Ok(())
    }

    /// Closes the session and waits for the handler task to finish.
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler task panicked.
    pub async fn close(&self) -> DeribitWsResult<()> {
        let state = self.connection_state();
        if matches!(
            state,
            ConnectionState::Disconnected | ConnectionState::Closing | ConnectionState::Closed
        ) {
            debug!("Already closed");
            return Ok(());
        }

        self.state
            .store(ConnectionState::Closing.as_u8(), Ordering::SeqCst);

        if let Some(cmd_tx) = &self.cmd_tx {
            let _ = cmd_tx.send(HandlerCommand::Disconnect);
        }

        let handle = self.task_handle.lock().await.take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| DeribitWsError::ClientError(format!("Handler task failed: {e}")))?;
        }

        info!("Closed");
        Ok(())
    }

    /// Authenticates the session with the `client_signature` grant.
    ///
    /// # Errors
    ///
    /// Returns an error if no credentials are configured, the venue rejects
    /// the signature, or no response arrives within the auth timeout.
    pub async fn authenticate(&self) -> DeribitWsResult<DeribitAuthResult> {
        let credential = self.credential.as_ref().ok_or_else(|| {
            DeribitWsError::Authentication("No credentials configured".to_string())
        })?;

        let params = build_auth_params(credential);
        let result = self
            .request(
                DeribitRequestKind::Auth,
                "public/auth",
                params,
                AUTHENTICATION_TIMEOUT_SECS,
            )
            .await?;

        serde_json::from_value(result)
            .map_err(|e| DeribitWsError::Authentication(format!("Invalid auth result: {e}")))
    }

    /// Requests the account summary for `currency`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or times out.
    pub async fn get_account_summary(
        &self,
        currency: &str,
    ) -> DeribitWsResult<DeribitAccountSummary> {
        let params = DeribitAccountSummaryParams {
            currency: currency.to_string(),
        };
        let result = self
            .request(
                DeribitRequestKind::AccountSummary,
                "private/get_account_summary",
                params,
                REQUEST_TIMEOUT_SECS,
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Places a buy order.
    ///
    /// `price` is required for limit and stop-limit order types and ignored
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not authenticated, a required
    /// price is missing, or the venue rejects the order.
    #[allow(clippy::too_many_arguments)]
    pub async fn buy(
        &self,
        instrument_name: &str,
        amount: f64,
        order_type: DeribitOrderType,
        price: Option<f64>,
        label: &str,
        time_in_force: DeribitTimeInForce,
        post_only: bool,
    ) -> DeribitWsResult<DeribitOrderInfo> {
        if order_type.requires_price() && price.is_none() {
            return Err(DeribitWsError::ClientError(format!(
                "Order type {order_type:?} requires a price"
            )));
        }

        let access_token = self.access_token().await.ok_or_else(|| {
            DeribitWsError::Authentication("Not authenticated".to_string())
        })?;

        let params = DeribitOrderParams {
            instrument_name: instrument_name.to_string(),
            access_token,
            amount,
            order_type,
            label: label.to_string(),
            time_in_force,
            post_only,
            price: if order_type.requires_price() {
                price
            } else {
                None
            },
        };

        let result = self
            .request(
                DeribitRequestKind::Buy,
                "private/buy",
                params,
                REQUEST_TIMEOUT_SECS,
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Cancels an order by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is unknown or the request fails.
    pub async fn cancel(&self, order_id: &str) -> DeribitWsResult<DeribitOrderData> {
        let params = DeribitCancelParams {
            order_id: order_id.to_string(),
        };
        let result = self
            .request(
                DeribitRequestKind::Cancel,
                "private/cancel",
                params,
                REQUEST_TIMEOUT_SECS,
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Modifies an existing order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is unknown or the request fails.
    pub async fn edit(
        &self,
        order_id: &str,
        amount: f64,
        price: f64,
        post_only: bool,
        reduce_only: bool,
        time_in_force: DeribitTimeInForce,
    ) -> DeribitWsResult<DeribitOrderData> {
        let params = DeribitEditParams {
            order_id: order_id.to_string(),
            amount,
            price,
            post_only,
            reduce_only,
            time_in_force,
        };
        let result = self
            .request(
                DeribitRequestKind::Edit,
                "private/edit",
                params,
                REQUEST_TIMEOUT_SECS,
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Requests an order book snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the instrument is unknown or the request fails.
    pub async fn get_order_book(
        &self,
        instrument_name: &str,
        depth: u32,
    ) -> DeribitWsResult<DeribitOrderBook> {
        let params = DeribitOrderBookParams {
            instrument_name: instrument_name.to_string(),
            depth,
        };
        let result = self
            .request(
                DeribitRequestKind::OrderBook,
                "public/get_order_book",
                params,
                REQUEST_TIMEOUT_SECS,
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Requests open positions for `currency`; `kind` defaults to "future".
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or times out.
    pub async fn get_positions(
        &self,
        currency: &str,
        kind: Option<&str>,
    ) -> DeribitWsResult<Vec<DeribitPosition>> {
        let params = DeribitPositionsParams {
            currency: currency.to_string(),
            kind: kind.unwrap_or("future").to_string(),
        };
        let result = self
            .request(
                DeribitRequestKind::Positions,
                "private/get_positions",
                params,
                REQUEST_TIMEOUT_SECS,
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Subscribes to the given channels and waits for confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or times out.
    pub async fn subscribe(&self, channels: Vec<String>) -> DeribitWsResult<()> {
        self.channel_request(DeribitRequestKind::Subscribe, "public/subscribe", channels)
            .await
    }

    /// Unsubscribes from the given channels and waits for confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or times out.
    pub async fn unsubscribe(&self, channels: Vec<String>) -> DeribitWsResult<()> {
        self.channel_request(
            DeribitRequestKind::Unsubscribe,
            "public/unsubscribe",
            channels,
        )
        .await
    }

    /// Returns the stream of session events (notifications, venue errors,
    /// uncorrelated results).
    ///
    /// # Panics
    ///
    /// Panics if called before [`Self::connect`] or more than once per
    /// connection.
    pub fn stream(&mut self) -> impl Stream<Item = DeribitWsEvent> + 'static {
        let mut out_rx = self
            .out_rx
            .take()
            .expect("Stream receiver already taken or client not connected");

        async_stream::stream! {
            while let Some(event) = out_rx.recv().await {
                yield event;
            }
        }
    }

    async fn channel_request(
        &self,
        kind: DeribitRequestKind,
        method: &str,
        channels: Vec<String>,
    ) -> DeribitWsResult<()> {
        let cmd_tx = self.cmd_tx.as_ref().ok_or(DeribitWsError::NotConnected)?;
        let id = self.next_request_id();
        let params = DeribitSubscribeParams {
            channels: channels.clone(),
        };
        let payload = serde_json::to_string(&DeribitJsonRpcRequest::new(id, method, params))?;

        let (responder, rx) = oneshot::channel();
        let cmd = match kind {
            DeribitRequestKind::Subscribe => HandlerCommand::Subscribe {
                id,
                channels,
                payload,
                responder: Some(responder),
            },
            DeribitRequestKind::Unsubscribe => HandlerCommand::Unsubscribe {
                id,
                channels,
                payload,
                responder: Some(responder),
            },
            _ => unreachable!("channel_request only handles subscription kinds"),
        };
        cmd_tx.send(cmd).map_err(|_| DeribitWsError::NotConnected)?;

        self.await_response(rx, id, method, REQUEST_TIMEOUT_SECS).await?;
        Ok(())
    }

    async fn request<T: Serialize>(
        &self,
        kind: DeribitRequestKind,
        method: &str,
        params: T,
        timeout_secs: u64,
    ) -> DeribitWsResult<Value> {
        let cmd_tx = self.cmd_tx.as_ref().ok_or(DeribitWsError::NotConnected)?;
        let id = self.next_request_id();
        let payload = serde_json::to_string(&DeribitJsonRpcRequest::new(id, method, params))?;

        let (responder, rx) = oneshot::channel();
        cmd_tx
            .send(HandlerCommand::Call {
                id,
                kind,
                payload,
                responder: Some(responder),
            })
            .map_err(|_| DeribitWsError::NotConnected)?;

        self.await_response(rx, id, method, timeout_secs).await
    }

    async fn await_response(
        &self,
        rx: oneshot::Receiver<DeribitWsResult<Value>>,
        id: u64,
        method: &str,
        timeout_secs: u64,
    ) -> DeribitWsResult<Value> {
        match tokio::time::timeout(Duration::from_secs(timeout_secs), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DeribitWsError::NotConnected),
            Err(_) => {
                // Tell the handler to drop the pending entry; a timed-out
                // auth call also returns the state to Open.
                if let Some(cmd_tx) = &self.cmd_tx {
                    let _ = cmd_tx.send(HandlerCommand::Abandon { id });
                }
                Err(DeribitWsError::Timeout(format!(
                    "No response to {method} within {timeout_secs}s"
                )))
            }
        }
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }
}
