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

//! Session handler task: owns the transport, routes commands and inbound
//! frames, and tracks pending JSON-RPC calls.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use ahash::AHashMap;
use serde_json::Value;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, trace, warn};

use crate::websocket::{
    auth::{AuthState, timestamp_ms},
    enums::{ConnectionState, DeribitRequestKind},
    error::{DeribitWsError, DeribitWsResult},
    messages::{DeribitWsEvent, DeribitWsMessage, parse_raw_message, resolve_response_kind},
    subscription::{DeliveryDecision, SubscriptionRegistry},
    transport::WsTransport,
};

/// Command sent from the client to the handler task.
///
/// All session state (subscriptions, pending calls, the access token) is
/// owned by the handler; the client never touches it directly.
#[derive(Debug)]
pub enum HandlerCommand {
    /// Issue a JSON-RPC call and route its response to `responder`.
    Call {
        /// Request ID the payload was built with.
        id: u64,
        /// Expected response kind, recorded in the pending-call map.
        kind: DeribitRequestKind,
        /// Serialized request frame.
        payload: String,
        /// Awaiting caller; `None` for fire-and-forget calls.
        responder: Option<oneshot::Sender<DeribitWsResult<Value>>>,
    },
    /// Register channels, then issue the subscribe call.
    Subscribe {
        /// Request ID the payload was built with.
        id: u64,
        /// Channels being subscribed.
        channels: Vec<String>,
        /// Serialized request frame.
        payload: String,
        /// Awaiting caller.
        responder: Option<oneshot::Sender<DeribitWsResult<Value>>>,
    },
    /// Remove channels, then issue the unsubscribe call.
    Unsubscribe {
        /// Request ID the payload was built with.
        id: u64,
        /// Channels being removed.
        channels: Vec<String>,
        /// Serialized request frame.
        payload: String,
        /// Awaiting caller.
        responder: Option<oneshot::Sender<DeribitWsResult<Value>>>,
    },
    /// Drop a pending call whose caller stopped waiting.
    Abandon {
        /// Request ID of the abandoned call.
        id: u64,
    },
    /// Shut the session down.
    Disconnect,
}

/// An outbound call awaiting its response.
#[derive(Debug)]
struct PendingCall {
    kind: DeribitRequestKind,
    responder: Option<oneshot::Sender<DeribitWsResult<Value>>>,
}

/// Owns the transport and multiplexes client commands with inbound frames.
///
/// Responses are correlated to callers through a pending-call map keyed by
/// request id; payload-shape classification applies only to frames the map
/// cannot correlate.
#[derive(Debug)]
pub struct DeribitWsHandler {
    transport: WsTransport,
    cmd_rx: mpsc::UnboundedReceiver<HandlerCommand>,
    raw_rx: mpsc::UnboundedReceiver<Message>,
    out_tx: mpsc::UnboundedSender<DeribitWsEvent>,
    state: Arc<AtomicU8>,
    auth_state: Arc<RwLock<Option<AuthState>>>,
    registry: SubscriptionRegistry,
    pending: AHashMap<u64, PendingCall>,
}

impl DeribitWsHandler {
    /// Creates a handler over an established transport.
    pub fn new(
        transport: WsTransport,
        raw_rx: mpsc::UnboundedReceiver<Message>,
        cmd_rx: mpsc::UnboundedReceiver<HandlerCommand>,
        out_tx: mpsc::UnboundedSender<DeribitWsEvent>,
        state: Arc<AtomicU8>,
        auth_state: Arc<RwLock<Option<AuthState>>>,
    ) -> Self {
        Self {
            transport,
            cmd_rx,
            raw_rx,
            out_tx,
            state,
            auth_state,
            registry: SubscriptionRegistry::new(),
            pending: AHashMap::new(),
        }
    }

    /// Runs the session loop until disconnect is requested or the transport
    /// drops, then performs shutdown cleanup.
    pub async fn run(mut self) {
        debug!("Handler task started");
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(HandlerCommand::Disconnect) | None => {
                            debug!("Disconnect requested");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
                raw = self.raw_rx.recv() => {
                    match raw {
                        Some(msg) => {
                            if !self.handle_raw(msg).await {
                                break;
                            }
                        }
                        None => {
                            debug!("Transport reader closed");
                            break;
                        }
                    }
                }
            }
        }
        self.shutdown().await;
    }

    async fn handle_command(&mut self, cmd: HandlerCommand) {
        match cmd {
            HandlerCommand::Call {
                id,
                kind,
                payload,
                responder,
            } => {
                self.issue_call(id, kind, payload, responder).await;
            }
            HandlerCommand::Subscribe {
                id,
                channels,
                payload,
                responder,
            } => {
                for channel in &channels {
                    self.registry.subscribe(channel);
                }
                self.issue_call(id, DeribitRequestKind::Subscribe, payload, responder)
                    .await;
            }
            HandlerCommand::Unsubscribe {
                id,
                channels,
                payload,
                responder,
            } => {
                for channel in &channels {
                    self.registry.unsubscribe(channel);
                }
                self.issue_call(id, DeribitRequestKind::Unsubscribe, payload, responder)
                    .await;
            }
            HandlerCommand::Abandon { id } => self.abandon_call(id),
            HandlerCommand::Disconnect => unreachable!("handled in run loop"),
        }
    }

    async fn issue_call(
        &mut self,
        id: u64,
        kind: DeribitRequestKind,
        payload: String,
        responder: Option<oneshot::Sender<DeribitWsResult<Value>>>,
    ) {
        let state = ConnectionState::from_u8(self.state.load(Ordering::SeqCst));
        if !state.can_send() {
            if let Some(responder) = responder {
                let _ = responder.send(Err(DeribitWsError::NotConnected));
            }
            return;
        }

        if kind == DeribitRequestKind::Auth {
            self.set_state(ConnectionState::Authenticating);
        }

        trace!(id, %kind, "Issuing request");
        self.pending.insert(id, PendingCall { kind, responder });

        if let Err(e) = self.transport.send_text(payload).await {
            warn!(id, %kind, error = %e, "Failed to send request");
            if let Some(call) = self.pending.remove(&id) {
                if let Some(responder) = call.responder {
                    let _ = responder.send(Err(e));
                }
            }
            if kind == DeribitRequestKind::Auth {
                self.set_state(ConnectionState::Open);
            }
        }
    }

    /// Removes a pending call whose caller timed out. A timed-out
    /// authentication returns the state to `Open` so the session does not
    /// sit in `Authenticating` with no request in flight.
    fn abandon_call(&mut self, id: u64) {
        if let Some(call) = self.pending.remove(&id) {
            trace!(id, kind = %call.kind, "Abandoned pending call");
            if call.kind == DeribitRequestKind::Auth
                && ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
                    == ConnectionState::Authenticating
            {
                self.set_state(ConnectionState::Open);
            }
        }
    }

    /// Returns `false` when the session should stop.
    async fn handle_raw(&mut self, msg: Message) -> bool {
        match msg {
            Message::Text(text) => {
                self.process_text(&text).await;
                true
            }
            Message::Ping(payload) => {
                trace!("Ping received, sending pong");
                if let Err(e) = self.transport.send_pong(payload).await {
                    warn!(error = %e, "Failed to send pong");
                }
                true
            }
            Message::Close(frame) => {
                debug!(?frame, "Close frame received");
                false
            }
            Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => true,
        }
    }

    async fn process_text(&mut self, text: &str) {
        let msg = match parse_raw_message(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "Failed to parse inbound frame");
                return;
            }
        };

        match msg {
            DeribitWsMessage::Notification(notification) => {
                match self.registry.evaluate(&notification.channel, &notification.data) {
                    DeliveryDecision::Deliver => {
                        let _ = self.out_tx.send(DeribitWsEvent::Notification(notification));
                    }
                    DeliveryDecision::Duplicate => {
                        trace!(channel = %notification.channel, "Duplicate notification suppressed");
                    }
                    DeliveryDecision::Stale => {
                        trace!(channel = %notification.channel, "Notification for stale channel dropped");
                    }
                }
            }
            DeribitWsMessage::Response(response) => {
                let result = response.result.unwrap_or(Value::Null);
                let tracked = response.id.and_then(|id| self.pending.remove(&id));
                let kind = resolve_response_kind(tracked.as_ref().map(|c| c.kind), &result);

                if kind == Some(DeribitRequestKind::Auth) {
                    self.apply_auth_result(&result).await;
                }

                match tracked.and_then(|c| c.responder) {
                    Some(responder) => {
                        let _ = responder.send(Ok(result));
                    }
                    None => {
                        trace!(?kind, "Result with no awaiting caller");
                        let _ = self.out_tx.send(DeribitWsEvent::Raw(result));
                    }
                }
            }
            DeribitWsMessage::Error { id, error } => {
                let tracked = id.and_then(|id| self.pending.remove(&id));
                if tracked.as_ref().map(|c| c.kind) == Some(DeribitRequestKind::Auth) {
                    error!(code = error.code, message = %error.message, "Authentication failed");
                    self.set_state(ConnectionState::Open);
                }

                match tracked.and_then(|c| c.responder) {
                    Some(responder) => {
                        let _ = responder.send(Err(DeribitWsError::DeribitError {
                            code: error.code,
                            message: error.message,
                        }));
                    }
                    None => {
                        let _ = self.out_tx.send(DeribitWsEvent::Error(error.into()));
                    }
                }
            }
            DeribitWsMessage::Unrecognized(value) => {
                warn!(frame = %value, "Unrecognized frame");
            }
        }
    }

    async fn apply_auth_result(&mut self, result: &Value) {
        let access_token = result
            .get("access_token")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if access_token.is_empty() {
            warn!("Auth result missing access token");
            return;
        }

        let auth = AuthState {
            access_token,
            scope: result
                .get("scope")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            expires_in: result.get("expires_in").and_then(Value::as_u64).unwrap_or(0),
            obtained_at: timestamp_ms(),
        };
        info!(expires_in = auth.expires_in, "Authenticated");
        *self.auth_state.write().await = Some(auth);
        self.set_state(ConnectionState::Authenticated);
    }

    async fn shutdown(&mut self) {
        self.set_state(ConnectionState::Closing);
        self.transport.close().await;

        for (id, call) in self.pending.drain() {
            trace!(id, "Failing pending call on shutdown");
            if let Some(responder) = call.responder {
                let _ = responder.send(Err(DeribitWsError::NotConnected));
            }
        }

        *self.auth_state.write().await = None;
        self.set_state(ConnectionState::Closed);
        debug!("Handler task finished");
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }
}
