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

//! WebSocket transport: connection establishment, reader task, and shutdown.

use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::protocol::{Message, frame::coding::CloseCode, frame::CloseFrame},
};
use tracing::{debug, trace, warn};

use crate::websocket::error::{DeribitWsError, DeribitWsResult};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Owned half of an established WebSocket connection.
///
/// Holds the write sink; inbound frames are pumped by a spawned reader task
/// into the channel returned from [`WsTransport::connect`]. The reader exits
/// when the peer closes, the stream errors, or [`WsTransport::close`] signals
/// shutdown.
pub struct WsTransport {
    writer: WsSink,
    shutdown_tx: watch::Sender<bool>,
    reader_handle: Option<JoinHandle<()>>,
    closed: bool,
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(WsTransport))
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl WsTransport {
    /// Connects to `url` and returns the transport together with the channel
    /// of inbound frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP/TLS connection or WebSocket handshake fails.
    pub async fn connect(url: &str) -> DeribitWsResult<(Self, mpsc::UnboundedReceiver<Message>)> {
        debug!(url, "Connecting to WebSocket");
        let (stream, response) = connect_async(url).await?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        let (writer, mut reader) = stream.split();
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let reader_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        trace!("Reader task received shutdown signal");
                        break;
                    }
                    msg = reader.next() => {
                        match msg {
                            Some(Ok(msg)) => {
                                if raw_tx.send(msg).is_err() {
                                    trace!("Raw channel closed, stopping reader");
                                    break;
                                }
                            }
                            Some(Err(e)) => {
                                warn!(error = %e, "WebSocket read error");
                                break;
                            }
                            None => {
                                debug!("WebSocket stream ended");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok((
            Self {
                writer,
                shutdown_tx,
                reader_handle: Some(reader_handle),
                closed: false,
            },
            raw_rx,
        ))
    }

    /// Sends a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`DeribitWsError::NotConnected`] after close, or a send error
    /// if the sink rejects the frame.
    pub async fn send_text(&mut self, text: String) -> DeribitWsResult<()> {
        if self.closed {
            return Err(DeribitWsError::NotConnected);
        }
        self.writer
            .send(Message::Text(text))
            .await
            .map_err(|e| DeribitWsError::Send(e.to_string()))
    }

    /// Sends a pong frame in reply to a server ping.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects the frame.
    pub async fn send_pong(&mut self, payload: Vec<u8>) -> DeribitWsResult<()> {
        if self.closed {
            return Err(DeribitWsError::NotConnected);
        }
        self.writer
            .send(Message::Pong(payload))
            .await
            .map_err(|e| DeribitWsError::Send(e.to_string()))
    }

    /// Closes the connection: sends a close frame, stops the reader task,
    /// and waits for it to finish. Idempotent.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let close_frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "client shutdown".into(),
        };
        if let Err(e) = self.writer.send(Message::Close(Some(close_frame))).await {
            trace!(error = %e, "Error sending close frame");
        }

        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.reader_handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Reader task join error");
            }
        }
        debug!("WebSocket transport closed");
    }
}
