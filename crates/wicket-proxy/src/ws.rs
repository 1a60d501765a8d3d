//! WebSocket forwarding.
//!
//! Bridges an accepted client socket to an upstream backend socket with
//! two concurrent copy loops, running until either side closes. Transport
//! errors close the client with code 1011.

use axum::extract::ws::{CloseFrame, Message as ClientMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use http::HeaderMap;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
#[cfg(feature = "tracing")]
use tracing::debug;

use crate::error::ProxyError;
use crate::forward::{is_hop_by_hop, ForwardService};

/// Close code for upstream failures.
const INTERNAL_ERROR: u16 = 1011;

/// Rewrites a backend HTTP URL to its WebSocket scheme.
pub fn websocket_url(server: &str, path: &str, query: Option<&str>) -> String {
    let base = if let Some(rest) = server.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = server.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        server.to_string()
    };
    let mut url = format!("{}{}", base.trim_end_matches('/'), path);
    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }
    url
}

fn forwardable(name: &http::header::HeaderName) -> bool {
    // The handshake owns host and the sec-websocket-* family.
    !is_hop_by_hop(name)
        && *name != http::header::HOST
        && !name.as_str().starts_with("sec-websocket-")
}

impl ForwardService {
    /// Forwards an accepted client WebSocket to the next chosen backend.
    ///
    /// Returns once either side closes or fails; the client socket is
    /// closed with 1011 when the upstream connection cannot be
    /// established or breaks.
    pub async fn forward_websocket(
        &self,
        mut client: WebSocket,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
    ) {
        let server = self.balancer().choose().to_string();
        let target = websocket_url(&server, path, query);

        #[cfg(feature = "tracing")]
        debug!(url = %target, "forwarding websocket upstream");

        let upstream = match self.connect_upstream(&target, headers).await {
            Ok(upstream) => upstream,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                debug!(url = %target, error = %_err, "websocket upstream connect failed");

                let _ = client
                    .send(ClientMessage::Close(Some(CloseFrame {
                        code: INTERNAL_ERROR,
                        reason: "Proxy error".into(),
                    })))
                    .await;
                return;
            }
        };

        let (mut up_tx, mut up_rx) = upstream.split();
        let (mut cl_tx, mut cl_rx) = client.split();

        loop {
            tokio::select! {
                inbound = cl_rx.next() => match inbound {
                    Some(Ok(ClientMessage::Text(text))) => {
                        if up_tx.send(UpstreamMessage::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(ClientMessage::Binary(bytes))) => {
                        if up_tx.send(UpstreamMessage::Binary(bytes)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(ClientMessage::Close(_))) | None => {
                        let _ = up_tx.send(UpstreamMessage::Close(None)).await;
                        break;
                    }
                    Some(Ok(_ping_or_pong)) => {}
                    Some(Err(_)) => {
                        let _ = up_tx.send(UpstreamMessage::Close(None)).await;
                        break;
                    }
                },
                outbound = up_rx.next() => match outbound {
                    Some(Ok(UpstreamMessage::Text(text))) => {
                        if cl_tx.send(ClientMessage::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(UpstreamMessage::Binary(bytes))) => {
                        if cl_tx.send(ClientMessage::Binary(bytes)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(UpstreamMessage::Close(_))) | None => {
                        let _ = cl_tx.send(ClientMessage::Close(None)).await;
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => {
                        let _ = cl_tx
                            .send(ClientMessage::Close(Some(CloseFrame {
                                code: INTERNAL_ERROR,
                                reason: "Proxy error".into(),
                            })))
                            .await;
                        break;
                    }
                },
            }
        }
    }

    async fn connect_upstream(
        &self,
        target: &str,
        headers: &HeaderMap,
    ) -> Result<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        ProxyError,
    > {
        let mut request = target
            .into_client_request()
            .map_err(|_| ProxyError::InvalidTarget(target.to_string()))?;

        for (name, value) in headers {
            if forwardable(name) {
                request.headers_mut().append(name.clone(), value.clone());
            }
        }

        let (upstream, _response) = connect_async(request)
            .await
            .map_err(|err| ProxyError::Upstream(err.to_string()))?;
        Ok(upstream)
    }
}
