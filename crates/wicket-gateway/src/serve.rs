//! The axum server edge: buffers inbound bodies, dispatches through the
//! gateway, streams outbound bodies back in ~8 KiB chunks, and upgrades
//! WebSocket requests into the proxy bridge.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use http::{Request, StatusCode};
use tokio::net::TcpListener;
use wicket_core::{GatewayRequest, GatewayResponse};

use crate::gateway::Gateway;

const CHUNK_SIZE: usize = 8 * 1024;

/// Builds an axum router that hands every request to `gateway`.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(gateway)
}

/// Serves `gateway` on `listener` until the socket closes.
pub async fn serve(gateway: Arc<Gateway>, listener: TcpListener) -> std::io::Result<()> {
    axum::serve(listener, router(gateway)).await
}

/// Serves `gateway` on `listener` until `shutdown` resolves, then drains
/// in-flight requests and closes gateway resources.
pub async fn serve_with_shutdown<F>(
    gateway: Arc<Gateway>,
    listener: TcpListener,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let result = axum::serve(listener, router(Arc::clone(&gateway)))
        .with_graceful_shutdown(shutdown)
        .await;
    gateway.close().await;
    result
}

async fn dispatch(State(gateway): State<Arc<Gateway>>, req: Request<Body>) -> Response {
    if is_websocket_upgrade(&req) {
        return upgrade_websocket(gateway, req).await;
    }

    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "failed to read request body").into_response()
        }
    };

    let request = GatewayRequest {
        method: parts.method,
        uri: parts.uri,
        version: parts.version,
        headers: parts.headers,
        body,
    };
    let response = gateway.handle(request).await;
    stream_response(response)
}

fn is_websocket_upgrade(req: &Request<Body>) -> bool {
    req.headers()
        .get(http::header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

async fn upgrade_websocket(gateway: Arc<Gateway>, req: Request<Body>) -> Response {
    let (mut parts, _body) = req.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);
    let headers = parts.headers.clone();

    match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade.on_upgrade(move |socket| async move {
            gateway.handle_websocket(socket, path, query, headers).await;
        }),
        Err(rejection) => rejection.into_response(),
    }
}

/// Emits the buffered response as a chunked stream: one ~8 KiB frame per
/// chunk, with the closing empty frame supplied by the body stream's end.
fn stream_response(response: GatewayResponse) -> Response {
    let GatewayResponse {
        status,
        headers,
        body,
        cache_hit: _,
    } = response;

    let mut chunks: Vec<Result<Bytes, Infallible>> = Vec::with_capacity(
        body.len() / CHUNK_SIZE + 1,
    );
    let mut offset = 0;
    while offset < body.len() {
        let end = (offset + CHUNK_SIZE).min(body.len());
        chunks.push(Ok(body.slice(offset..end)));
        offset = end;
    }

    let stream = futures::stream::iter(chunks);
    let mut out = Response::new(Body::from_stream(stream));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}
