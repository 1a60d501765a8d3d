//! Slow-request logging, closest to the inner handler so it measures
//! actual work rather than queueing in outer layers.

use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use tower::Service;
use tracing::warn;
use wicket_core::{GatewayRequest, GatewayResponse};

use crate::error::GatewayError;

pub(crate) struct MonitorService<S> {
    inner: S,
    threshold_secs: f64,
}

impl<S> MonitorService<S> {
    pub(crate) fn new(inner: S, threshold_secs: f64) -> Self {
        Self {
            inner,
            threshold_secs,
        }
    }
}

impl<S: Clone> Clone for MonitorService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            threshold_secs: self.threshold_secs,
        }
    }
}

impl<S> Service<GatewayRequest> for MonitorService<S>
where
    S: Service<GatewayRequest, Response = GatewayResponse, Error = GatewayError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = GatewayResponse;
    type Error = GatewayError;
    type Future = BoxFuture<'static, Result<GatewayResponse, GatewayError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: GatewayRequest) -> Self::Future {
        let mut inner = self.inner.clone();
        let threshold = self.threshold_secs;
        let method = req.method.to_string();
        let path = req.path().to_string();

        Box::pin(async move {
            let start = Instant::now();
            let result = inner.call(req).await;
            let elapsed = start.elapsed().as_secs_f64();

            if elapsed > threshold {
                warn!(
                    method = %method,
                    path = %path,
                    elapsed_s = format!("{elapsed:.3}"),
                    "slow request"
                );
            }
            result
        })
    }
}
