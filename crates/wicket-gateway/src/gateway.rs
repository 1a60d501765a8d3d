//! The gateway dispatcher: path matching, handler composition and
//! memoization, bypass behavior and shutdown.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use http::{HeaderMap, StatusCode};
use tower::util::BoxCloneService;
use tower::{Service, ServiceExt};
use tracing::{debug, info};
use wicket_cache::CachedResponse;
use wicket_core::clock::{Clock, MonotonicClock};
use wicket_core::{GatewayRequest, GatewayResponse};
use wicket_proxy::{ForwardService, LbStrategy};
use wicket_storage::{KvStore, MemoryStore};
use wicket_throttle::{Admission, ThrottleState, Throttler};

use crate::compile::{CompiledFeature, CompiledRoute, Compiler};
use crate::compose::{compose_handler, ChainDeps, Handler};
use crate::config::{ConfigError, GatewayConfig};
use crate::dashboard::{DashboardService, DASHBOARD_PREFIX};
use crate::error::GatewayError;
use crate::stats::StatsRecorder;

/// The assembled gateway. Construct one with [`Gateway::builder`], then
/// dispatch requests through [`Gateway::handle`] (the axum adapter in
/// [`crate::serve`] does this for a real listener).
pub struct Gateway {
    config: GatewayConfig,
    routes: Vec<CompiledRoute>,
    default_feature: Option<Arc<CompiledFeature>>,
    deps: ChainDeps,
    // BoxCloneService is Send but not Sync; the mutexes make the gateway
    // shareable across connection tasks.
    handlers: Mutex<HashMap<u64, Handler>>,
    throttle_store: Arc<dyn KvStore<ThrottleState>>,
    forward: Option<Arc<ForwardService>>,
    app: Option<Mutex<Handler>>,
    dashboard: DashboardService,
}

/// Step-by-step construction of a [`Gateway`].
pub struct GatewayBuilder {
    config: GatewayConfig,
    app: Option<Handler>,
    servers: Option<Vec<String>>,
    lb: LbStrategy,
    config_path: Option<PathBuf>,
    namespace: String,
    clock: Arc<dyn Clock>,
}

impl GatewayBuilder {
    fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            app: None,
            servers: None,
            lb: LbStrategy::Random,
            config_path: None,
            namespace: "wicket".to_string(),
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Mounts a local downstream handler instead of forwarding.
    /// Mutually exclusive with backend servers.
    pub fn app<S>(mut self, service: S) -> Self
    where
        S: Service<GatewayRequest, Response = GatewayResponse, Error = GatewayError>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        self.app = Some(BoxCloneService::new(service));
        self
    }

    /// Overrides the backend server list from the configuration.
    pub fn servers(mut self, servers: Vec<String>) -> Self {
        self.servers = Some(servers);
        self
    }

    /// Chooses the load-balancing strategy for forwarded requests.
    ///
    /// Default: random
    pub fn load_balancer(mut self, lb: LbStrategy) -> Self {
        self.lb = lb;
        self
    }

    /// Remembers the config file path so the dashboard can serve and
    /// update it.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// The YAML namespace used when validating dashboard config edits.
    ///
    /// Default: `wicket`
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Injects the clock for throttling, caching and circuit recovery.
    ///
    /// Default: the system monotonic clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Compiles the configuration and assembles the gateway.
    pub fn build(self) -> Result<Gateway, ConfigError> {
        let servers = self.servers.or_else(|| self.config.servers.clone());
        if self.app.is_some() && servers.is_some() {
            return Err(ConfigError::Invalid(
                "app and servers are mutually exclusive".to_string(),
            ));
        }

        self.config.validate()?;
        let mut compiler = Compiler::new(Arc::clone(&self.clock));
        let (routes, default_feature) = compiler.compile(&self.config)?;

        let keyspace = self.config.keyspace.clone();
        let throttle_store: Arc<dyn KvStore<ThrottleState>> =
            Arc::new(MemoryStore::with_clock(Arc::clone(&self.clock)));
        let cache_store: Arc<dyn KvStore<CachedResponse>> =
            Arc::new(MemoryStore::with_clock(Arc::clone(&self.clock)));

        let throttler = Arc::new(Throttler::new(
            Arc::clone(&throttle_store),
            Arc::clone(&self.clock),
            keyspace.clone(),
        ));

        let forward = match servers {
            Some(servers) => {
                let balancer = self
                    .lb
                    .build(servers)
                    .map_err(|err| ConfigError::Invalid(err.to_string()))?;
                Some(Arc::new(ForwardService::new(balancer)))
            }
            None => None,
        };

        info!(
            keyspace = %keyspace,
            paths = routes.len(),
            forwarding = forward.is_some(),
            "gateway compiled"
        );

        Ok(Gateway {
            deps: ChainDeps {
                throttler,
                cache_store,
                cache_keyspace: format!("{keyspace}:cache"),
                stats: Arc::new(StatsRecorder::new()),
            },
            dashboard: DashboardService::new(self.config_path, self.namespace),
            config: self.config,
            routes,
            default_feature,
            handlers: Mutex::new(HashMap::new()),
            throttle_store,
            forward,
            app: self.app.map(Mutex::new),
        })
    }
}

impl Gateway {
    /// Starts building a gateway from `config`.
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    /// The request statistics recorder.
    pub fn stats(&self) -> &Arc<StatsRecorder> {
        &self.deps.stats
    }

    /// First-match-wins path resolution, falling back to the default
    /// feature bundle.
    fn match_feature(&self, path: &str) -> Option<Arc<CompiledFeature>> {
        for route in &self.routes {
            if route.regex.is_match(path) {
                return Some(Arc::clone(&route.feature));
            }
        }
        self.default_feature.clone()
    }

    /// The innermost handler: forward, local app, or a 404 responder.
    fn downstream(&self) -> Handler {
        if let Some(forward) = &self.forward {
            let forward = Arc::clone(forward);
            return BoxCloneService::new(tower::service_fn(move |req: GatewayRequest| {
                let forward = Arc::clone(&forward);
                async move {
                    forward
                        .forward_http(&req)
                        .await
                        .map_err(GatewayError::from)
                }
            }));
        }
        if let Some(app) = &self.app {
            return app.lock().expect("app handler poisoned").clone();
        }
        BoxCloneService::new(tower::service_fn(|_req: GatewayRequest| async {
            Ok::<_, GatewayError>(GatewayResponse::json(
                StatusCode::NOT_FOUND,
                r#"{"error": "No downstream application or servers configured"}"#,
            ))
        }))
    }

    /// The composed handler for a feature, built lazily on first use and
    /// memoized by the feature's identity until shutdown.
    fn handler_for(&self, feature: &Arc<CompiledFeature>) -> Handler {
        let mut handlers = self.handlers.lock().expect("handler cache poisoned");
        handlers
            .entry(feature.id)
            .or_insert_with(|| compose_handler(feature.as_ref(), self.downstream(), &self.deps))
            .clone()
    }

    /// Dispatches one buffered HTTP request.
    pub async fn handle(&self, req: GatewayRequest) -> GatewayResponse {
        if req.path().starts_with(DASHBOARD_PREFIX) {
            return self
                .dashboard
                .handle(&req, &self.deps.stats, &self.config, &self.routes)
                .await;
        }

        match self.match_feature(req.path()) {
            Some(feature) => {
                let handler = self.handler_for(&feature);
                match handler.oneshot(req).await {
                    Ok(response) => response,
                    Err(error) => {
                        debug!(error = %error, "request rejected by policy chain");
                        error.to_response()
                    }
                }
            }
            None => self.bypass(req).await,
        }
    }

    /// No features match: hand straight to the downstream, or answer for
    /// ourselves when nothing is mounted.
    async fn bypass(&self, req: GatewayRequest) -> GatewayResponse {
        if let Some(forward) = &self.forward {
            return match forward.forward_http(&req).await {
                Ok(response) => response,
                Err(err) => GatewayError::from(err).to_response(),
            };
        }
        if let Some(app) = &self.app {
            let app = app.lock().expect("app handler poisoned").clone();
            return match app.oneshot(req).await {
                Ok(response) => response,
                Err(error) => error.to_response(),
            };
        }
        GatewayResponse::text(StatusCode::OK, "Gateway - No features configured")
    }

    /// Dispatches an accepted WebSocket connection. Rate limiting and
    /// monitoring apply; other features are HTTP-only.
    pub async fn handle_websocket(
        &self,
        mut socket: WebSocket,
        path: String,
        query: Option<String>,
        headers: HeaderMap,
    ) {
        let feature = self.match_feature(&path);

        if let Some(feature) = &feature {
            if let Some(rate_limit) = &feature.config.rate_limit {
                let key = self
                    .deps
                    .throttler
                    .key_for(rate_limit.algorithm, &feature.throttle_scope);
                let admission = self
                    .deps
                    .throttler
                    .acquire(
                        rate_limit.algorithm,
                        &key,
                        rate_limit.quota,
                        std::time::Duration::from_secs(rate_limit.duration),
                        rate_limit.bucket_size,
                    )
                    .await;
                if !matches!(admission, Ok(Admission::Granted)) {
                    let _ = socket
                        .send(WsMessage::Close(Some(CloseFrame {
                            code: 1008,
                            reason: "Rate limit exceeded".into(),
                        })))
                        .await;
                    return;
                }
            }
        }

        let monitor_threshold = feature
            .as_ref()
            .and_then(|f| f.config.monitoring.as_ref())
            .map(|m| m.log_threshold);
        let started = std::time::Instant::now();

        match &self.forward {
            Some(forward) => {
                forward
                    .forward_websocket(socket, &path, query.as_deref(), &headers)
                    .await;
            }
            None => {
                let _ = socket
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: 1000,
                        reason: "".into(),
                    })))
                    .await;
            }
        }

        if let Some(threshold) = monitor_threshold {
            let elapsed = started.elapsed().as_secs_f64();
            if elapsed > threshold {
                tracing::warn!(
                    path = %path,
                    elapsed_s = format!("{elapsed:.3}"),
                    "websocket connection closed"
                );
            }
        }
    }

    /// Shuts the gateway down: drops memoized handlers, closes the
    /// storage providers and the upstream session.
    pub async fn close(&self) {
        self.handlers
            .lock()
            .expect("handler cache poisoned")
            .clear();
        let _ = self.throttle_store.close().await;
        let _ = self.deps.cache_store.close().await;
        if let Some(forward) = &self.forward {
            forward.close().await;
        }
        info!("gateway closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathConfig;
    use tower::service_fn;

    fn ok_app() -> impl Service<
        GatewayRequest,
        Response = GatewayResponse,
        Error = GatewayError,
        Future = futures::future::BoxFuture<'static, Result<GatewayResponse, GatewayError>>,
    > + Clone
           + Send {
        service_fn(|req: GatewayRequest| {
            let fut: futures::future::BoxFuture<'static, Result<GatewayResponse, GatewayError>> =
                Box::pin(async move {
                    Ok(GatewayResponse::ok(format!("echo:{}", req.path())))
                });
            fut
        })
    }

    fn config_with(paths: Vec<(&str, crate::config::FeatureConfig)>) -> GatewayConfig {
        GatewayConfig {
            paths: paths
                .into_iter()
                .map(|(pattern, features)| PathConfig {
                    pattern: pattern.to_string(),
                    features,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn first_matching_pattern_wins() {
        let mut loud = crate::config::FeatureConfig::default();
        loud.monitoring = Some(crate::config::MonitoringConfig { log_threshold: 9.0 });

        let config = config_with(vec![
            ("/api/*", loud.clone()),
            ("/api/special", crate::config::FeatureConfig::default()),
        ]);
        let gateway = Gateway::builder(config).app(ok_app()).build().unwrap();

        // Both paths hit the first (glob) policy; the request still lands.
        let resp = gateway
            .handle(GatewayRequest::get("/api/special"))
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, "echo:/api/special");
    }

    #[tokio::test]
    async fn unmatched_path_with_app_bypasses_features() {
        let config = config_with(vec![("/api/*", Default::default())]);
        let gateway = Gateway::builder(config).app(ok_app()).build().unwrap();

        let resp = gateway.handle(GatewayRequest::get("/other")).await;
        assert_eq!(resp.body, "echo:/other");
        // Bypass requests are not recorded.
        assert_eq!(gateway.stats().snapshot().total_requests, 0);
    }

    #[tokio::test]
    async fn unmatched_path_without_downstream_reports_no_features() {
        let gateway = Gateway::builder(GatewayConfig::default()).build().unwrap();
        let resp = gateway.handle(GatewayRequest::get("/anything")).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, "Gateway - No features configured");
    }

    #[tokio::test]
    async fn matched_path_without_downstream_is_404() {
        let config = config_with(vec![("/api/*", Default::default())]);
        let gateway = Gateway::builder(config).build().unwrap();
        let resp = gateway.handle(GatewayRequest::get("/api/x")).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn app_and_servers_are_mutually_exclusive() {
        let mut config = GatewayConfig::default();
        config.servers = Some(vec!["http://backend".to_string()]);
        let err = Gateway::builder(config)
            .app(ok_app())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[tokio::test]
    async fn default_features_apply_to_unmatched_paths() {
        let mut features = crate::config::FeatureConfig::default();
        features.rate_limit = Some(crate::config::RateLimitConfig {
            quota: 1,
            duration: 60,
            algorithm: wicket_throttle::ThrottleAlgo::FixedWindow,
            bucket_size: None,
            error_status: 429,
            error_message: "Rate limit exceeded".to_string(),
        });
        let config = GatewayConfig {
            default_features: Some(features),
            ..Default::default()
        };
        let gateway = Gateway::builder(config).app(ok_app()).build().unwrap();

        assert_eq!(
            gateway.handle(GatewayRequest::get("/x")).await.status,
            StatusCode::OK
        );
        let limited = gateway.handle(GatewayRequest::get("/x")).await;
        assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limited.body, r#"{"error":"Rate limit exceeded"}"#.as_bytes());
    }

    #[tokio::test]
    async fn stats_observe_matched_requests() {
        let mut features = crate::config::FeatureConfig::default();
        features.monitoring = Some(crate::config::MonitoringConfig { log_threshold: 9.0 });
        let config = config_with(vec![("/api/*", features)]);
        let gateway = Gateway::builder(config).app(ok_app()).build().unwrap();

        gateway.handle(GatewayRequest::get("/api/a")).await;
        gateway.handle(GatewayRequest::get("/api/b")).await;

        let snapshot = gateway.stats().snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.recent_requests[0].path, "/api/a");
    }
}
