//! Dashboard endpoints: stats and policies views plus config file
//! inspection and editing.

use std::path::PathBuf;

use http::{Method, StatusCode};
use serde_json::json;
use wicket_core::{GatewayRequest, GatewayResponse};

use crate::compile::CompiledRoute;
use crate::config::GatewayConfig;
use crate::stats::StatsRecorder;

/// Path prefix the dispatcher hands to the dashboard.
pub const DASHBOARD_PREFIX: &str = "/wicket/dashboard";

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Wicket Gateway</title>
<style>
body { font-family: system-ui, sans-serif; margin: 2rem; color: #222; }
h1 { font-size: 1.4rem; }
pre { background: #f4f4f4; padding: 1rem; overflow: auto; }
</style>
</head>
<body>
<h1>Wicket Gateway</h1>
<p>Live views:</p>
<ul>
<li><a href="/wicket/dashboard/api/stats">stats</a></li>
<li><a href="/wicket/dashboard/api/policies">policies</a></li>
<li><a href="/wicket/dashboard/api/config">config</a></li>
</ul>
<pre id="stats">loading…</pre>
<script>
async function refresh() {
  const res = await fetch('/wicket/dashboard/api/stats');
  document.getElementById('stats').textContent =
    JSON.stringify(await res.json(), null, 2);
}
refresh();
setInterval(refresh, 5000);
</script>
</body>
</html>
"#;

pub(crate) struct DashboardService {
    config_path: Option<PathBuf>,
    namespace: String,
}

impl DashboardService {
    pub(crate) fn new(config_path: Option<PathBuf>, namespace: String) -> Self {
        Self {
            config_path,
            namespace,
        }
    }

    pub(crate) async fn handle(
        &self,
        req: &GatewayRequest,
        stats: &StatsRecorder,
        config: &GatewayConfig,
        routes: &[CompiledRoute],
    ) -> GatewayResponse {
        let path = req.path();
        let method = &req.method;

        if path == DASHBOARD_PREFIX && *method == Method::GET {
            GatewayResponse::ok(DASHBOARD_HTML)
                .with_header("content-type", "text/html; charset=utf-8")
        } else if path == "/wicket/dashboard/api/stats" && *method == Method::GET {
            let body =
                serde_json::to_string(&stats.snapshot()).unwrap_or_else(|_| "{}".to_string());
            GatewayResponse::json(StatusCode::OK, body)
        } else if path == "/wicket/dashboard/api/policies" && *method == Method::GET {
            let policies: Vec<_> = config
                .paths
                .iter()
                .zip(routes.iter())
                .map(|(path, route)| {
                    json!({
                        "pattern": path.pattern,
                        "features": path.features.feature_names(),
                        "request_count": stats.recent_matching(&route.regex),
                    })
                })
                .collect();
            GatewayResponse::json(StatusCode::OK, json!(policies).to_string())
        } else if path == "/wicket/dashboard/api/config" && *method == Method::GET {
            match &self.config_path {
                Some(path) => match tokio::fs::read_to_string(path).await {
                    Ok(raw) => GatewayResponse::text(StatusCode::OK, raw),
                    Err(_) => GatewayResponse::text(
                        StatusCode::NOT_FOUND,
                        "Configuration file not found",
                    ),
                },
                None => GatewayResponse::text(
                    StatusCode::NOT_FOUND,
                    "No configuration file configured",
                ),
            }
        } else if path == "/wicket/dashboard/api/config" && *method == Method::PUT {
            let Some(path) = &self.config_path else {
                return GatewayResponse::text(
                    StatusCode::BAD_REQUEST,
                    "No configuration file configured",
                );
            };
            let raw = match std::str::from_utf8(&req.body) {
                Ok(raw) => raw,
                Err(_) => {
                    return GatewayResponse::text(
                        StatusCode::BAD_REQUEST,
                        "Configuration must be UTF-8",
                    )
                }
            };
            if let Err(err) = GatewayConfig::from_yaml_str(raw, &self.namespace) {
                return GatewayResponse::text(
                    StatusCode::BAD_REQUEST,
                    format!("Failed to save configuration: {err}"),
                );
            }
            match tokio::fs::write(path, raw.as_bytes()).await {
                Ok(()) => {
                    GatewayResponse::text(StatusCode::OK, "Configuration saved successfully")
                }
                Err(_) => {
                    GatewayResponse::text(StatusCode::BAD_REQUEST, "Failed to save configuration")
                }
            }
        } else if path == "/wicket/dashboard/api/config/validate" && *method == Method::POST {
            let result = std::str::from_utf8(&req.body)
                .map_err(|_| "configuration must be UTF-8".to_string())
                .and_then(|raw| {
                    GatewayConfig::from_yaml_str(raw, &self.namespace)
                        .map_err(|err| err.to_string())
                });
            let body = match result {
                Ok(_) => json!({ "valid": true, "errors": [] }),
                Err(err) => json!({ "valid": false, "errors": [err] }),
            };
            GatewayResponse::json(StatusCode::OK, body.to_string())
        } else {
            GatewayResponse::text(StatusCode::NOT_FOUND, "Dashboard endpoint not found")
        }
    }
}
