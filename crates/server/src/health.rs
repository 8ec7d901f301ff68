use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use huddle_core::config::AppConfig;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct HealthState {
    gateway_secret_configured: bool,
    gateway_url: String,
    llm_model: String,
}

impl HealthState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            gateway_secret_configured: config.gateway.has_api_key(),
            gateway_url: config.gateway.url.clone(),
            llm_model: config.llm.model.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub gateway: HealthCheck,
    pub gateway_secret_configured: bool,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Without the gateway secret every scheduling request ends in a
/// configuration error, so the service reports itself degraded.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let gateway = if state.gateway_secret_configured {
        HealthCheck { status: "ready", detail: format!("gateway {} configured", state.gateway_url) }
    } else {
        HealthCheck {
            status: "degraded",
            detail: "gateway api key is not configured; scheduling requests will fail".to_string(),
        }
    };
    let ready = gateway.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("huddle-server runtime initialized (model {})", state.llm_model),
        },
        gateway,
        gateway_secret_configured: state.gateway_secret_configured,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        extract::State,
        http::{Request, StatusCode},
        Json,
    };
    use huddle_core::config::AppConfig;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState};

    fn state(with_secret: bool) -> HealthState {
        let mut config = AppConfig::default();
        if with_secret {
            config.gateway.api_key = Some("k-1".to_string().into());
        }
        HealthState::from_config(&config)
    }

    #[tokio::test]
    async fn health_returns_ready_when_gateway_secret_is_configured() {
        let (status, Json(payload)) = health(State(state(true))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.gateway.status, "ready");
        assert!(payload.gateway_secret_configured);
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_without_gateway_secret() {
        let (status, Json(payload)) = health(State(state(false))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.service.status, "ready");
        assert!(!payload.gateway_secret_configured);
    }

    #[tokio::test]
    async fn router_serves_health_as_json() {
        let response = router(state(true))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.expect("body");
        let body: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["gateway_secret_configured"], true);
        assert_eq!(body["status"], "ready");
    }
}
