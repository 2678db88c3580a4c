//! HTTP prediction service.
//!
//! The model is loaded once at startup and shared read-only between requests.
//! Request bodies are validated by axum's `Json` extractor: a missing,
//! `null` or non-numeric field is rejected with a 4xx before the model is
//! queried.

use crate::error::{Error, Result};
use crate::model::IrrigationModel;
use crate::reading::SensorReading;
use crate::train::DEFAULT_MODEL_PATH;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Trained model artifact
    pub model_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}

impl ServerConfig {
    /// Get bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<IrrigationModel>,
}

impl AppState {
    pub fn new(model: IrrigationModel) -> Self {
        AppState {
            model: Arc::new(model),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub needs_watering: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub samples: usize,
    pub labels: Vec<String>,
}

/// Failure inside a handler after the request was accepted.
#[derive(Debug)]
pub struct ServeError(Error);

impl From<Error> for ServeError {
    fn from(e: Error) -> Self {
        ServeError(e)
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        eprintln!("❌ Prediction failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

/// Routes `POST /predict` and `GET /health`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub async fn predict_handler(
    State(state): State<AppState>,
    Json(reading): Json<SensorReading>,
) -> std::result::Result<Json<PredictResponse>, ServeError> {
    let label = state.model.predict(&reading.to_features())?;
    Ok(Json(PredictResponse {
        needs_watering: label,
    }))
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        samples: state.model.n_samples(),
        labels: state.model.labels().into_iter().map(String::from).collect(),
    })
}

/// Loads the model and serves until Ctrl+C.
pub async fn serve(config: &ServerConfig) -> Result<()> {
    println!("📦 Loading model from {:?}", config.model_path);
    let model = IrrigationModel::load_from_file(&config.model_path)?;
    model.show_summary();

    let app = router(AppState::new(model));
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|source| Error::Bind {
            addr: bind_addr.clone(),
            source,
        })?;

    println!("🚀 Server listening on http://{bind_addr}");
    println!("  POST /predict  - Single prediction");
    println!("  GET  /health   - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|source| Error::Bind {
            addr: bind_addr.clone(),
            source,
        })?;

    println!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("⚠️ Failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KnnParams;
    use crate::reading::{LabelledReading, to_dataset};
    use axum::body::{Body, to_bytes};
    use axum::extract::rejection::JsonRejection;
    use axum::http::{Method, Request, header};
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn state() -> AppState {
        let rows = [
            ([450.0, 25.0, 60.0, 6.5, 5.0, 55.0], "needs_watering"),
            ([440.0, 24.0, 58.0, 6.4, 4.0, 54.0], "needs_watering"),
            ([150.0, 18.0, 20.0, 7.0, 40.0, 80.0], "ok"),
            ([160.0, 19.0, 22.0, 7.1, 41.0, 81.0], "ok"),
        ]
        .map(|(f, label)| LabelledReading {
            reading: SensorReading::from_features(f),
            label: label.to_string(),
        });
        let dataset = to_dataset(&rows).unwrap();
        AppState::new(IrrigationModel::fit(KnnParams::default(), &dataset).unwrap())
    }

    fn parse(body: &str) -> std::result::Result<Json<SensorReading>, JsonRejection> {
        Json::<SensorReading>::from_bytes(body.as_bytes())
    }

    const VALID: &str = r#"{"soil_moisture":450,"temperature":25.0,"soil_humidity":60,
        "ph":6.5,"rainfall":5.0,"air_humidity":55}"#;

    fn request(method: Method, body: &str, json: bool) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri("/predict");
        if json {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router(state()).oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_predict_returns_training_label() {
        let body = parse(VALID).unwrap();
        let Json(response) = predict_handler(State(state()), body).await.unwrap();
        assert_eq!(response.needs_watering, "needs_watering");
    }

    #[tokio::test]
    async fn test_predict_response_shape() {
        let Json(response) = predict_handler(State(state()), parse(VALID).unwrap())
            .await
            .unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({ "needs_watering": "needs_watering" }));
    }

    #[tokio::test]
    async fn test_predict_is_deterministic() {
        let state = state();
        let body = r#"{"soil_moisture":300,"temperature":22,"soil_humidity":40,
            "ph":6.8,"rainfall":20,"air_humidity":65}"#;

        let mut seen = vec![];
        for _ in 0..5 {
            let Json(r) = predict_handler(State(state.clone()), parse(body).unwrap())
                .await
                .unwrap();
            seen.push(r.needs_watering);
        }
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
        assert!(state.model.labels().contains(seen[0].as_str()));
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let body = r#"{"soil_moisture":450,"temperature":25.0,"soil_humidity":60,
            "ph":6.5,"rainfall":5.0}"#;
        let rejection = parse(body).unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_non_numeric_and_null_fields_are_rejected() {
        for body in [
            r#"{"soil_moisture":"wet","temperature":25.0,"soil_humidity":60,
                "ph":6.5,"rainfall":5.0,"air_humidity":55}"#,
            r#"{"soil_moisture":null,"temperature":25.0,"soil_humidity":60,
                "ph":6.5,"rainfall":5.0,"air_humidity":55}"#,
        ] {
            let rejection = parse(body).unwrap_err();
            assert!(rejection.status().is_client_error());
        }
    }

    #[test]
    fn test_empty_body_is_rejected() {
        assert!(parse("").unwrap_err().status().is_client_error());
        assert!(parse("{}").unwrap_err().status().is_client_error());
    }

    #[tokio::test]
    async fn test_health_reports_model() {
        let Json(health) = health_handler(State(state())).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.samples, 4);
        assert_eq!(health.labels, vec!["needs_watering", "ok"]);
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
        assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
    }

    #[tokio::test]
    async fn test_serve_fails_without_model() {
        let config = ServerConfig {
            model_path: PathBuf::from("no/such/model.msgpack"),
            ..ServerConfig::default()
        };
        assert!(matches!(serve(&config).await, Err(Error::Io { .. })));
    }

    #[tokio::test]
    async fn test_router_predicts_valid_request() {
        let (status, body) = send(request(Method::POST, VALID, true)).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "needs_watering": "needs_watering" }));
    }

    #[tokio::test]
    async fn test_router_rejects_empty_body() {
        let (status, _) = send(request(Method::POST, "", true)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(request(Method::POST, "", false)).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_router_rejects_missing_field() {
        let body = r#"{"soil_moisture":450,"temperature":25.0,"soil_humidity":60,
            "ph":6.5,"air_humidity":55}"#;
        let (status, _) = send(request(Method::POST, body, true)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_router_rejects_get_on_predict() {
        let (status, _) = send(request(Method::GET, "", false)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_router_serves_health() {
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.samples, 4);
    }

    #[tokio::test]
    async fn test_serve_reports_bind_address() {
        let dir = tempdir().unwrap();
        let model_path = dir.path().join("model.msgpack");
        state().model.save_to_file(&model_path).unwrap();

        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
            model_path,
        };

        match serve(&config).await {
            Err(Error::Bind { addr, .. }) => assert_eq!(addr, format!("127.0.0.1:{port}")),
            other => panic!("expected Bind error, got {other:?}"),
        }
    }
}
