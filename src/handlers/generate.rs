use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::handlers::responses::{
    ApiError, Endpoint, INVALID_JSON_FORMAT, INVALID_REQUEST_BODY, PROMPT_REQUIRED,
};
use crate::pipeline::PipelineError;
use crate::state::AppState;
use crate::utils::timing::RequestTimer;

#[derive(Debug, Deserialize)]
pub struct GenerateJsonRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateImageRequest {
    #[serde(default)]
    pub json: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub image_url: String,
}

fn reject_body(endpoint: Endpoint, rejection: JsonRejection) -> ApiError {
    warn!(
        "{} rejected request body: {}",
        endpoint.label(),
        rejection.body_text()
    );
    ApiError::bad_request(INVALID_REQUEST_BODY)
}

fn log_failure(timer: &mut RequestTimer, err: &PipelineError) {
    match err {
        PipelineError::EmptyPrompt | PipelineError::InvalidInputShape(_) => warn!(
            pipeline = timer.pipeline(),
            input = timer.input(),
            "Rejected request: {}",
            err
        ),
        _ => error!(
            pipeline = timer.pipeline(),
            input = timer.input(),
            "Request failed: {}",
            err
        ),
    }
    timer.complete("error", Some(err.kind()));
}

pub async fn generate_json(
    State(state): State<AppState>,
    body: Result<Json<GenerateJsonRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let endpoint = Endpoint::GenerateJson;
    let Json(request) = body.map_err(|rejection| reject_body(endpoint, rejection))?;
    let Some(prompt) = request.prompt else {
        warn!("{} request without a prompt", endpoint.label());
        return Err(ApiError::bad_request(PROMPT_REQUIRED));
    };

    let mut timer = RequestTimer::start(endpoint.label(), &prompt);
    match state.characters.generate(&prompt).await {
        Ok(output) => {
            timer.mark_cache(output.from_cache);
            timer.complete("success", None);
            Ok(Json(output.value))
        }
        Err(err) => {
            log_failure(&mut timer, &err);
            Err(ApiError::from_pipeline(endpoint, err))
        }
    }
}

pub async fn generate_image(
    State(state): State<AppState>,
    body: Result<Json<GenerateImageRequest>, JsonRejection>,
) -> Result<Json<GenerateImageResponse>, ApiError> {
    let endpoint = Endpoint::GenerateImage;
    let Json(request) = body.map_err(|rejection| reject_body(endpoint, rejection))?;
    let Some(document) = request.json.filter(|value| !value.is_null()) else {
        warn!("{} request without a document", endpoint.label());
        return Err(ApiError::bad_request(INVALID_JSON_FORMAT));
    };

    let mut timer = RequestTimer::start(endpoint.label(), &document.to_string());
    match state.images.generate(&document).await {
        Ok(output) => {
            timer.mark_cache(output.from_cache);
            timer.complete("success", None);
            Ok(Json(GenerateImageResponse {
                image_url: output.value,
            }))
        }
        Err(err) => {
            log_failure(&mut timer, &err);
            Err(ApiError::from_pipeline(endpoint, err))
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "cacheEntries": state.cache.len(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use tower::ServiceExt;

    use super::*;
    use crate::cache::ResponseCache;
    use crate::config::ImagePromptStyle;
    use crate::handlers::{build_cors_layer, build_router};
    use crate::llm::testing::{FakeImageProvider, FakeReply, FakeTextProvider};

    const AVA: &str = r#"{"name":"Ava","gender":"Female","traits":["bold"],"hobbies":["climbing"],"appearance":{"hair":["short","brown"],"facial":["none"],"eyes":["green"],"height":["5ft 8in"],"weight":["140lbs"],"skin":["tan"]}}"#;

    fn router_with(text: Arc<FakeTextProvider>, image: Arc<FakeImageProvider>) -> Router {
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(600)));
        let state = AppState::new(cache, text, image, ImagePromptStyle::Detailed);
        build_router(state, build_cors_layer(&["*".to_string()]))
    }

    async fn post(router: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn generate_json_returns_document_and_caches_it() {
        let text = FakeTextProvider::text(&format!("```json\n{AVA}\n```"));
        let router = router_with(text.clone(), FakeImageProvider::url("unused"));

        let (status, first) = post(&router, "/generate-json", r#"{"prompt":"a climber"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["name"], json!("Ava"));

        let (status, second) = post(&router, "/generate-json", r#"{"prompt":"a climber"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first, second);
        assert_eq!(text.calls(), 1);
    }

    #[tokio::test]
    async fn generate_json_surfaces_raw_response() {
        let router = router_with(
            FakeTextProvider::text("not json at all"),
            FakeImageProvider::url("unused"),
        );

        let (status, body) = post(&router, "/generate-json", r#"{"prompt":"x"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({ "error": "Invalid JSON format", "rawResponse": "not json at all" })
        );
    }

    #[tokio::test]
    async fn generate_json_reports_upstream_failures_generically() {
        let router = router_with(
            FakeTextProvider::replying(FakeReply::StatusError(401)),
            FakeImageProvider::url("unused"),
        );
        let (status, body) = post(&router, "/generate-json", r#"{"prompt":"x"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Failed to generate JSON" }));

        let router = router_with(
            FakeTextProvider::replying(FakeReply::Ok(crate::llm::EnvelopeText::Empty)),
            FakeImageProvider::url("unused"),
        );
        let (status, body) = post(&router, "/generate-json", r#"{"prompt":"x"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Failed to generate JSON" }));
    }

    #[tokio::test]
    async fn generate_json_rejects_bad_bodies() {
        let text = FakeTextProvider::text(AVA);
        let router = router_with(text.clone(), FakeImageProvider::url("unused"));

        let (status, body) = post(&router, "/generate-json", r#"{}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Prompt is required" }));

        let (status, _) = post(&router, "/generate-json", r#"{"prompt":"  "}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post(&router, "/generate-json", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid request body" }));

        assert_eq!(text.calls(), 0);
    }

    #[tokio::test]
    async fn generate_image_rejects_incomplete_documents_without_provider_call() {
        let image = FakeImageProvider::url("https://images.example/1.png");
        let router = router_with(FakeTextProvider::text(AVA), image.clone());

        let (status, body) = post(
            &router,
            "/generate-image",
            r#"{"json":{"appearance":{"hair":[]}}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid JSON format" }));

        let (status, body) = post(&router, "/generate-image", r#"{}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid JSON format" }));

        assert_eq!(image.calls(), 0);
    }

    #[tokio::test]
    async fn generate_image_returns_url_and_caches_it() {
        let image = FakeImageProvider::url("https://images.example/1.png");
        let router = router_with(FakeTextProvider::text(AVA), image.clone());
        let body = format!(r#"{{"json":{AVA}}}"#);

        let (status, first) = post(&router, "/generate-image", &body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first, json!({ "imageUrl": "https://images.example/1.png" }));

        let (_, second) = post(&router, "/generate-image", &body).await;
        assert_eq!(first, second);
        assert_eq!(image.calls(), 1);
    }

    #[tokio::test]
    async fn generate_image_reports_provider_failure() {
        let router = router_with(
            FakeTextProvider::text(AVA),
            FakeImageProvider::replying(FakeReply::StatusError(429)),
        );
        let (status, body) =
            post(&router, "/generate-image", &format!(r#"{{"json":{AVA}}}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Failed to generate image" }));
    }

    #[tokio::test]
    async fn health_reports_cache_size() {
        let router = router_with(FakeTextProvider::text(AVA), FakeImageProvider::url("u"));
        post(&router, "/generate-json", r#"{"prompt":"a climber"}"#).await;

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "status": "ok", "cacheEntries": 1 }));
    }
}
