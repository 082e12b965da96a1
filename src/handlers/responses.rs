use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::PipelineError;

pub const INVALID_JSON_FORMAT: &str = "Invalid JSON format";
pub const FAILED_TO_GENERATE_JSON: &str = "Failed to generate JSON";
pub const FAILED_TO_GENERATE_IMAGE: &str = "Failed to generate image";
pub const PROMPT_REQUIRED: &str = "Prompt is required";
pub const INVALID_REQUEST_BODY: &str = "Invalid request body";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    GenerateJson,
    GenerateImage,
}

impl Endpoint {
    pub fn label(self) -> &'static str {
        match self {
            Self::GenerateJson => "generate-json",
            Self::GenerateImage => "generate-image",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
    raw_response: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: &'static str) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message,
            raw_response: None,
        }
    }

    /// Maps a pipeline failure onto the client-facing status and message.
    /// Upstream details stay in the server log.
    pub fn from_pipeline(endpoint: Endpoint, err: PipelineError) -> Self {
        match err {
            PipelineError::EmptyPrompt => Self::bad_request(PROMPT_REQUIRED),
            PipelineError::InvalidInputShape(_) => Self::bad_request(INVALID_JSON_FORMAT),
            PipelineError::InvalidGeneratedFormat { raw, .. } => ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: INVALID_JSON_FORMAT,
                raw_response: Some(raw),
            },
            PipelineError::UpstreamEnvelope(_) | PipelineError::ProviderCall(_) => ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: match endpoint {
                    Endpoint::GenerateJson => FAILED_TO_GENERATE_JSON,
                    Endpoint::GenerateImage => FAILED_TO_GENERATE_IMAGE,
                },
                raw_response: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message.to_string(),
            raw_response: self.raw_response,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderError;

    #[test]
    fn shape_errors_are_client_errors() {
        let err = ApiError::from_pipeline(
            Endpoint::GenerateImage,
            PipelineError::InvalidInputShape("missing appearance".into()),
        );
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, INVALID_JSON_FORMAT);
    }

    #[test]
    fn upstream_errors_use_endpoint_message() {
        let provider_err = || {
            PipelineError::ProviderCall(ProviderError::Transport {
                provider: "openai",
                message: "connection reset".into(),
            })
        };
        let json_err = ApiError::from_pipeline(Endpoint::GenerateJson, provider_err());
        assert_eq!(json_err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_err.message, FAILED_TO_GENERATE_JSON);

        let image_err = ApiError::from_pipeline(Endpoint::GenerateImage, provider_err());
        assert_eq!(image_err.message, FAILED_TO_GENERATE_IMAGE);

        let envelope_err = ApiError::from_pipeline(
            Endpoint::GenerateJson,
            PipelineError::UpstreamEnvelope("missing choices".into()),
        );
        assert_eq!(envelope_err.message, FAILED_TO_GENERATE_JSON);
        assert_eq!(envelope_err.raw_response, None);
    }

    #[test]
    fn generated_format_errors_carry_raw_text() {
        let err = ApiError::from_pipeline(
            Endpoint::GenerateJson,
            PipelineError::InvalidGeneratedFormat {
                raw: "not json at all".into(),
                reason: "expected value".into(),
            },
        );
        let body = serde_json::to_value(ErrorBody {
            error: err.message.to_string(),
            raw_response: err.raw_response,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "error": "Invalid JSON format", "rawResponse": "not json at all" })
        );
    }
}
