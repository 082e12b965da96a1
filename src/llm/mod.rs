pub mod gemini;
pub mod openai;
pub mod types;

#[cfg(test)]
pub mod testing;

use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::{debug, warn};

pub use gemini::{GeminiImageProvider, GeminiTextProvider};
pub use openai::{OpenAiChatProvider, OpenAiImageProvider};
pub use types::{EnvelopeText, ImageProvider, ProviderError, TextProvider, TextRequest};

pub fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

/// Sends `payload` and returns the decoded body.
///
/// A 2xx body that is not JSON decodes to `Value::Null` so the envelope
/// unwrap reports it as malformed instead of failing the call.
pub(crate) async fn post_json(
    provider: &'static str,
    request: RequestBuilder,
    payload: &Value,
) -> Result<Value, ProviderError> {
    let response = request
        .json(payload)
        .send()
        .await
        .map_err(|err| {
            warn!(
                "{} request failed to send: {} (timeout={}, connect={})",
                provider,
                err,
                err.is_timeout(),
                err.is_connect()
            );
            ProviderError::Transport {
                provider,
                message: err.to_string(),
            }
        })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| ProviderError::Transport {
            provider,
            message: format!("failed to read response body: {err}"),
        })?;

    if !status.is_success() {
        let (message, body_summary) = summarize_error_body(&body);
        warn!(
            "{} API error: status={}, body={}",
            provider, status, body_summary
        );
        return Err(ProviderError::Status {
            provider,
            status: status.as_u16(),
            message: message.unwrap_or(body_summary),
        });
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(value) => {
            debug!(
                target: "llm.response",
                provider = provider,
                body = %truncate_for_log(&body, 2000)
            );
            Ok(value)
        }
        Err(err) => {
            warn!(
                "{} returned a non-JSON body: {} ({})",
                provider,
                truncate_for_log(&body, 500),
                err
            );
            Ok(Value::Null)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_summary_prefers_provider_message() {
        let (message, _) =
            summarize_error_body(r#"{"error":{"message":"quota exceeded","type":"billing"}}"#);
        assert_eq!(message.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn error_summary_handles_plain_text() {
        let (message, summary) = summarize_error_body("  upstream timeout  ");
        assert_eq!(message, None);
        assert_eq!(summary, "upstream timeout");

        let (_, summary) = summarize_error_body("");
        assert_eq!(summary, "empty response body");
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_for_log("héllo", 10), "héllo");
        assert_eq!(truncate_for_log("héllo", 2), "hé... (truncated)");
    }
}
