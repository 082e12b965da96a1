use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::llm::truncate_for_log;
use crate::utils::logging::TIMING_TARGET;

const INPUT_LOG_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Unknown,
    Hit,
    Miss,
}

impl CacheOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "n/a",
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

/// Per-request timing record. Logs once on start and once on completion;
/// a timer dropped before completion (client went away) logs as cancelled.
#[derive(Debug)]
pub struct RequestTimer {
    pipeline: &'static str,
    input: String,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    cache: CacheOutcome,
    completed: bool,
}

impl RequestTimer {
    pub fn start(pipeline: &'static str, input: &str) -> Self {
        let timer = RequestTimer {
            pipeline,
            input: truncate_for_log(&input.replace('\n', " "), INPUT_LOG_LIMIT),
            started_at: Utc::now(),
            started_perf: Instant::now(),
            cache: CacheOutcome::Unknown,
            completed: false,
        };
        info!(
            target: TIMING_TARGET,
            "event=request_received pipeline={} received_at={} input={:?}",
            timer.pipeline,
            timer.started_at.to_rfc3339(),
            timer.input
        );
        timer
    }

    pub fn pipeline(&self) -> &'static str {
        self.pipeline
    }

    /// Truncated, single-line view of the request input for log lines.
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn mark_cache(&mut self, hit: bool) {
        self.cache = if hit {
            CacheOutcome::Hit
        } else {
            CacheOutcome::Miss
        };
    }

    pub fn complete(&mut self, status: &str, detail: Option<&str>) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=request_completed pipeline={} started_at={} completed_at={} duration_s={:.3} cache={} status={} detail={}",
            self.pipeline,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.cache.as_str(),
            status,
            detail.unwrap_or_default()
        );
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.complete("cancelled", Some("request dropped before a response was produced"));
    }
}

pub async fn log_provider_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    call: F,
) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    info!(
        target: TIMING_TARGET,
        "event=provider_request provider={} model={} operation={} started_at={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339()
    );

    let result = call().await;
    let (status, detail) = match &result {
        Ok(_) => ("success", String::new()),
        Err(err) => ("error", truncate_for_log(&err.to_string(), 300)),
    };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=provider_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} detail={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        detail
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_input_is_single_line_and_truncated() {
        let long = format!("line one\n{}", "x".repeat(500));
        let mut timer = RequestTimer::start("generate-json", &long);
        assert!(!timer.input().contains('\n'));
        assert!(timer.input().ends_with("... (truncated)"));
        timer.mark_cache(true);
        assert_eq!(timer.cache, CacheOutcome::Hit);
        timer.complete("success", None);
        assert!(timer.completed);
    }

    #[tokio::test]
    async fn provider_timing_passes_result_through() {
        let ok: Result<u8, String> =
            log_provider_timing("fake", "m", "op", || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u8, String> =
            log_provider_timing("fake", "m", "op", || async { Err("boom".to_string()) }).await;
        assert_eq!(err, Err("boom".to_string()));
    }
}
