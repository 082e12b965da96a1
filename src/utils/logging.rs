use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::Config;

pub const TIMING_TARGET: &str = "proxy.timing";

const QUIET_TARGETS: [&str; 3] = ["hyper", "hyper_util", "reqwest"];

/// Flushes the file writers when dropped; hold it for the life of `main`.
pub struct LoggingGuards {
    _writers: Vec<WorkerGuard>,
}

fn parse_log_level(value: &str) -> LevelFilter {
    match value.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// Everything except request/provider timing, with HTTP internals capped at WARN.
fn general_filter(level: LevelFilter) -> Targets {
    QUIET_TARGETS.iter().fold(
        Targets::new()
            .with_default(level)
            .with_target(TIMING_TARGET, LevelFilter::OFF),
        |targets, target| targets.with_target(*target, level.min(LevelFilter::WARN)),
    )
}

fn timing_filter() -> Targets {
    Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target(TIMING_TARGET, LevelFilter::INFO)
}

fn daily_writer(dir: &Path, file_name: &str, guards: &mut Vec<WorkerGuard>) -> NonBlocking {
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name));
    guards.push(guard);
    writer
}

/// Installs the global subscriber: stdout plus daily `proxy.log`/`proxy.jsonl`
/// for general events, and `timing.log`/`timing.jsonl` for the timing target.
pub fn init_logging(config: &Config) -> Result<LoggingGuards> {
    let dir = Path::new(&config.log_dir);
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let mut guards = Vec::with_capacity(4);
    let general = general_filter(parse_log_level(&config.log_level));
    let timing = timing_filter();

    let layers = vec![
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_filter(general.clone())
            .boxed(),
        tracing_subscriber::fmt::layer()
            .with_writer(daily_writer(dir, "proxy.log", &mut guards))
            .with_ansi(false)
            .with_filter(general.clone())
            .boxed(),
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(daily_writer(dir, "proxy.jsonl", &mut guards))
            .with_filter(general)
            .boxed(),
        tracing_subscriber::fmt::layer()
            .with_writer(daily_writer(dir, "timing.log", &mut guards))
            .with_ansi(false)
            .with_filter(timing.clone())
            .boxed(),
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(daily_writer(dir, "timing.jsonl", &mut guards))
            .with_filter(timing)
            .boxed(),
    ];

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggingGuards { _writers: guards })
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn log_levels_fall_back_to_info() {
        assert_eq!(parse_log_level("WARNING"), LevelFilter::WARN);
        assert_eq!(parse_log_level(" debug "), LevelFilter::DEBUG);
        assert_eq!(parse_log_level("chatty"), LevelFilter::INFO);
    }

    #[test]
    fn timing_events_only_reach_timing_files() {
        let general = general_filter(LevelFilter::DEBUG);
        assert!(!general.would_enable(TIMING_TARGET, &Level::INFO));
        assert!(general.would_enable("character_forge::cache", &Level::DEBUG));

        let timing = timing_filter();
        assert!(timing.would_enable(TIMING_TARGET, &Level::INFO));
        assert!(!timing.would_enable("character_forge::cache", &Level::INFO));
    }

    #[test]
    fn http_internals_are_capped_at_warn() {
        let general = general_filter(LevelFilter::TRACE);
        assert!(!general.would_enable("hyper_util::client::legacy::pool", &Level::DEBUG));
        assert!(general.would_enable("reqwest", &Level::WARN));

        let quiet = general_filter(LevelFilter::ERROR);
        assert!(!quiet.would_enable("reqwest", &Level::WARN));
    }
}
