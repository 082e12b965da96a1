use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl ProviderKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" | "open_ai" | "openrouter" => Some(Self::OpenAi),
            "gemini" | "google" => Some(Self::Gemini),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }
}

/// Which appearance fields feed the image prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePromptStyle {
    /// Hair, skin, eyes, height, weight and facial descriptors.
    Detailed,
    /// Only `hair[0]` and `skin[0]`. Kept for older clients.
    Basic,
}

impl ImagePromptStyle {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "detailed" | "" => Some(Self::Detailed),
            "basic" => Some(Self::Basic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_dir: String,
    pub text_provider: ProviderKind,
    pub image_provider: ProviderKind,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_text_model: String,
    pub openai_image_model: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub gemini_image_model: String,
    pub text_temperature: f32,
    pub text_max_output_tokens: u32,
    pub image_size: String,
    /// Raw `IMAGE_PROMPT_STYLE`; resolved by `Config::image_prompt_style`.
    pub image_prompt_style_name: String,
    pub cache_ttl_seconds: u64,
    pub cache_sweep_interval_seconds: u64,
    pub provider_timeout_seconds: u64,
    pub cors_allowed_origins: Vec<String>,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn env_provider(name: &str, default: ProviderKind) -> Result<ProviderKind> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => ProviderKind::parse(&value)
            .ok_or_else(|| anyhow!("Unknown {name} value '{value}' (expected openai or gemini)")),
        _ => Ok(default),
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Config {
            host: env_string("HOST", "0.0.0.0"),
            port: env_u16("PORT", 5000),
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: env_string("LOG_DIR", "logs"),
            text_provider: env_provider("TEXT_PROVIDER", ProviderKind::OpenAi)?,
            image_provider: env_provider("IMAGE_PROVIDER", ProviderKind::OpenAi)?,
            openai_api_key: env_string("OPENAI_API_KEY", ""),
            openai_base_url: env_string("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_text_model: env_string("OPENAI_TEXT_MODEL", "gpt-3.5-turbo"),
            openai_image_model: env_string("OPENAI_IMAGE_MODEL", "dall-e-2"),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_base_url: env_string(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_image_model: env_string(
                "GEMINI_IMAGE_MODEL",
                "gemini-2.0-flash-preview-image-generation",
            ),
            text_temperature: env_f32("TEXT_TEMPERATURE", 0.7),
            text_max_output_tokens: env_u32("TEXT_MAX_OUTPUT_TOKENS", 300),
            image_size: env_string("IMAGE_SIZE", "512x512"),
            image_prompt_style_name: env_string("IMAGE_PROMPT_STYLE", "detailed"),
            cache_ttl_seconds: env_u64("CACHE_TTL_SECONDS", 600),
            cache_sweep_interval_seconds: env_u64("CACHE_SWEEP_INTERVAL_SECONDS", 60),
            provider_timeout_seconds: env_u64("PROVIDER_TIMEOUT_SECONDS", 60).max(1),
            cors_allowed_origins: parse_csv(&env_string("CORS_ALLOWED_ORIGINS", "*")),
        })
    }

    /// Fails when a selected provider has no credentials.
    pub fn validate(&self) -> Result<()> {
        for kind in [self.text_provider, self.image_provider] {
            let key = match kind {
                ProviderKind::OpenAi => &self.openai_api_key,
                ProviderKind::Gemini => &self.gemini_api_key,
            };
            if key.trim().is_empty() {
                let var = match kind {
                    ProviderKind::OpenAi => "OPENAI_API_KEY",
                    ProviderKind::Gemini => "GEMINI_API_KEY",
                };
                return Err(anyhow!(
                    "{var} is required when the {} provider is selected",
                    kind.as_str()
                ));
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host.trim(), self.port)
            .parse::<SocketAddr>()
            .map_err(|err| anyhow!("Invalid HOST/PORT combination: {err}"))
    }

    /// Resolves the prompt style, falling back to detailed. Call after
    /// logging is initialized so the fallback warning is recorded.
    pub fn image_prompt_style(&self) -> ImagePromptStyle {
        ImagePromptStyle::parse(&self.image_prompt_style_name).unwrap_or_else(|| {
            warn!(
                "Unknown IMAGE_PROMPT_STYLE value '{}'; defaulting to detailed.",
                self.image_prompt_style_name
            );
            ImagePromptStyle::Detailed
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_seconds)
    }
}

pub const CHARACTER_SYSTEM_PROMPT: &str = r#"You are an AI that generates structured JSON for character descriptions.
Always return JSON in this format:
{
  "name": "Full Name",
  "gender": "Male/Female/Other",
  "traits": ["list", "of", "personality", "traits"],
  "hobbies": ["list", "of", "hobbies"],
  "appearance": {
    "hair": ["length", "color"],
    "facial": ["beard", "mustache", "clean-shaven"],
    "eyes": ["eye color"],
    "height": ["height in feet/inches"],
    "weight": ["weight in lbs"],
    "skin": ["skin tone"]
  }
}
Ensure response is always in valid JSON format."#;
