use crate::live::DEFAULT_LIVE_URL;
use crate::tools::ToolFailurePolicy;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub live: LiveConfig,
    pub audio: AudioSettings,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "vocalis".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3614,
        }
    }
}

/// Remote-service connection settings. The greeting and system instruction
/// are opaque strings the engine forwards, never interprets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub url: String,
    /// Usually supplied via environment, not the config file.
    pub api_key: String,
    pub model: String,
    pub voice: Option<String>,
    pub system_instruction: Option<String>,
    /// Opening move: sent once per successful connect.
    pub greeting: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_LIVE_URL.to_string(),
            api_key: String::new(),
            model: "models/gemini-2.0-flash-live-001".to_string(),
            voice: None,
            system_instruction: None,
            greeting: "Greet the caller and ask how you can help.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Microphone rate in Hz.
    pub capture_sample_rate: u32,
    /// Output sink rate in Hz; matches what the remote service returns.
    pub playback_sample_rate: u32,
    /// Samples per capture block.
    pub block_size: usize,
    /// Peak amplitude above this counts as user speech.
    pub activity_threshold: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            capture_sample_rate: 16000,
            playback_sample_rate: 24000,
            block_size: 4096,
            activity_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub failure_policy: ToolFailurePolicy,
}

impl Config {
    /// Load from a named config file; defaults apply for anything missing,
    /// including a missing file.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
