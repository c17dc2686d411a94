//! Configuration for the vodscribe pipeline

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chunker::ChunkerConfig;
use crate::error::{PipelineError, Result};

/// Default config file location, overridable with VODSCRIBE_CONFIG
pub const DEFAULT_CONFIG_PATH: &str = "config/vodscribe.toml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Job queue settings
    pub queue: QueueConfig,

    /// Semantic chunker settings
    pub chunker: ChunkerConfig,

    /// Transcription adapter and provider settings
    pub transcription: TranscriptionConfig,

    /// Worker settings
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Lease window after which an unacked active job is redelivered
    pub lease_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Speech-to-text endpoint (Whisper-style multipart API)
    pub api_endpoint: String,

    /// API key for the transcription service
    pub api_key: Option<String>,

    /// Model to request from the provider
    pub model: String,

    /// Target sample rate for extracted audio
    pub target_sample_rate: u32,

    /// Timeout for the provider call (seconds)
    pub request_timeout_secs: u64,

    /// Connection timeout for downloads and provider calls (seconds)
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Name for this worker instance, used in logs
    pub worker_name: String,

    /// Optional directory for per-video SRT transcript artifacts
    pub export_srt_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue: QueueConfig {
                lease_timeout_secs: 30,
            },
            chunker: ChunkerConfig::default(),
            transcription: TranscriptionConfig {
                api_endpoint: "http://localhost:9000/v1/audio/transcriptions".to_string(),
                api_key: None,
                model: "whisper-1".to_string(),
                target_sample_rate: 16000, // 16kHz optimal for Whisper
                request_timeout_secs: 3600, // 60 minutes for large files
                connect_timeout_secs: 30,
            },
            worker: WorkerConfig {
                worker_name: "vodscribe-worker-1".to_string(),
                export_srt_dir: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from the default path (or VODSCRIBE_CONFIG)
    pub fn load() -> Result<Self> {
        let path = std::env::var("VODSCRIBE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)
            .map_err(|e| PipelineError::Validation(format!("config parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Validation(format!("config serialize error: {}", e)))?;
        std::fs::write(path, config_str)?;
        Ok(())
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.chunker.max_words == 0 {
            return Err(PipelineError::Validation(
                "chunker.max_words must be positive".into(),
            ));
        }
        if self.chunker.min_words > self.chunker.max_words {
            return Err(PipelineError::Validation(
                "chunker.min_words must not exceed chunker.max_words".into(),
            ));
        }
        if self.chunker.pause_threshold_secs <= 0.0 {
            return Err(PipelineError::Validation(
                "chunker.pause_threshold_secs must be positive".into(),
            ));
        }
        if self.queue.lease_timeout_secs == 0 {
            return Err(PipelineError::Validation(
                "queue.lease_timeout_secs must be positive".into(),
            ));
        }
        if self.transcription.api_endpoint.trim().is_empty() {
            return Err(PipelineError::Validation(
                "transcription.api_endpoint must be set".into(),
            ));
        }
        if self.transcription.target_sample_rate == 0 {
            return Err(PipelineError::Validation(
                "transcription.target_sample_rate must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_lease_timeout_secs(mut self, secs: u64) -> Self {
        self.config.queue.lease_timeout_secs = secs;
        self
    }

    pub fn with_chunk_bounds(mut self, min_words: usize, max_words: usize) -> Self {
        self.config.chunker.min_words = min_words;
        self.config.chunker.max_words = max_words;
        self
    }

    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.transcription.api_endpoint = endpoint.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.transcription.api_key = Some(api_key.into());
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker.worker_name = name.into();
        self
    }

    pub fn with_export_srt_dir(mut self, dir: PathBuf) -> Self {
        self.config.worker.export_srt_dir = Some(dir);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
