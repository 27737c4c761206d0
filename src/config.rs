use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DubError, Result};

/// Runtime settings, read from the environment (and `.env` via dotenvy in the binary).
#[derive(Debug, Clone)]
pub struct Config {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub output_dir: PathBuf,
    pub samples_dir: PathBuf,
    pub probe_timeout: Duration,
    pub encode_timeout: Duration,
    pub openai_api_key: Option<String>,
    pub tts_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            output_dir: PathBuf::from("outputs"),
            samples_dir: PathBuf::from("videos"),
            probe_timeout: Duration::from_secs(30),
            encode_timeout: Duration::from_secs(3600),
            openai_api_key: None,
            tts_model: "gpt-4o-mini-tts".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            ffmpeg: path_var("DUBBER_FFMPEG").unwrap_or(defaults.ffmpeg),
            ffprobe: path_var("DUBBER_FFPROBE").unwrap_or(defaults.ffprobe),
            output_dir: path_var("DUBBER_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            samples_dir: path_var("DUBBER_SAMPLES_DIR").unwrap_or(defaults.samples_dir),
            probe_timeout: secs_var("DUBBER_PROBE_TIMEOUT_SECS")?.unwrap_or(defaults.probe_timeout),
            encode_timeout: secs_var("DUBBER_ENCODE_TIMEOUT_SECS")?
                .unwrap_or(defaults.encode_timeout),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            tts_model: env::var("DUBBER_TTS_MODEL").unwrap_or(defaults.tts_model),
        })
    }
}

fn path_var(name: &str) -> Option<PathBuf> {
    env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn secs_var(name: &str) -> Result<Option<Duration>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| DubError::Config(format!("{name} must be a whole number of seconds, got {raw:?}"))),
        Err(_) => Ok(None),
    }
}
