//! Text + catalog video in, dubbed video out.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::orchestrator::{Dubber, DubbingJob};
use crate::registry::ModelRegistry;
use crate::style::SubtitleStyle;
use crate::tts::{SpeechRequest, Workspace};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub tts: SpeechRequest,
    #[serde(default)]
    pub subtitle: SubtitleStyle,
    #[serde(default)]
    pub background_volume: f64,
    pub video_id: String,
}

/// Synthesizes the speech, then dubs the catalog video with it.
///
/// Speech artifacts live in a temporary directory that is removed on return.
pub async fn generate_dub(
    dubber: &Dubber,
    registry: &ModelRegistry,
    catalog: &Catalog,
    model_name: &str,
    request: &GenerateRequest,
) -> Result<PathBuf> {
    let engine = registry.get(model_name)?;
    let video = catalog.resolve(&request.video_id).await?;

    let config = dubber.config();
    tokio::fs::create_dir_all(&config.output_dir).await?;
    let scratch = tempfile::Builder::new()
        .prefix(".speech-")
        .tempdir_in(&config.output_dir)?;

    let speech = engine
        .generate(
            &request.tts,
            Workspace {
                dir: scratch.path(),
                runner: dubber.runner(),
                config,
            },
        )
        .await?;
    info!(model = model_name, duration = speech.duration, cues = speech.cues.len(), "speech generated");

    let job = DubbingJob {
        video,
        speech: speech.audio_path,
        subtitles: speech.srt_path,
        style: request.subtitle.clone(),
        background_volume: request.background_volume,
        output: config.output_dir.join(format!("{}.mp4", uuid::Uuid::new_v4())),
    };
    dubber.dub(&job).await
}
