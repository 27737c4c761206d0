//! Speech synthesis engines.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::captions::{write_srt, CaptionCue};
use crate::config::Config;
use crate::error::{DubError, Result};
use crate::probe::Prober;
use crate::process::ToolRunner;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Option<String>,
    pub speed: f64,
    /// Pause inserted between sentences, in seconds.
    pub silence_duration: f64,
    /// Pause appended after the last sentence, in seconds.
    pub end_silence_duration: f64,
}

impl Default for SpeechRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            voice: None,
            speed: 1.05,
            silence_duration: 0.3,
            end_silence_duration: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechResult {
    pub audio_path: PathBuf,
    pub srt_path: PathBuf,
    pub duration: f64,
    pub cues: Vec<CaptionCue>,
}

/// Scratch space and tools an engine may use for one request.
#[derive(Debug, Clone, Copy)]
pub struct Workspace<'a> {
    pub dir: &'a Path,
    pub runner: &'a ToolRunner,
    pub config: &'a Config,
}

#[async_trait]
pub trait TtsEngine: Send + Sync {
    fn name(&self) -> &str;

    fn available_voices(&self) -> Vec<String>;

    fn supports_voice_cloning(&self) -> bool;

    /// Synthesizes `request` into `workspace.dir`, returning the audio, its
    /// SRT captions and the total duration.
    async fn generate(&self, request: &SpeechRequest, workspace: Workspace<'_>) -> Result<SpeechResult>;
}

pub const OPENAI_VOICES: &[&str] = &[
    "alloy", "ash", "coral", "echo", "fable", "onyx", "nova", "sage", "shimmer",
];

/// OpenAI `/v1/audio/speech`, one request per sentence.
pub struct OpenAiSpeech {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiSpeech {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn synthesize(&self, text: &str, voice: &str, speed: f64) -> Result<Vec<u8>> {
        let body = json!({
            "model": self.model,
            "input": text,
            "voice": voice,
            "response_format": "wav",
            "speed": speed,
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(DubError::Tts(format!("OpenAI speech error {}: {}", status, text)));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl TtsEngine for OpenAiSpeech {
    fn name(&self) -> &str {
        &self.model
    }

    fn available_voices(&self) -> Vec<String> {
        OPENAI_VOICES.iter().map(|v| v.to_string()).collect()
    }

    fn supports_voice_cloning(&self) -> bool {
        false
    }

    async fn generate(&self, request: &SpeechRequest, workspace: Workspace<'_>) -> Result<SpeechResult> {
        let voice = request.voice.as_deref().unwrap_or_default();
        if !OPENAI_VOICES.contains(&voice) {
            return Err(DubError::Voice(voice.to_string()));
        }
        if !(0.25..=4.0).contains(&request.speed) {
            return Err(DubError::Tts(format!("speed {} outside 0.25..=4.0", request.speed)));
        }
        let sentences = split_sentences(&request.text);
        if sentences.is_empty() {
            return Err(DubError::Tts("nothing to synthesize".into()));
        }

        let prober = Prober::new(
            workspace.runner,
            &workspace.config.ffprobe,
            workspace.config.probe_timeout,
        );
        let mut clips = Vec::with_capacity(sentences.len());
        for (i, sentence) in sentences.iter().enumerate() {
            let audio = self.synthesize(sentence, voice, request.speed).await?;
            let path = workspace.dir.join(format!("sentence_{i:03}.wav"));
            tokio::fs::write(&path, audio).await?;
            let duration = prober.duration(&path).await?;
            debug!(index = i, duration, "synthesized sentence");
            clips.push(Clip { path, duration });
        }

        let pauses = pauses(clips.len(), request.silence_duration, request.end_silence_duration);
        let cues = layout_cues(&sentences, &clips, &pauses);
        let duration = clips.iter().map(|c| c.duration).sum::<f64>() + pauses.iter().sum::<f64>();

        let audio_path = workspace.dir.join("speech.wav");
        concat_clips(workspace, &clips, &pauses, &audio_path).await?;
        let srt_path = workspace.dir.join("speech.srt");
        write_srt(&srt_path, &cues).await?;

        info!(sentences = cues.len(), duration, "speech ready");
        Ok(SpeechResult {
            audio_path,
            srt_path,
            duration,
            cues,
        })
    }
}

struct Clip {
    path: PathBuf,
    duration: f64,
}

// Words that end in a period without ending the sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "st", "jr", "sr", "vs", "etc", "e.g", "i.e", "fig",
];

/// Splits on sentence-ending punctuation, keeping it attached.
///
/// Latin `.` `!` `?` end a sentence only before whitespace or the end of the
/// text, so decimals like `3.5` stay whole; a period after a known
/// abbreviation or a single-letter initial does not end one. Full-width
/// `。` `！` `？` always do.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let ends = match c {
            '。' | '！' | '？' => true,
            '.' | '!' | '?' => {
                let at_boundary = chars.peek().map_or(true, |next| next.is_whitespace());
                at_boundary && !(c == '.' && ends_with_abbreviation(&current))
            }
            _ => false,
        };
        if ends {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

// `current` ends with the period in question.
fn ends_with_abbreviation(current: &str) -> bool {
    let body = &current[..current.len() - 1];
    let word = body.rsplit(char::is_whitespace).next().unwrap_or("");
    let word = word.trim_start_matches(|c: char| !c.is_alphanumeric());
    let mut letters = word.chars();
    match (letters.next(), letters.next()) {
        (Some(first), None) => first.is_alphabetic(),
        _ => ABBREVIATIONS.contains(&word.to_lowercase().as_str()),
    }
}

fn pauses(count: usize, between: f64, end: f64) -> Vec<f64> {
    (0..count)
        .map(|i| if i + 1 == count { end.max(0.0) } else { between.max(0.0) })
        .collect()
}

fn layout_cues(sentences: &[String], clips: &[Clip], pauses: &[f64]) -> Vec<CaptionCue> {
    let mut cursor = 0.0;
    sentences
        .iter()
        .zip(clips.iter().zip(pauses))
        .enumerate()
        .map(|(i, (text, (clip, pause)))| {
            let start = cursor;
            let end = start + clip.duration;
            cursor = end + pause;
            CaptionCue {
                index: i + 1,
                start,
                end,
                text: text.clone(),
            }
        })
        .collect()
}

fn concat_graph(pauses: &[f64]) -> String {
    let mut graph = String::new();
    for (i, pause) in pauses.iter().enumerate() {
        graph.push_str(&format!("[{i}:a]apad=pad_dur={pause}[p{i}];"));
    }
    for i in 0..pauses.len() {
        graph.push_str(&format!("[p{i}]"));
    }
    graph.push_str(&format!("concat=n={}:v=0:a=1[speech]", pauses.len()));
    graph
}

async fn concat_clips(workspace: Workspace<'_>, clips: &[Clip], pauses: &[f64], output: &Path) -> Result<()> {
    let mut args: Vec<std::ffi::OsString> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into(), "-y".into()];
    for clip in clips {
        args.push("-i".into());
        args.push(clip.path.clone().into());
    }
    args.push("-filter_complex".into());
    args.push(concat_graph(pauses).into());
    args.push("-map".into());
    args.push("[speech]".into());
    args.push("-c:a".into());
    args.push("pcm_s16le".into());
    args.push(output.into());

    let out = workspace
        .runner
        .run(&workspace.config.ffmpeg, &args, workspace.config.encode_timeout)
        .await?;
    if !out.success() {
        return Err(DubError::Tts(format!("joining sentences failed: {}", out.stderr.trim())));
    }
    Ok(())
}
