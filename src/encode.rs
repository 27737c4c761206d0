//! Final ffmpeg invocation: loop, burn subtitles, map the mixed audio.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::audio_mix::AudioFilter;
use crate::error::{DubError, Result};
use crate::filter_escape;
use crate::process::ToolRunner;

const VIDEO_CODEC: &str = "libx264";
const VIDEO_PRESET: &str = "fast";
const PIXEL_FORMAT: &str = "yuv420p";
const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "192k";

/// Everything the encoder needs for one job.
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    pub video: &'a Path,
    pub speech: &'a Path,
    pub subtitles: &'a Path,
    pub style: &'a str,
    pub audio_filter: &'a AudioFilter,
    pub loop_count: u32,
    pub output: &'a Path,
}

/// Builds the ffmpeg argument list, in the order the encoder expects.
pub fn compose_args(req: &EncodeRequest<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into(), "-y".into()];

    // -stream_loop applies to the input that follows it: the video.
    if req.loop_count > 0 {
        args.push("-stream_loop".into());
        args.push(req.loop_count.to_string().into());
    }

    args.push("-i".into());
    args.push(req.video.into());
    args.push("-i".into());
    args.push(req.speech.into());

    args.push("-vf".into());
    args.push(subtitles_filter(req.subtitles, req.style).into());
    args.push("-filter_complex".into());
    args.push(req.audio_filter.graph.clone().into());

    args.push("-map".into());
    args.push("0:v:0".into());
    args.push("-map".into());
    args.push(req.audio_filter.map_target().into());

    for arg in [
        "-c:v", VIDEO_CODEC, "-preset", VIDEO_PRESET, "-pix_fmt", PIXEL_FORMAT, "-c:a", AUDIO_CODEC,
        "-b:a", AUDIO_BITRATE, "-shortest",
    ] {
        args.push(arg.into());
    }
    args.push(req.output.into());
    args
}

/// `subtitles=<path>:force_style=<style>`, with `style` already escaped by
/// [`encode_style`](crate::style::encode_style).
pub fn subtitles_filter(srt: &Path, style: &str) -> String {
    let path = srt.to_string_lossy().replace('\\', "/");
    let path = filter_escape::graph(&filter_escape::option(&path));
    format!("subtitles={path}:force_style={style}")
}

/// Runs ffmpeg to completion; any non-zero exit is an [`DubError::Encode`].
pub async fn compose_and_encode(
    runner: &ToolRunner,
    ffmpeg: &Path,
    timeout: Duration,
    req: &EncodeRequest<'_>,
) -> Result<()> {
    let args = compose_args(req);
    debug!(args = ?args, "ffmpeg arguments");
    info!(output = %req.output.display(), loops = req.loop_count, "encoding dubbed video");

    let out = runner.run(ffmpeg, &args, timeout).await?;
    if !out.success() {
        return Err(DubError::Encode {
            code: out.code,
            stderr: out.stderr.trim().to_string(),
        });
    }
    Ok(())
}
