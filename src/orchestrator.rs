//! Runs one dubbing job: probe, plan, encode.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audio_mix::build_audio_filter;
use crate::config::Config;
use crate::encode::{compose_and_encode, EncodeRequest};
use crate::error::{DubError, Result};
use crate::looping::loop_count;
use crate::probe::Prober;
use crate::process::ToolRunner;
use crate::style::{encode_style, SubtitleStyle};

/// The aggregate request for one dubbed video.
#[derive(Debug, Clone)]
pub struct DubbingJob {
    pub video: PathBuf,
    pub speech: PathBuf,
    pub subtitles: PathBuf,
    pub style: SubtitleStyle,
    /// Multiplier for the original track; 0 keeps only the speech.
    pub background_volume: f64,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Init,
    Probed,
    FilterBuilt,
    Encoding,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Init => "init",
            JobState::Probed => "probed",
            JobState::FilterBuilt => "filter-built",
            JobState::Encoding => "encoding",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Removes the output file unless the job reached `Done`.
struct OutputGuard<'a> {
    path: &'a Path,
    committed: bool,
}

impl<'a> OutputGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for OutputGuard<'_> {
    fn drop(&mut self) {
        if !self.committed && self.path.exists() {
            if let Err(e) = std::fs::remove_file(self.path) {
                warn!(path = %self.path.display(), error = %e, "could not remove partial output");
            }
        }
    }
}

pub struct Dubber {
    config: Config,
    runner: ToolRunner,
}

impl Dubber {
    pub fn new(config: Config, cancel: CancellationToken) -> Self {
        Self {
            config,
            runner: ToolRunner::new(cancel),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runner(&self) -> &ToolRunner {
        &self.runner
    }

    pub fn prober(&self) -> Prober<'_> {
        Prober::new(&self.runner, &self.config.ffprobe, self.config.probe_timeout)
    }

    /// Produces the dubbed video and returns its path.
    ///
    /// On any failure no output path is returned and a partially written
    /// file at `job.output` is removed.
    pub async fn dub(&self, job: &DubbingJob) -> Result<PathBuf> {
        let mut state = JobState::Init;
        let result = self.run(job, &mut state).await;
        match &result {
            Ok(path) => info!(state = %JobState::Done, output = %path.display(), "dubbing finished"),
            Err(e) => warn!(state = %JobState::Failed, last = %state, error = %e, "dubbing failed"),
        }
        result
    }

    async fn run(&self, job: &DubbingJob, state: &mut JobState) -> Result<PathBuf> {
        ensure_exists("video", &job.video)?;
        ensure_exists("speech", &job.speech)?;
        ensure_exists("subtitle", &job.subtitles)?;

        let prober = self.prober();
        let video_duration = prober.duration(&job.video).await?;
        let speech_duration = prober.duration(&job.speech).await?;
        let has_audio = prober.has_audio_stream(&job.video).await;
        advance(state, JobState::Probed);
        info!(video_duration, speech_duration, has_audio, "probed inputs");

        let loops = loop_count(video_duration, speech_duration)?;
        let audio_filter = build_audio_filter(has_audio, job.background_volume, speech_duration)?;
        let style = encode_style(&job.style);
        advance(state, JobState::FilterBuilt);
        info!(loops, branch = ?audio_filter.branch, "planned encode");

        if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let guard = OutputGuard::new(&job.output);
        advance(state, JobState::Encoding);
        let request = EncodeRequest {
            video: &job.video,
            speech: &job.speech,
            subtitles: &job.subtitles,
            style: &style,
            audio_filter: &audio_filter,
            loop_count: loops,
            output: &job.output,
        };
        compose_and_encode(&self.runner, &self.config.ffmpeg, self.config.encode_timeout, &request).await?;

        if !job.output.exists() {
            return Err(DubError::Encode {
                code: Some(0),
                stderr: "encoder reported success but wrote no output".into(),
            });
        }
        guard.commit();
        advance(state, JobState::Done);
        Ok(job.output.clone())
    }
}

fn advance(state: &mut JobState, next: JobState) {
    tracing::debug!(from = %state, to = %next, "job state");
    *state = next;
}

fn ensure_exists(kind: &'static str, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(DubError::MissingAsset {
            kind,
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_in(dir: &Path) -> DubbingJob {
        DubbingJob {
            video: dir.join("clip.mp4"),
            speech: dir.join("speech.wav"),
            subtitles: dir.join("speech.srt"),
            style: SubtitleStyle::default(),
            background_volume: 0.3,
            output: dir.join("out").join("dubbed.mp4"),
        }
    }

    fn touch_inputs(job: &DubbingJob) {
        for p in [&job.video, &job.speech, &job.subtitles] {
            std::fs::write(p, b"").unwrap();
        }
    }

    #[tokio::test]
    async fn missing_speech_fails_before_any_tool_runs() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_in(dir.path());
        std::fs::write(&job.video, b"").unwrap();
        std::fs::write(&job.subtitles, b"").unwrap();

        // Tools that do not exist: any spawn would surface as ToolUnavailable/Probe.
        let config = Config {
            ffmpeg: dir.path().join("no-ffmpeg"),
            ffprobe: dir.path().join("no-ffprobe"),
            ..Config::default()
        };
        let err = Dubber::new(config, CancellationToken::new())
            .dub(&job)
            .await
            .unwrap_err();
        assert!(matches!(err, DubError::MissingAsset { kind: "speech", .. }));
    }

    #[tokio::test]
    async fn unavailable_prober_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_in(dir.path());
        touch_inputs(&job);

        let config = Config {
            ffprobe: dir.path().join("no-ffprobe"),
            ..Config::default()
        };
        let err = Dubber::new(config, CancellationToken::new())
            .dub(&job)
            .await
            .unwrap_err();
        assert!(matches!(err, DubError::Probe { .. }));
    }

    #[cfg(unix)]
    mod with_fake_tools {
        use super::super::*;
        use super::{job_in, touch_inputs};
        use crate::process::testing::script;

        // Durations keyed by file name; the clip reports an audio stream.
        const FFPROBE: &str = r#"last=""; for a in "$@"; do last="$a"; done
case "$*" in
  *select_streams*)
    case "$last" in *silent*) echo '{"streams": []}' ;; *) echo '{"streams": [{"index": 1}]}' ;; esac ;;
  *)
    case "$last" in *.wav) echo '{"format": {"duration": "12.000000"}}' ;; *) echo '{"format": {"duration": "5.000000"}}' ;; esac ;;
esac"#;

        fn config(dir: &Path, ffmpeg_body: &str) -> Config {
            Config {
                ffprobe: script(dir, "ffprobe", FFPROBE),
                ffmpeg: script(dir, "ffmpeg", ffmpeg_body),
                ..Config::default()
            }
        }

        #[tokio::test]
        async fn loops_and_mixes_when_speech_is_longer() {
            let dir = tempfile::tempdir().unwrap();
            let job = job_in(dir.path());
            touch_inputs(&job);
            let log = dir.path().join("ffmpeg.args");
            let body = format!(
                r#"printf '%s\n' "$@" > '{}'
for a in "$@"; do last="$a"; done
: > "$last""#,
                log.display()
            );

            let out = Dubber::new(config(dir.path(), &body), CancellationToken::new())
                .dub(&job)
                .await
                .unwrap();
            assert_eq!(out, job.output);
            assert!(out.exists());

            let args = std::fs::read_to_string(&log).unwrap();
            let args: Vec<&str> = args.lines().collect();
            let at = args.iter().position(|a| *a == "-stream_loop").unwrap();
            assert_eq!(args[at + 1], "2");
            let graph = args[args.iter().position(|a| *a == "-filter_complex").unwrap() + 1];
            assert!(graph.contains("amix=inputs=2"));
            assert!(graph.contains("volume=0.3"));
            assert!(graph.ends_with("atrim=0:12[outa]"));
            assert!(args.contains(&"-shortest"));
        }

        #[tokio::test]
        async fn silent_video_uses_speech_only() {
            let dir = tempfile::tempdir().unwrap();
            let mut job = job_in(dir.path());
            job.video = dir.path().join("silent.mp4");
            touch_inputs(&job);
            let log = dir.path().join("ffmpeg.args");
            let body = format!(
                r#"printf '%s\n' "$@" > '{}'
for a in "$@"; do last="$a"; done
: > "$last""#,
                log.display()
            );

            Dubber::new(config(dir.path(), &body), CancellationToken::new())
                .dub(&job)
                .await
                .unwrap();
            let args = std::fs::read_to_string(&log).unwrap();
            assert!(args.contains("[1:a]atrim=0:12,volume=1.0[outa]"));
            assert!(!args.contains("[0:a]"));
        }

        #[tokio::test]
        async fn encoder_failure_is_reported_and_output_removed() {
            let dir = tempfile::tempdir().unwrap();
            let job = job_in(dir.path());
            touch_inputs(&job);
            let body = r#"for a in "$@"; do last="$a"; done
echo partial > "$last"
echo "Invalid data found when processing input" >&2
exit 1"#;

            let err = Dubber::new(config(dir.path(), body), CancellationToken::new())
                .dub(&job)
                .await
                .unwrap_err();
            match err {
                DubError::Encode { code, stderr } => {
                    assert_eq!(code, Some(1));
                    assert!(stderr.contains("Invalid data"));
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(!job.output.exists());
        }

        // Writes a partial file at the output path, then stalls.
        const STALLING_FFMPEG: &str = r#"for a in "$@"; do last="$a"; done
echo partial > "$last"
exec sleep 5"#;

        #[tokio::test]
        async fn encoder_timeout_removes_partial_output() {
            let dir = tempfile::tempdir().unwrap();
            let job = job_in(dir.path());
            touch_inputs(&job);
            let config = Config {
                encode_timeout: std::time::Duration::from_millis(500),
                ..config(dir.path(), STALLING_FFMPEG)
            };

            let err = Dubber::new(config, CancellationToken::new())
                .dub(&job)
                .await
                .unwrap_err();
            assert!(matches!(err, DubError::Timeout { .. }), "unexpected error: {err}");
            assert!(!job.output.exists());
        }

        #[tokio::test]
        async fn cancelling_mid_encode_removes_partial_output() {
            let dir = tempfile::tempdir().unwrap();
            let job = job_in(dir.path());
            touch_inputs(&job);
            let cancel = CancellationToken::new();

            let watcher = {
                let cancel = cancel.clone();
                let output = job.output.clone();
                tokio::spawn(async move {
                    while !output.exists() {
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    }
                    cancel.cancel();
                })
            };

            let err = Dubber::new(config(dir.path(), STALLING_FFMPEG), cancel)
                .dub(&job)
                .await
                .unwrap_err();
            watcher.await.unwrap();
            assert!(matches!(err, DubError::Cancelled { .. }), "unexpected error: {err}");
            assert!(!job.output.exists());
        }

        #[tokio::test]
        async fn success_without_output_file_is_an_error() {
            let dir = tempfile::tempdir().unwrap();
            let job = job_in(dir.path());
            touch_inputs(&job);

            let err = Dubber::new(config(dir.path(), "exit 0"), CancellationToken::new())
                .dub(&job)
                .await
                .unwrap_err();
            assert!(matches!(err, DubError::Encode { code: Some(0), .. }));
        }
    }
}
