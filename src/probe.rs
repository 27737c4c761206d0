//! ffprobe queries: container duration and audio stream presence.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{DubError, Result};
use crate::process::ToolRunner;

#[derive(Debug, Deserialize)]
struct FormatReport {
    format: FormatSection,
}

#[derive(Debug, Deserialize)]
struct FormatSection {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamsReport {
    #[serde(default)]
    streams: Vec<serde_json::Value>,
}

/// Probes media files through an ffprobe binary.
#[derive(Debug, Clone)]
pub struct Prober<'a> {
    runner: &'a ToolRunner,
    ffprobe: &'a Path,
    timeout: Duration,
}

impl<'a> Prober<'a> {
    pub fn new(runner: &'a ToolRunner, ffprobe: &'a Path, timeout: Duration) -> Self {
        Self {
            runner,
            ffprobe,
            timeout,
        }
    }

    /// Container-level duration in seconds. Any failure is fatal to the caller.
    pub async fn duration(&self, path: &Path) -> Result<f64> {
        if !path.exists() {
            return Err(DubError::Probe {
                path: path.to_path_buf(),
                reason: "file does not exist".into(),
            });
        }

        let args = [
            OsStr::new("-v"),
            OsStr::new("error"),
            OsStr::new("-show_entries"),
            OsStr::new("format=duration"),
            OsStr::new("-of"),
            OsStr::new("json"),
            path.as_os_str(),
        ];
        let out = match self.runner.run(self.ffprobe, args, self.timeout).await {
            Ok(out) => out,
            Err(e @ (DubError::Cancelled { .. } | DubError::Timeout { .. })) => return Err(e),
            Err(e) => {
                return Err(DubError::Probe {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };
        if !out.success() {
            return Err(DubError::Probe {
                path: path.to_path_buf(),
                reason: format!("ffprobe exited with {:?}: {}", out.code, out.stderr.trim()),
            });
        }

        let seconds = parse_duration(&out.stdout).map_err(|reason| DubError::Probe {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!(path = %path.display(), seconds, "probed duration");
        Ok(seconds)
    }

    /// Whether the container holds at least one audio stream.
    ///
    /// Tool failures count as "no audio"; a missing stream is the common case.
    pub async fn has_audio_stream(&self, video: &Path) -> bool {
        let args = [
            OsStr::new("-v"),
            OsStr::new("error"),
            OsStr::new("-select_streams"),
            OsStr::new("a"),
            OsStr::new("-show_entries"),
            OsStr::new("stream=index"),
            OsStr::new("-of"),
            OsStr::new("json"),
            video.as_os_str(),
        ];
        match self.runner.run(self.ffprobe, args, self.timeout).await {
            Ok(out) => parse_has_streams(&out.stdout),
            Err(e) => {
                warn!(path = %video.display(), error = %e, "audio stream probe failed; assuming none");
                false
            }
        }
    }
}

fn parse_duration(stdout: &str) -> std::result::Result<f64, String> {
    let report: FormatReport =
        serde_json::from_str(stdout).map_err(|e| format!("unreadable ffprobe output: {e}"))?;
    let raw = report
        .format
        .duration
        .ok_or_else(|| "ffprobe reported no duration".to_string())?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("duration {raw:?} is not a number"))
}

fn parse_has_streams(stdout: &str) -> bool {
    serde_json::from_str::<StreamsReport>(stdout)
        .map(|r| !r.streams.is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_duration() {
        let json = r#"{"format": {"duration": "12.480000"}}"#;
        assert_eq!(parse_duration(json).unwrap(), 12.48);
    }

    #[test]
    fn rejects_missing_or_garbage_duration() {
        assert!(parse_duration(r#"{"format": {}}"#).is_err());
        assert!(parse_duration(r#"{"format": {"duration": "N/A"}}"#).is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn detects_audio_streams() {
        assert!(parse_has_streams(r#"{"streams": [{"index": 1}]}"#));
        assert!(!parse_has_streams(r#"{"streams": []}"#));
        assert!(!parse_has_streams(r#"{}"#));
        assert!(!parse_has_streams("not json"));
    }

    #[tokio::test]
    async fn missing_file_is_probe_error() {
        let runner = ToolRunner::default();
        let prober = Prober::new(&runner, Path::new("ffprobe"), Duration::from_secs(1));
        let err = prober
            .duration(Path::new("/definitely/not/here.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DubError::Probe { .. }));
    }

    #[tokio::test]
    async fn unavailable_tool_means_no_audio() {
        let runner = ToolRunner::default();
        let prober = Prober::new(&runner, Path::new("/nonexistent/ffprobe"), Duration::from_secs(1));
        assert!(!prober.has_audio_stream(Path::new("video.mp4")).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probes_through_tool() {
        use crate::process::testing::script;

        let dir = tempfile::tempdir().unwrap();
        let ffprobe = script(
            dir.path(),
            "ffprobe",
            r#"case "$*" in
  *format=duration*) echo '{"format": {"duration": "7.250000"}}' ;;
  *) echo '{"streams": [{"index": 1}]}' ;;
esac"#,
        );
        let media = dir.path().join("clip.mp4");
        std::fs::write(&media, b"").unwrap();

        let runner = ToolRunner::default();
        let prober = Prober::new(&runner, &ffprobe, Duration::from_secs(5));
        assert_eq!(prober.duration(&media).await.unwrap(), 7.25);
        assert!(prober.has_audio_stream(&media).await);
    }
}
