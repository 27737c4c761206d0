use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DubError, Result};

/// One timed subtitle entry. `index` is the 1-based position in the track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionCue {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl CaptionCue {
    fn validate(&self) -> Result<()> {
        let valid = self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.end >= self.start;
        if valid {
            Ok(())
        } else {
            Err(DubError::Tts(format!(
                "cue {} has invalid timing {}..{}",
                self.index, self.start, self.end
            )))
        }
    }
}

/// Renders cues as SRT, keeping their order.
pub fn render_srt(cues: &[CaptionCue]) -> Result<String> {
    let mut out = String::new();
    for cue in cues {
        cue.validate()?;
        // writing to a String cannot fail
        let _ = writeln!(
            out,
            "{}\n{} --> {}\n{}\n",
            cue.index,
            format_srt_time(cue.start),
            format_srt_time(cue.end),
            cue.text
        );
    }
    Ok(out)
}

pub async fn write_srt(path: &Path, cues: &[CaptionCue]) -> Result<()> {
    let body = render_srt(cues)?;
    tokio::fs::write(path, body).await?;
    Ok(())
}

fn format_srt_time(seconds: f64) -> String {
    // HH:MM:SS,mmm
    let total_ms = (seconds * 1000.0).round() as i64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let s = total_secs % 60;
    let total_mins = total_secs / 60;
    let m = total_mins % 60;
    let h = total_mins / 60;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}
