//! `-filter_complex` graph for the output audio track.
//!
//! Input 0 is the (possibly looped) video, input 1 the speech. Both branches
//! end in the same `[outa]` label so stream mapping never depends on the branch.

use crate::error::{DubError, Result};
use crate::looping::ensure_positive;

/// Label of the single audio stream every graph produces.
pub const OUTPUT_LABEL: &str = "outa";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixBranch {
    /// Original track scaled and mixed under the speech.
    Mixed,
    /// Speech alone.
    SpeechOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioFilter {
    pub graph: String,
    pub branch: MixBranch,
}

impl AudioFilter {
    /// Argument for `-map`.
    pub fn map_target(&self) -> String {
        format!("[{OUTPUT_LABEL}]")
    }
}

/// Builds the audio graph trimmed to `target_duration`.
///
/// A `volume` of exactly zero selects the speech-only branch even when the
/// video has an audio stream.
pub fn build_audio_filter(has_audio: bool, volume: f64, target_duration: f64) -> Result<AudioFilter> {
    ensure_positive("target duration", target_duration)?;
    if !volume.is_finite() || volume < 0.0 {
        return Err(DubError::InvalidVolume(volume));
    }

    let filter = if has_audio && volume > 0.0 {
        AudioFilter {
            graph: format!(
                "[0:a]atrim=0:{d},volume={volume}[va];\
                 [1:a]volume=1.0[ta];\
                 [va][ta]amix=inputs=2:dropout_transition=0,atrim=0:{d}[{OUTPUT_LABEL}]",
                d = target_duration,
            ),
            branch: MixBranch::Mixed,
        }
    } else {
        AudioFilter {
            graph: format!("[1:a]atrim=0:{target_duration},volume=1.0[{OUTPUT_LABEL}]"),
            branch: MixBranch::SpeechOnly,
        }
    };
    Ok(filter)
}
