use crate::error::{DubError, Result};

/// Extra plays of the video input needed to cover `target_duration`.
///
/// `-stream_loop N` plays the input `N + 1` times, so the floor of the
/// ratio already gives at least `target_duration` of picture.
pub fn loop_count(video_duration: f64, target_duration: f64) -> Result<u32> {
    ensure_positive("video duration", video_duration)?;
    ensure_positive("target duration", target_duration)?;

    if target_duration > video_duration {
        Ok((target_duration / video_duration).floor() as u32)
    } else {
        Ok(0)
    }
}

pub(crate) fn ensure_positive(what: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DubError::InvalidDuration { what, value })
    }
}
