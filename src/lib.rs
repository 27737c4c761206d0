//! Dub a video with synthesized speech and burned-in subtitles.

pub mod audio_mix;
pub mod captions;
pub mod catalog;
pub mod config;
pub mod encode;
pub mod error;
pub mod filter_escape;
pub mod looping;
pub mod orchestrator;
pub mod probe;
pub mod process;
pub mod registry;
pub mod service;
pub mod style;
pub mod tts;

pub use config::Config;
pub use error::{DubError, Result};
pub use orchestrator::{Dubber, DubbingJob, JobState};
pub use style::SubtitleStyle;
