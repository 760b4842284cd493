pub mod output;
pub mod playback;
pub mod processing;

use anyhow::Result;
use async_trait::async_trait;

pub use playback::AudioPlayback;

/// Mono audio buffer for passing audio data between modules
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// How a narration request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationOutcome {
    /// Nothing to play (empty payload)
    Skipped,
    Completed,
    /// Another narration took over the output before this one ended
    Interrupted,
    /// The caller stopped wanting it before it reached the output
    Cancelled,
}

/// Audio capability the quiz controllers depend on.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Plays base64 PCM16 narration, resolving once playback ends. Any
    /// narration already playing is stopped first.
    ///
    /// `still_current` is checked on entry and again after every suspension
    /// before the narration takes over the output. Once it returns false the
    /// call resolves with [`NarrationOutcome::Cancelled`] without starting
    /// playback.
    async fn play_narration(
        &self,
        encoded_audio: &str,
        still_current: &(dyn Fn() -> bool + Send + Sync),
    ) -> Result<NarrationOutcome>;

    /// Fire-and-forget tick on an output lane independent of narration.
    fn play_tick(&self);
}
