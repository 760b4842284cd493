use std::sync::{Arc, Mutex};
use anyhow::{Result, Context};
use async_trait::async_trait;

use super::output::OutputContext;
use super::processing::{decode_narration, decode_wav, resample};
use super::{AudioPlayer, NarrationOutcome};

const TICK_WAV: &[u8] = include_bytes!("../../assets/tick.wav");

/// Process-wide output context, opened on first use and reopened once closed.
static OUTPUT_CONTEXT: Mutex<Option<Arc<OutputContext>>> = Mutex::new(None);

/// Tick samples already converted to the rate of the context they were
/// prepared for.
static TICK_SOUND: Mutex<Option<(u32, Arc<[f32]>)>> = Mutex::new(None);

/// Narration and tick playback through the shared output context.
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioPlayback;

impl AudioPlayback {
    pub fn new() -> Self {
        Self
    }
}

fn output_context() -> Result<Arc<OutputContext>> {
    output_context_in(&OUTPUT_CONTEXT, OutputContext::open)
}

/// Returns the context held in `slot`, opening a new one with `open` when
/// there is none yet or the previous one was closed.
fn output_context_in(
    slot: &Mutex<Option<Arc<OutputContext>>>,
    open: impl FnOnce() -> Result<OutputContext>,
) -> Result<Arc<OutputContext>> {
    let mut guard = slot.lock().unwrap();
    if let Some(ctx) = guard.as_ref() {
        if !ctx.is_closed() {
            return Ok(Arc::clone(ctx));
        }
        tracing::info!("Audio output context was closed, reopening");
    }

    let ctx = Arc::new(open()?);
    *guard = Some(Arc::clone(&ctx));
    Ok(ctx)
}

fn resume_if_suspended(ctx: &OutputContext) -> Result<()> {
    if ctx.is_suspended() {
        tracing::debug!("Resuming suspended audio output");
        ctx.resume()?;
    }
    Ok(())
}

fn stop_current_narration() {
    let guard = OUTPUT_CONTEXT.lock().unwrap();
    if let Some(ctx) = guard.as_ref() {
        if ctx.mixer().lock().unwrap().stop_narration() {
            tracing::debug!("Stopped previous narration");
        }
    }
}

fn tick_samples(sample_rate: u32) -> Result<Arc<[f32]>> {
    let mut guard = TICK_SOUND.lock().unwrap();
    if let Some((rate, samples)) = guard.as_ref() {
        if *rate == sample_rate {
            return Ok(Arc::clone(samples));
        }
    }

    let tick = decode_wav(TICK_WAV).context("Failed to decode tick sound")?;
    let samples: Arc<[f32]> = resample(&tick.samples, tick.sample_rate, sample_rate)?.into();
    *guard = Some((sample_rate, Arc::clone(&samples)));
    Ok(samples)
}

fn play_tick_blocking() -> Result<()> {
    let ctx = output_context()?;
    let samples = tick_samples(ctx.sample_rate())?;
    resume_if_suspended(&ctx)?;
    ctx.mixer().lock().unwrap().add_tick(samples);
    Ok(())
}

#[async_trait]
impl AudioPlayer for AudioPlayback {
    async fn play_narration(
        &self,
        encoded_audio: &str,
        still_current: &(dyn Fn() -> bool + Send + Sync),
    ) -> Result<NarrationOutcome> {
        if encoded_audio.is_empty() {
            return Ok(NarrationOutcome::Skipped);
        }
        if !still_current() {
            return Ok(NarrationOutcome::Cancelled);
        }

        stop_current_narration();

        let ctx = tokio::task::spawn_blocking(output_context)
            .await
            .context("Audio output task failed")??;
        if !still_current() {
            return Ok(NarrationOutcome::Cancelled);
        }
        resume_if_suspended(&ctx)?;

        let encoded = encoded_audio.to_string();
        let device_rate = ctx.sample_rate();
        let samples = tokio::task::spawn_blocking(move || -> Result<Vec<f32>> {
            let buffer = decode_narration(&encoded)?;
            resample(&buffer.samples, buffer.sample_rate, device_rate)
        })
        .await
        .context("Narration decode task failed")??;
        if !still_current() {
            return Ok(NarrationOutcome::Cancelled);
        }

        tracing::debug!("Playing narration ({} samples at {}Hz)", samples.len(), device_rate);

        let done = ctx.mixer().lock().unwrap().start_narration(samples);
        if ctx.is_closed() {
            ctx.mixer().lock().unwrap().stop_narration();
            anyhow::bail!("Audio output context closed before playback started");
        }

        Ok(match done.await {
            Ok(()) => NarrationOutcome::Completed,
            Err(_) => NarrationOutcome::Interrupted,
        })
    }

    fn play_tick(&self) {
        // Detached: a tick never waits on, or blocks, anything else
        drop(tokio::task::spawn_blocking(|| {
            if let Err(e) = play_tick_blocking() {
                tracing::debug!("Tick skipped: {:#}", e);
            }
        }));
    }
}
