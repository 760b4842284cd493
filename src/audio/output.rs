use std::sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}};
use std::sync::mpsc;
use anyhow::{Result, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::oneshot;

/// One playing buffer. `done` fires when the last sample has been rendered;
/// dropping it instead tells the waiter the voice was cut short.
struct Voice {
    samples: Arc<[f32]>,
    position: usize,
    done: Option<oneshot::Sender<()>>,
}

impl Voice {
    fn new(samples: Arc<[f32]>, done: Option<oneshot::Sender<()>>) -> Self {
        Self { samples, position: 0, done }
    }

    fn next_sample(&mut self) -> Option<f32> {
        let sample = self.samples.get(self.position).copied()?;
        self.position += 1;
        Some(sample)
    }

    fn is_finished(&self) -> bool {
        self.position >= self.samples.len()
    }

    fn finish(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

/// Mixes the single narration lane with any number of one-shot ticks.
/// All buffers must already be at the device sample rate.
#[derive(Default)]
pub struct Mixer {
    narration: Option<Voice>,
    ticks: Vec<Voice>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever narration is playing. The returned receiver resolves
    /// with `Ok` when the new narration ends naturally and with `Err` if it is
    /// interrupted.
    pub fn start_narration(&mut self, samples: Vec<f32>) -> oneshot::Receiver<()> {
        self.stop_narration();
        let (tx, rx) = oneshot::channel();
        let mut voice = Voice::new(samples.into(), Some(tx));
        if voice.is_finished() {
            voice.finish();
        } else {
            self.narration = Some(voice);
        }
        rx
    }

    /// Returns true if a narration was cut.
    pub fn stop_narration(&mut self) -> bool {
        // Dropping the voice drops its sender
        self.narration.take().is_some()
    }

    #[cfg(test)]
    pub fn is_narrating(&self) -> bool {
        self.narration.is_some()
    }

    pub fn add_tick(&mut self, samples: Arc<[f32]>) {
        self.ticks.push(Voice::new(samples, None));
    }

    /// Drops every voice; pending narration waiters see an interruption.
    pub fn clear(&mut self) {
        self.narration = None;
        self.ticks.clear();
    }

    #[cfg(test)]
    pub fn active_ticks(&self) -> usize {
        self.ticks.len()
    }

    /// Renders interleaved frames for `channels` output channels. Mono voices
    /// are copied to every channel.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let mut value = 0.0f32;
            if let Some(voice) = self.narration.as_mut() {
                value += voice.next_sample().unwrap_or(0.0);
            }
            for tick in self.ticks.iter_mut() {
                value += tick.next_sample().unwrap_or(0.0);
            }
            frame.fill(value.clamp(-1.0, 1.0));
        }

        if self.narration.as_ref().is_some_and(Voice::is_finished) {
            if let Some(mut voice) = self.narration.take() {
                voice.finish();
            }
        }
        self.ticks.retain(|tick| !tick.is_finished());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextCommand {
    Resume,
    Close,
}

/// Output context: one cpal output stream living on its own thread, fed by a
/// shared [`Mixer`]. Starts suspended; `resume` must be called before sound
/// is produced.
pub struct OutputContext {
    mixer: Arc<Mutex<Mixer>>,
    commands: mpsc::Sender<ContextCommand>,
    sample_rate: u32,
    suspended: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl OutputContext {
    pub fn open() -> Result<Self> {
        let mixer = Arc::new(Mutex::new(Mixer::new()));
        let suspended = Arc::new(AtomicBool::new(true));
        let closed = Arc::new(AtomicBool::new(false));
        let (commands, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        {
            let mixer = Arc::clone(&mixer);
            let suspended = Arc::clone(&suspended);
            let closed = Arc::clone(&closed);
            std::thread::Builder::new()
                .name("audio-output".into())
                .spawn(move || run_output_thread(mixer, suspended, closed, command_rx, ready_tx))
                .context("Failed to spawn audio output thread")?;
        }

        let sample_rate = ready_rx
            .recv()
            .context("Audio output thread exited during startup")??;

        tracing::info!("Audio output context opened ({}Hz)", sample_rate);

        Ok(Self {
            mixer,
            commands,
            sample_rate,
            suspended,
            closed,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn resume(&self) -> Result<()> {
        self.commands
            .send(ContextCommand::Resume)
            .map_err(|_| anyhow::anyhow!("Audio output context is closed"))
    }

    pub fn mixer(&self) -> &Arc<Mutex<Mixer>> {
        &self.mixer
    }

    /// A suspended context with no device behind it. Commands land in the
    /// returned receiver instead of an output thread.
    #[cfg(test)]
    pub fn detached(sample_rate: u32) -> (Self, mpsc::Receiver<ContextCommand>) {
        let (commands, command_rx) = mpsc::channel();
        let ctx = Self {
            mixer: Arc::new(Mutex::new(Mixer::new())),
            commands,
            sample_rate,
            suspended: Arc::new(AtomicBool::new(true)),
            closed: Arc::new(AtomicBool::new(false)),
        };
        (ctx, command_rx)
    }

    #[cfg(test)]
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn mark_running(&self) {
        self.suspended.store(false, Ordering::SeqCst);
    }
}

impl Drop for OutputContext {
    fn drop(&mut self) {
        let _ = self.commands.send(ContextCommand::Close);
    }
}

fn run_output_thread(
    mixer: Arc<Mutex<Mixer>>,
    suspended: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    commands: mpsc::Receiver<ContextCommand>,
    ready: mpsc::Sender<Result<u32>>,
) {
    let (stream, sample_rate) = match build_default_stream(Arc::clone(&mixer), Arc::clone(&closed)) {
        Ok(built) => built,
        Err(e) => {
            closed.store(true, Ordering::SeqCst);
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Some hosts start streams immediately
    let _ = stream.pause();
    let _ = ready.send(Ok(sample_rate));

    for command in commands {
        match command {
            ContextCommand::Resume => {
                if !suspended.load(Ordering::SeqCst) {
                    continue;
                }
                match stream.play() {
                    Ok(()) => {
                        suspended.store(false, Ordering::SeqCst);
                        tracing::debug!("Audio output resumed");
                    }
                    Err(e) => {
                        tracing::error!("Failed to resume audio output: {}", e);
                        closed.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            }
            ContextCommand::Close => break,
        }
    }

    closed.store(true, Ordering::SeqCst);
    drop(stream);
    if let Ok(mut mixer) = mixer.lock() {
        mixer.clear();
    }
    tracing::debug!("Audio output context closed");
}

fn build_default_stream(
    mixer: Arc<Mutex<Mixer>>,
    closed: Arc<AtomicBool>,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host.default_output_device()
        .context("No output device available")?;

    let config = device.default_output_config()
        .context("Failed to get default output config")?;
    let sample_rate = config.sample_rate().0;

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), mixer, closed)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), mixer, closed)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), mixer, closed)?,
        format => anyhow::bail!("Unsupported sample format: {:?}", format),
    };

    Ok((stream, sample_rate))
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
    closed: Arc<AtomicBool>,
) -> Result<cpal::Stream> {
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();
    let error_mixer = Arc::clone(&mixer);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.clear();
            scratch.resize(data.len(), 0.0);
            if let Ok(mut mixer) = mixer.lock() {
                mixer.render(&mut scratch, channels);
            }
            for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                *out = T::from_sample(*sample);
            }
        },
        move |err| {
            tracing::error!("Audio output error: {}", err);
            closed.store(true, Ordering::SeqCst);
            // Nothing will be rendered any more; release the waiters
            if let Ok(mut mixer) = error_mixer.lock() {
                mixer.clear();
            }
        },
        None,
    ).context("Failed to build output stream")?;

    Ok(stream)
}
