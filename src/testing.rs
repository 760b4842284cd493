use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::audio::{AudioPlayer, NarrationOutcome};
use crate::hub::{ContentGateway, EncodedImage, GatewayError};
use crate::quiz::QuizQuestion;

/// 1x1 transparent PNG
pub const TINY_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

pub fn question(text: &str, options: [&str; 4], correct: &str) -> QuizQuestion {
    QuizQuestion {
        question: text.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: correct.to_string(),
    }
}

/// `count` valid questions whose correct answer is always the first option.
pub fn question_set(count: usize) -> Vec<QuizQuestion> {
    (1..=count)
        .map(|n| {
            let options = [
                format!("Certa {}", n),
                format!("Errada {}a", n),
                format!("Errada {}b", n),
                format!("Errada {}c", n),
            ];
            QuizQuestion {
                question: format!("Pergunta {}?", n),
                correct_answer: options[0].clone(),
                options: options.to_vec(),
            }
        })
        .collect()
}

/// Test double for the content gateway. Replays queued question-set results.
/// Narration comes back as `"audio:<text>"` and images as a tiny PNG unless
/// disabled.
pub struct ScriptedGateway {
    question_sets: Mutex<VecDeque<Result<Vec<QuizQuestion>, GatewayError>>>,
    question_delay: Duration,
    narration_delay: Duration,
    /// Overrides `narration_delay` for texts starting with the prefix
    slow_narrations: Vec<(String, Duration)>,
    images: bool,
    question_fetches: AtomicUsize,
    narration_requests: Mutex<Vec<String>>,
    image_requests: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            question_sets: Mutex::new(VecDeque::new()),
            question_delay: Duration::ZERO,
            narration_delay: Duration::ZERO,
            slow_narrations: Vec::new(),
            images: true,
            question_fetches: AtomicUsize::new(0),
            narration_requests: Mutex::new(Vec::new()),
            image_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_questions(self, result: Result<Vec<QuizQuestion>, GatewayError>) -> Self {
        self.question_sets.lock().unwrap().push_back(result);
        self
    }

    pub fn with_question_delay(mut self, delay: Duration) -> Self {
        self.question_delay = delay;
        self
    }

    pub fn with_narration_delay(mut self, delay: Duration) -> Self {
        self.narration_delay = delay;
        self
    }

    pub fn with_slow_narration(mut self, prefix: &str, delay: Duration) -> Self {
        self.slow_narrations.push((prefix.to_string(), delay));
        self
    }

    pub fn without_images(mut self) -> Self {
        self.images = false;
        self
    }

    pub fn question_fetches(&self) -> usize {
        self.question_fetches.load(Ordering::SeqCst)
    }

    pub fn narration_requests(&self) -> Vec<String> {
        self.narration_requests.lock().unwrap().clone()
    }

    pub fn image_requests(&self) -> Vec<String> {
        self.image_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentGateway for ScriptedGateway {
    async fn fetch_questions(&self) -> Result<Vec<QuizQuestion>, GatewayError> {
        self.question_fetches.fetch_add(1, Ordering::SeqCst);
        if !self.question_delay.is_zero() {
            tokio::time::sleep(self.question_delay).await;
        }
        let next = self.question_sets.lock().unwrap().pop_front();
        next.unwrap_or(Err(GatewayError::Empty))
    }

    async fn fetch_narration(&self, text: &str) -> String {
        self.narration_requests.lock().unwrap().push(text.to_string());
        let delay = self
            .slow_narrations
            .iter()
            .find(|(prefix, _)| text.starts_with(prefix.as_str()))
            .map_or(self.narration_delay, |(_, delay)| *delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        format!("audio:{}", text)
    }

    async fn fetch_character_image(&self, label: &str) -> EncodedImage {
        self.image_requests.lock().unwrap().push(label.to_string());
        if self.images {
            EncodedImage {
                mime_type: "image/png".to_string(),
                data: TINY_PNG.to_string(),
            }
        } else {
            EncodedImage::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCall {
    Narration(String),
    Tick,
}

/// Player that records what it was asked to play. Narration "plays" for a
/// fixed virtual duration, after an optional preparation delay standing in
/// for opening the device and decoding. Only narration that was still
/// wanted once prepared is recorded.
pub struct RecordingAudio {
    calls: Mutex<Vec<AudioCall>>,
    prepare: Duration,
    playback: Duration,
    fail: bool,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            prepare: Duration::ZERO,
            playback: Duration::ZERO,
            fail: false,
        }
    }

    pub fn with_playback(playback: Duration) -> Self {
        Self { playback, ..Self::new() }
    }

    pub fn with_prepare_delay(mut self, prepare: Duration) -> Self {
        self.prepare = prepare;
        self
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c != AudioCall::Tick)
            .cloned()
            .collect()
    }

    pub fn tick_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == AudioCall::Tick)
            .count()
    }
}

#[async_trait]
impl AudioPlayer for RecordingAudio {
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
        if !self.prepare.is_zero() {
            tokio::time::sleep(self.prepare).await;
            if !still_current() {
                return Ok(NarrationOutcome::Cancelled);
            }
        }
        self.calls
            .lock()
            .unwrap()
            .push(AudioCall::Narration(encoded_audio.to_string()));
        if self.fail {
            return Err(anyhow!("no output device"));
        }
        if !self.playback.is_zero() {
            tokio::time::sleep(self.playback).await;
        }
        Ok(NarrationOutcome::Completed)
    }

    fn play_tick(&self) {
        self.calls.lock().unwrap().push(AudioCall::Tick);
    }
}
