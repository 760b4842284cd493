use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::audio::{processing, AudioPlayer};
use crate::hub::{ContentGateway, EncodedImage};
use super::interaction::{CharacterImage, QuestionInteraction, Reveal, TickOutcome};
use super::QuizQuestion;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Identifies one entry into a question. Results tagged with an older
/// generation are stale and must be dropped.
pub type Generation = u64;

#[derive(Debug)]
pub enum Signal {
    NarrationSettled { generation: Generation },
    Tick { generation: Generation },
    ImageSettled { generation: Generation, image: Option<CharacterImage> },
    FeedbackSettled { generation: Generation },
}

impl Signal {
    fn generation(&self) -> Generation {
        match self {
            Signal::NarrationSettled { generation }
            | Signal::Tick { generation }
            | Signal::ImageSettled { generation, .. }
            | Signal::FeedbackSettled { generation } => *generation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Unchanged,
    Changed,
    /// The answer was locked in. Emitted exactly once per question; this is
    /// the only scoring signal.
    Answered { is_correct: bool },
}

/// Shared view of the current generation, readable from spawned tasks.
#[derive(Clone, Default)]
struct Liveness(Arc<AtomicU64>);

impl Liveness {
    fn is_current(&self, generation: Generation) -> bool {
        self.0.load(Ordering::SeqCst) == generation
    }

    fn set(&self, generation: Generation) {
        self.0.store(generation, Ordering::SeqCst);
    }

    /// Check handed to playback so audio for `generation` never starts
    /// once the controller has moved on.
    fn guard(&self, generation: Generation) -> impl Fn() -> bool + Send + Sync + 'static {
        let liveness = self.clone();
        move || liveness.is_current(generation)
    }
}

/// Async driver for [`QuestionInteraction`].
///
/// Background work (narration, countdown, reveal media) runs in spawned
/// tasks that report back through a channel. Every report carries the
/// generation it was started for and [`InteractionController::handle`]
/// drops reports from an earlier one, so a question change or teardown
/// cancels stale work without aborting it. Audio is guarded the same way
/// before it reaches the output.
pub struct InteractionController {
    gateway: Arc<dyn ContentGateway>,
    audio: Arc<dyn AudioPlayer>,
    budget: u32,
    ticks_enabled: bool,
    generation: Generation,
    liveness: Liveness,
    current: Option<QuestionInteraction>,
    countdown: Option<JoinHandle<()>>,
    signals_tx: mpsc::UnboundedSender<Signal>,
    signals_rx: mpsc::UnboundedReceiver<Signal>,
}

impl InteractionController {
    pub fn new(
        gateway: Arc<dyn ContentGateway>,
        audio: Arc<dyn AudioPlayer>,
        budget: u32,
        ticks_enabled: bool,
    ) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            audio,
            budget,
            ticks_enabled,
            generation: 0,
            liveness: Liveness::default(),
            current: None,
            countdown: None,
            signals_tx,
            signals_rx,
        }
    }

    pub fn current(&self) -> Option<&QuestionInteraction> {
        self.current.as_ref()
    }

    /// Shows a new question: resets all per-question state and starts the
    /// question narration. The countdown begins once it settles.
    pub fn enter(&mut self, question: Arc<QuizQuestion>) {
        self.teardown();
        let generation = self.generation;
        tracing::debug!("Entering question (generation {}): {}", generation, question.question);

        let text = question.question.clone();
        self.current = Some(QuestionInteraction::new(question, self.budget));

        let gateway = Arc::clone(&self.gateway);
        let audio = Arc::clone(&self.audio);
        let still_current = self.liveness.guard(generation);
        let tx = self.signals_tx.clone();
        tokio::spawn(async move {
            let encoded = gateway.fetch_narration(&text).await;
            match audio.play_narration(&encoded, &still_current).await {
                Ok(outcome) => tracing::debug!("Question narration ended: {:?}", outcome),
                Err(e) => tracing::warn!("Narration failed, starting timer immediately: {:#}", e),
            }
            let _ = tx.send(Signal::NarrationSettled { generation });
        });
    }

    /// Reads `text` aloud outside any question, e.g. the final score.
    /// Nothing is reported back. Dropped if the controller moves on before
    /// the audio reaches the output.
    pub fn narrate(&self, text: String) {
        let gateway = Arc::clone(&self.gateway);
        let audio = Arc::clone(&self.audio);
        let still_current = self.liveness.guard(self.generation);
        tokio::spawn(async move {
            let encoded = gateway.fetch_narration(&text).await;
            match audio.play_narration(&encoded, &still_current).await {
                Ok(outcome) => tracing::debug!("Narration ended: {:?}", outcome),
                Err(e) => tracing::warn!("Narration failed: {:#}", e),
            }
        });
    }

    /// Drops the current question. Anything still in flight for it becomes
    /// stale.
    pub fn teardown(&mut self) {
        self.stop_countdown();
        self.generation += 1;
        self.liveness.set(self.generation);
        self.current = None;
    }

    /// Option picked by the user.
    pub fn select(&mut self, option: &str) -> Update {
        let Some(current) = self.current.as_mut() else {
            return Update::Unchanged;
        };
        if current.has_answered() {
            tracing::debug!("Ignoring {:?}: already answered", option);
            return Update::Unchanged;
        }
        match current.select(option) {
            Some(reveal) => self.on_reveal(reveal),
            None => Update::Unchanged,
        }
    }

    pub fn can_advance(&self) -> bool {
        self.current.as_ref().is_some_and(QuestionInteraction::can_advance)
    }

    pub async fn next_signal(&mut self) -> Option<Signal> {
        self.signals_rx.recv().await
    }

    pub fn handle(&mut self, signal: Signal) -> Update {
        if signal.generation() != self.generation {
            tracing::debug!(
                "Discarding stale signal from generation {} (current {})",
                signal.generation(),
                self.generation
            );
            return Update::Unchanged;
        }
        let Some(current) = self.current.as_mut() else {
            return Update::Unchanged;
        };

        match signal {
            Signal::NarrationSettled { .. } => {
                if current.narration_settled() {
                    self.start_countdown();
                    Update::Changed
                } else {
                    Update::Unchanged
                }
            }
            Signal::Tick { .. } => match current.tick() {
                (TickOutcome::Ticked, _) => {
                    if self.ticks_enabled {
                        self.audio.play_tick();
                    }
                    Update::Changed
                }
                (TickOutcome::Expired, Some(reveal)) => {
                    tracing::debug!("Time is up, revealing");
                    self.on_reveal(reveal)
                }
                _ => {
                    self.stop_countdown();
                    Update::Unchanged
                }
            },
            Signal::ImageSettled { image, .. } => {
                current.image_settled(image);
                if current.is_reveal_settled() {
                    tracing::debug!("Reveal media settled (generation {})", self.generation);
                }
                Update::Changed
            }
            Signal::FeedbackSettled { .. } => {
                current.feedback_settled();
                if current.is_reveal_settled() {
                    tracing::debug!("Reveal media settled (generation {})", self.generation);
                }
                Update::Changed
            }
        }
    }

    fn start_countdown(&mut self) {
        self.stop_countdown();
        let generation = self.generation;
        let tx = self.signals_tx.clone();
        self.countdown = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            loop {
                ticker.tick().await;
                if tx.send(Signal::Tick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }

    /// Launches feedback narration and the character image concurrently. The
    /// visible reveal has already happened in the state machine.
    fn on_reveal(&mut self, reveal: Reveal) -> Update {
        self.stop_countdown();
        let generation = self.generation;
        tracing::info!(
            "Answer locked in: {:?} ({})",
            reveal.selected,
            if reveal.is_correct { "correct" } else { "incorrect" }
        );

        let gateway = Arc::clone(&self.gateway);
        let audio = Arc::clone(&self.audio);
        let still_current = self.liveness.guard(generation);
        let tx = self.signals_tx.clone();
        let Reveal { is_correct, feedback_text, image_label, .. } = reveal;

        tokio::spawn(async move {
            let feedback = {
                let gateway = Arc::clone(&gateway);
                let tx = tx.clone();
                async move {
                    let encoded = gateway.fetch_narration(&feedback_text).await;
                    if let Err(e) = audio.play_narration(&encoded, &still_current).await {
                        tracing::warn!("Feedback narration failed: {:#}", e);
                    }
                    let _ = tx.send(Signal::FeedbackSettled { generation });
                }
            };
            let image = async move {
                let encoded = gateway.fetch_character_image(&image_label).await;
                let image = decode_image(&encoded);
                let _ = tx.send(Signal::ImageSettled { generation, image });
            };

            futures_util::future::join(feedback, image).await;
        });

        Update::Answered { is_correct }
    }
}

impl Drop for InteractionController {
    fn drop(&mut self) {
        self.stop_countdown();
    }
}

fn decode_image(encoded: &EncodedImage) -> Option<CharacterImage> {
    if encoded.is_empty() {
        return None;
    }
    match processing::decode_base64(&encoded.data) {
        Ok(bytes) => Some(CharacterImage {
            mime_type: encoded.mime_type.clone(),
            bytes,
        }),
        Err(e) => {
            tracing::warn!("Discarding undecodable image: {:#}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::interaction::{ImageView, Stage};
    use crate::testing::{question, AudioCall, RecordingAudio, ScriptedGateway};

    fn golias() -> Arc<QuizQuestion> {
        Arc::new(question("Quem matou Golias?", ["Saul", "Davi", "Jônatas", "Samuel"], "Davi"))
    }

    fn controller(gateway: ScriptedGateway, audio: RecordingAudio) -> (InteractionController, Arc<ScriptedGateway>, Arc<RecordingAudio>) {
        let gateway = Arc::new(gateway);
        let audio = Arc::new(audio);
        let ctrl = InteractionController::new(gateway.clone(), audio.clone(), 5, true);
        (ctrl, gateway, audio)
    }

    /// Handles signals until `done` holds, collecting every update.
    async fn pump_until(
        ctrl: &mut InteractionController,
        done: impl Fn(&InteractionController) -> bool,
    ) -> Vec<Update> {
        let mut updates = Vec::new();
        while !done(ctrl) {
            let signal = ctrl.next_signal().await.expect("channel open");
            updates.push(ctrl.handle(signal));
        }
        updates
    }

    fn answers(updates: &[Update]) -> Vec<bool> {
        updates
            .iter()
            .filter_map(|u| match u {
                Update::Answered { is_correct } => Some(*is_correct),
                _ => None,
            })
            .collect()
    }

    fn stage(ctrl: &InteractionController) -> Option<Stage> {
        ctrl.current().map(QuestionInteraction::stage)
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_waits_for_narration() {
        let (mut ctrl, _, audio) = controller(
            ScriptedGateway::new(),
            RecordingAudio::with_playback(Duration::from_secs(3)),
        );
        let started = Instant::now();

        ctrl.enter(golias());
        assert_eq!(stage(&ctrl), Some(Stage::Narrating));
        pump_until(&mut ctrl, |c| stage(c) == Some(Stage::CountingDown)).await;

        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(audio.calls(), vec![AudioCall::Narration("audio:Quem matou Golias?".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reveals_once_with_no_selection() {
        let (mut ctrl, _, audio) = controller(ScriptedGateway::new(), RecordingAudio::new());

        ctrl.enter(golias());
        let updates = pump_until(&mut ctrl, |c| {
            c.current().is_some_and(QuestionInteraction::is_reveal_settled)
        })
        .await;

        assert_eq!(answers(&updates), vec![false]);
        let current = ctrl.current().unwrap();
        assert_eq!(current.time_remaining(), 0);
        assert_eq!(current.selected_option(), None);
        // 5 -> 4 -> 3 -> 2 -> 1 tick audibly, 1 -> 0 is silent
        assert_eq!(audio.tick_count(), 4);
        assert!(audio
            .calls()
            .contains(&AudioCall::Narration("audio:Incorreto. A resposta certa é: Davi".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn selection_reveals_before_time_runs_out() {
        let (mut ctrl, gateway, audio) = controller(ScriptedGateway::new(), RecordingAudio::new());

        ctrl.enter(golias());
        pump_until(&mut ctrl, |c| stage(c) == Some(Stage::CountingDown)).await;
        let mut updates = vec![ctrl.select("Davi")];
        updates.extend(
            pump_until(&mut ctrl, |c| c.current().is_some_and(QuestionInteraction::is_reveal_settled)).await,
        );

        assert_eq!(answers(&updates), vec![true]);
        assert_eq!(ctrl.current().unwrap().time_remaining(), 5);
        assert_eq!(audio.tick_count(), 0);
        assert_eq!(gateway.image_requests(), vec!["Davi".to_string()]);
        assert!(matches!(
            ctrl.current().unwrap().image_view(),
            ImageView::Ready(image) if image.mime_type == "image/png"
        ));
        assert!(ctrl.can_advance());

        // No countdown left running after the reveal
        tokio::time::sleep(Duration::from_secs(10)).await;
        while let Ok(signal) = ctrl.signals_rx.try_recv() {
            assert_eq!(ctrl.handle(signal), Update::Unchanged);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn click_racing_expiry_scores_once() {
        let (mut ctrl, _, _) = controller(ScriptedGateway::new(), RecordingAudio::new());

        ctrl.enter(golias());
        let mut updates = pump_until(&mut ctrl, |c| {
            c.current().is_some_and(|i| i.time_remaining() == 1)
        })
        .await;

        // The final tick is already due when the click lands
        tokio::time::sleep(Duration::from_secs(1)).await;
        updates.push(ctrl.select("Saul"));
        updates.extend(
            pump_until(&mut ctrl, |c| c.current().is_some_and(QuestionInteraction::is_reveal_settled)).await,
        );

        assert_eq!(answers(&updates), vec![false]);
        assert_eq!(ctrl.current().unwrap().selected_option(), Some("Saul"));
        assert_eq!(ctrl.select("Davi"), Update::Unchanged);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_image_ends_in_unavailable() {
        let (mut ctrl, _, audio) = controller(ScriptedGateway::new().without_images(), RecordingAudio::new());

        ctrl.enter(golias());
        pump_until(&mut ctrl, |c| stage(c) == Some(Stage::CountingDown)).await;
        assert_eq!(ctrl.select("Davi"), Update::Answered { is_correct: true });
        assert_eq!(ctrl.current().unwrap().image_view(), ImageView::Loading);

        pump_until(&mut ctrl, |c| c.current().is_some_and(QuestionInteraction::is_reveal_settled)).await;

        assert_eq!(ctrl.current().unwrap().image_view(), ImageView::Unavailable);
        assert!(audio.calls().contains(&AudioCall::Narration("audio:Correto! Muito bem!".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn narration_failure_still_starts_countdown() {
        let (mut ctrl, _, _) = controller(ScriptedGateway::new(), RecordingAudio::failing());

        ctrl.enter(golias());
        pump_until(&mut ctrl, |c| stage(c) == Some(Stage::CountingDown)).await;

        assert_eq!(ctrl.current().unwrap().time_remaining(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn question_change_mid_narration_discards_stale_work() {
        let (mut ctrl, gateway, audio) = controller(
            ScriptedGateway::new().with_narration_delay(Duration::from_secs(2)),
            RecordingAudio::new(),
        );
        let moses = Arc::new(question(
            "Quem abriu o Mar Vermelho?",
            ["Moisés", "Arão", "Josué", "Calebe"],
            "Moisés",
        ));

        ctrl.enter(golias());
        let first_generation = ctrl.generation;
        tokio::time::sleep(Duration::from_secs(1)).await;
        ctrl.enter(Arc::clone(&moses));

        let updates = pump_until(&mut ctrl, |c| stage(c) == Some(Stage::CountingDown)).await;

        assert_ne!(ctrl.generation, first_generation);
        assert_eq!(ctrl.current().unwrap().question().question, moses.question);
        assert!(updates.contains(&Update::Unchanged));
        // The first question's narration was fetched but never played
        assert_eq!(
            gateway.narration_requests(),
            vec!["Quem matou Golias?".to_string(), "Quem abriu o Mar Vermelho?".to_string()]
        );
        assert_eq!(
            audio.calls(),
            vec![AudioCall::Narration("audio:Quem abriu o Mar Vermelho?".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_leaves_nothing_to_apply() {
        let (mut ctrl, _, _) = controller(ScriptedGateway::new(), RecordingAudio::new());

        ctrl.enter(golias());
        pump_until(&mut ctrl, |c| stage(c) == Some(Stage::CountingDown)).await;
        ctrl.teardown();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(ctrl.current().is_none());
        assert_eq!(ctrl.select("Davi"), Update::Unchanged);
        while let Ok(signal) = ctrl.signals_rx.try_recv() {
            assert_eq!(ctrl.handle(signal), Update::Unchanged);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_can_be_muted() {
        let gateway = Arc::new(ScriptedGateway::new());
        let audio = Arc::new(RecordingAudio::new());
        let mut ctrl = InteractionController::new(gateway, audio.clone(), 3, false);

        ctrl.enter(golias());
        let updates = pump_until(&mut ctrl, |c| c.current().is_some_and(QuestionInteraction::is_revealed)).await;

        assert_eq!(answers(&updates), vec![false]);
        assert_eq!(audio.tick_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn question_change_while_audio_is_preparing_keeps_it_silent() {
        let (mut ctrl, _, audio) = controller(
            ScriptedGateway::new(),
            RecordingAudio::new().with_prepare_delay(Duration::from_secs(2)),
        );

        ctrl.enter(golias());
        // Narration fetched, playback still decoding when the question changes
        tokio::time::sleep(Duration::from_secs(1)).await;
        ctrl.enter(Arc::new(question(
            "Quem abriu o Mar Vermelho?",
            ["Moisés", "Arão", "Josué", "Calebe"],
            "Moisés",
        )));
        pump_until(&mut ctrl, |c| stage(c) == Some(Stage::CountingDown)).await;

        assert_eq!(
            audio.calls(),
            vec![AudioCall::Narration("audio:Quem abriu o Mar Vermelho?".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn free_narration_is_dropped_after_teardown() {
        let (mut ctrl, _, audio) = controller(
            ScriptedGateway::new().with_narration_delay(Duration::from_secs(2)),
            RecordingAudio::new(),
        );

        ctrl.narrate("Fim".to_string());
        ctrl.teardown();
        ctrl.narrate("Placar".to_string());
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(audio.calls(), vec![AudioCall::Narration("audio:Placar".into())]);
    }

    #[test]
    fn decoded_image_keeps_its_mime_type() {
        let image = decode_image(&EncodedImage {
            mime_type: "image/jpeg".into(),
            data: "/9j/".into(),
        })
        .unwrap();

        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.bytes, vec![0xff, 0xd8, 0xff]);
        assert_eq!(decode_image(&EncodedImage::default()), None);
    }
}
