use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::audio::AudioPlayer;
use crate::commands::{self, Flow};
use crate::commands::quiz::UserAction;
use crate::hub::ContentGateway;
use crate::quiz::controller::{InteractionController, Signal, Update};
use crate::quiz::interaction::ImageView;
use crate::quiz::session::{QuizPhase, QuizSession};
use crate::state::Settings;
use crate::ui::{TerminalUi, View};

enum Event {
    Input(Option<String>),
    Signal(Option<Signal>),
}

/// Everything the running quiz owns. Lives on the single application thread.
pub struct App {
    pub(crate) session: QuizSession,
    pub(crate) interaction: InteractionController,
    pub(crate) ui: TerminalUi,
}

impl App {
    pub fn new(
        settings: &Settings,
        gateway: Arc<dyn ContentGateway>,
        audio: Arc<dyn AudioPlayer>,
        ui: TerminalUi,
    ) -> Self {
        let interaction = InteractionController::new(
            Arc::clone(&gateway),
            audio,
            settings.quiz.timer_seconds,
            settings.general.sound_feedback,
        );
        Self {
            session: QuizSession::new(gateway),
            interaction,
            ui,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        spawn_input_reader(input_tx);
        self.redraw();

        loop {
            let event = tokio::select! {
                line = input_rx.recv() => Event::Input(line),
                signal = self.interaction.next_signal() => Event::Signal(signal),
            };

            match event {
                Event::Input(None) => {
                    tracing::info!("Input closed");
                    break;
                }
                Event::Input(Some(line)) => {
                    let Some(action) = commands::parse_action(&line, self.session.phase()) else {
                        self.redraw();
                        continue;
                    };
                    if self.perform(action, &mut input_rx).await? == Flow::Quit {
                        break;
                    }
                    self.redraw();
                }
                Event::Signal(Some(signal)) => {
                    let update = self.interaction.handle(signal);
                    if update != Update::Unchanged {
                        self.apply(update);
                        self.redraw();
                    }
                }
                Event::Signal(None) => break,
            }
        }

        self.interaction.teardown();
        Ok(())
    }

    /// Runs one action. While it is in flight (fetching a question set),
    /// input is still read so that quitting takes effect immediately.
    pub(crate) async fn perform(
        &mut self,
        action: UserAction,
        input_rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> Result<Flow> {
        tokio::select! {
            biased;
            flow = commands::dispatch(self, action) => flow,
            () = wait_for_quit(input_rx) => {
                tracing::info!("Quitting while {:?}", self.session.phase());
                Ok(Flow::Quit)
            }
        }
    }

    /// Applies an interaction update to the session and the screen state.
    pub(crate) fn apply(&mut self, update: Update) {
        if let Update::Answered { is_correct } = update {
            self.session.record_answer(is_correct);
        }
        if let Some(ImageView::Ready(image)) = self.interaction.current().map(|i| i.image_view()) {
            self.ui.keep_image(self.session.current_index() + 1, image);
        }
    }

    /// Reads the final score aloud. Started once, when the quiz completes,
    /// and dropped if the player restarts before it plays.
    pub(crate) fn narrate_result(&self) {
        self.interaction.narrate(self.session.result().narration_text());
    }

    fn redraw(&mut self) {
        let view = View::build(&self.session, self.interaction.current());
        if let Err(e) = self.ui.draw(&view) {
            tracing::warn!("Failed to draw: {:#}", e);
        }
    }
}

/// Resolves on a quit line or when input closes. Other lines are dropped:
/// nothing else is actionable while an action is in flight.
async fn wait_for_quit(input_rx: &mut mpsc::UnboundedReceiver<String>) {
    while let Some(line) = input_rx.recv().await {
        if commands::parse_action(&line, QuizPhase::Loading) == Some(UserAction::Quit) {
            return;
        }
    }
}

fn spawn_input_reader(tx: mpsc::UnboundedSender<String>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to read input: {}", e);
                    break;
                }
            }
        }
    });
}
