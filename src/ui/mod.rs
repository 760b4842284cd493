pub mod terminal;

use crate::quiz::interaction::{ImageView, OptionStyle, QuestionInteraction, Stage};
use crate::quiz::session::{QuizPhase, QuizSession};
use crate::quiz::QuizResult;

pub use terminal::TerminalUi;

/// Screen to show, derived from the session phase and, while a question is
/// on screen, from the interaction state.
#[derive(Debug, PartialEq)]
pub enum View<'a> {
    Start,
    Loading,
    Error { message: &'a str },
    Question(QuestionView<'a>),
    Result(QuizResult),
}

#[derive(Debug, PartialEq)]
pub struct QuestionView<'a> {
    /// 1-based
    pub number: usize,
    pub total: usize,
    pub text: &'a str,
    pub options: Vec<(&'a str, OptionStyle)>,
    pub stage: Stage,
    pub time_remaining: u32,
    pub timer_progress: u32,
    pub image: ImageView<'a>,
    /// Revealed by the timer with nothing selected
    pub timed_out: bool,
    pub is_last: bool,
}

impl<'a> View<'a> {
    pub fn build(session: &'a QuizSession, interaction: Option<&'a QuestionInteraction>) -> Self {
        match session.phase() {
            QuizPhase::NotStarted => View::Start,
            QuizPhase::Loading => View::Loading,
            QuizPhase::Error => View::Error {
                message: session.error_message().unwrap_or_default(),
            },
            QuizPhase::Completed => View::Result(session.result()),
            QuizPhase::InProgress => match interaction {
                Some(interaction) => View::Question(QuestionView::build(session, interaction)),
                None => View::Loading,
            },
        }
    }
}

impl<'a> QuestionView<'a> {
    fn build(session: &QuizSession, interaction: &'a QuestionInteraction) -> Self {
        let question = interaction.question();
        Self {
            number: session.current_index() + 1,
            total: session.question_count(),
            text: &question.question,
            options: question
                .options
                .iter()
                .map(|o| (o.as_str(), interaction.option_style(o)))
                .collect(),
            stage: interaction.stage(),
            time_remaining: interaction.time_remaining(),
            timer_progress: interaction.timer_progress(),
            image: interaction.image_view(),
            timed_out: interaction.is_revealed() && interaction.selected_option().is_none(),
            is_last: session.is_last_question(),
        }
    }
}
