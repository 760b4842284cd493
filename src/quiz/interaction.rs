use std::sync::Arc;

use super::QuizQuestion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Narrating,
    CountingDown,
    Revealed,
}

/// What the driver has to do after a reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reveal {
    pub is_correct: bool,
    pub selected: Option<String>,
    pub feedback_text: String,
    pub image_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Time decreased; play the tick sound
    Ticked,
    /// Time reached zero; reveal was triggered
    Expired,
    /// Not counting down (already revealed or not yet started)
    Ignored,
}

/// Styling of one answer button, derived from the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionStyle {
    /// Before the countdown starts
    Disabled,
    Neutral,
    Selected,
    Correct,
    Wrong,
    Dimmed,
}

/// Decoded character image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageView<'a> {
    Hidden,
    Loading,
    Ready(&'a CharacterImage),
    Unavailable,
}

/// Per-question state machine: `Narrating -> CountingDown -> Revealed`,
/// created fresh for every question.
///
/// Pure: it never spawns or awaits anything. [`super::controller`] feeds it
/// events and performs the side effects it asks for. `Revealed` is only
/// reachable from `CountingDown`, so the reveal and its scoring signal
/// happen at most once per question.
#[derive(Debug, Clone)]
pub struct QuestionInteraction {
    question: Arc<QuizQuestion>,
    stage: Stage,
    budget: u32,
    time_remaining: u32,
    selected_option: Option<String>,
    character_image: Option<CharacterImage>,
    is_image_loading: bool,
    feedback_settled: bool,
    image_settled: bool,
}

impl QuestionInteraction {
    pub fn new(question: Arc<QuizQuestion>, budget: u32) -> Self {
        Self {
            question,
            stage: Stage::Narrating,
            budget,
            time_remaining: budget,
            selected_option: None,
            character_image: None,
            is_image_loading: false,
            feedback_settled: false,
            image_settled: false,
        }
    }

    pub fn question(&self) -> &QuizQuestion {
        &self.question
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn selected_option(&self) -> Option<&str> {
        self.selected_option.as_deref()
    }

    pub fn is_revealed(&self) -> bool {
        self.stage == Stage::Revealed
    }

    /// The answered latch.
    pub fn has_answered(&self) -> bool {
        self.is_revealed()
    }

    /// True once both post-reveal fetches have settled.
    pub fn is_reveal_settled(&self) -> bool {
        self.is_revealed() && self.feedback_settled && self.image_settled
    }

    pub fn can_advance(&self) -> bool {
        self.is_revealed()
    }

    pub fn timer_progress(&self) -> u32 {
        if self.budget == 0 {
            return 0;
        }
        self.time_remaining * 100 / self.budget
    }

    /// Narration for the question ended (successfully or not). Starts the
    /// countdown; returns false if the countdown was already past this point.
    pub fn narration_settled(&mut self) -> bool {
        if self.stage != Stage::Narrating {
            return false;
        }
        self.stage = Stage::CountingDown;
        true
    }

    /// One countdown second elapsed.
    pub fn tick(&mut self) -> (TickOutcome, Option<Reveal>) {
        if self.stage != Stage::CountingDown {
            return (TickOutcome::Ignored, None);
        }
        if self.time_remaining <= 1 {
            self.time_remaining = 0;
            return (TickOutcome::Expired, self.reveal());
        }
        self.time_remaining -= 1;
        (TickOutcome::Ticked, None)
    }

    /// User picked an option. Ignored unless the countdown is running;
    /// otherwise records it and reveals immediately.
    pub fn select(&mut self, option: &str) -> Option<Reveal> {
        if self.stage != Stage::CountingDown {
            return None;
        }
        self.selected_option = Some(option.to_string());
        self.reveal()
    }

    /// `CountingDown -> Revealed`, using whatever selection is recorded now.
    pub fn reveal(&mut self) -> Option<Reveal> {
        if self.stage != Stage::CountingDown {
            return None;
        }
        self.stage = Stage::Revealed;
        self.is_image_loading = true;

        let is_correct = self.question.is_correct(self.selected_option.as_deref());
        Some(Reveal {
            is_correct,
            selected: self.selected_option.clone(),
            feedback_text: self.question.feedback_text(is_correct),
            image_label: self.question.correct_answer.clone(),
        })
    }

    /// Image fetch settled. `None` (failure or empty) clears the image.
    pub fn image_settled(&mut self, image: Option<CharacterImage>) {
        if !self.is_revealed() {
            return;
        }
        self.character_image = image.filter(|image| !image.bytes.is_empty());
        self.is_image_loading = false;
        self.image_settled = true;
    }

    pub fn feedback_settled(&mut self) {
        if self.is_revealed() {
            self.feedback_settled = true;
        }
    }

    pub fn option_style(&self, option: &str) -> OptionStyle {
        let is_selected = self.selected_option.as_deref() == Some(option);
        match self.stage {
            Stage::Narrating => OptionStyle::Disabled,
            Stage::CountingDown if is_selected => OptionStyle::Selected,
            Stage::CountingDown => OptionStyle::Neutral,
            Stage::Revealed if option == self.question.correct_answer => OptionStyle::Correct,
            Stage::Revealed if is_selected => OptionStyle::Wrong,
            Stage::Revealed => OptionStyle::Dimmed,
        }
    }

    pub fn image_view(&self) -> ImageView<'_> {
        if !self.is_revealed() {
            return ImageView::Hidden;
        }
        if self.is_image_loading {
            return ImageView::Loading;
        }
        match self.character_image.as_ref() {
            Some(image) => ImageView::Ready(image),
            None => ImageView::Unavailable,
        }
    }
}
