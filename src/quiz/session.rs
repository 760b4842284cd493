use std::sync::Arc;

use crate::hub::ContentGateway;
use super::{QuizQuestion, QuizResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    NotStarted,
    Loading,
    InProgress,
    Completed,
    Error,
}

/// Owns the question list, progress and score of one quiz run.
pub struct QuizSession {
    gateway: Arc<dyn ContentGateway>,
    phase: QuizPhase,
    questions: Vec<Arc<QuizQuestion>>,
    current_index: usize,
    score: usize,
    error_message: Option<String>,
}

impl QuizSession {
    pub fn new(gateway: Arc<dyn ContentGateway>) -> Self {
        Self {
            gateway,
            phase: QuizPhase::NotStarted,
            questions: Vec::new(),
            current_index: 0,
            score: 0,
            error_message: None,
        }
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn current_question(&self) -> Option<&Arc<QuizQuestion>> {
        if self.phase != QuizPhase::InProgress {
            return None;
        }
        self.questions.get(self.current_index)
    }

    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 >= self.questions.len()
    }

    pub fn result(&self) -> QuizResult {
        QuizResult {
            score: self.score,
            total: self.questions.len(),
        }
    }

    /// Fetches a fresh question set. Also serves as the retry action from
    /// the error screen.
    pub async fn start(&mut self) {
        self.phase = QuizPhase::Loading;
        self.error_message = None;
        tracing::info!("Generating quiz questions");

        match self.gateway.fetch_questions().await {
            Ok(questions) if !questions.is_empty() => {
                self.questions = questions.into_iter().map(Arc::new).collect();
                self.current_index = 0;
                self.score = 0;
                self.phase = QuizPhase::InProgress;
            }
            Ok(_) => self.fail(crate::hub::GatewayError::Empty),
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: crate::hub::GatewayError) {
        tracing::error!("Failed to load quiz questions: {}", error);
        self.error_message = Some(error.user_message().to_string());
        self.phase = QuizPhase::Error;
    }

    pub fn record_answer(&mut self, is_correct: bool) {
        if is_correct {
            self.score += 1;
        }
    }

    /// Moves to the next question, or to `Completed` after the last one.
    /// Returns true when this call completed the quiz.
    pub fn advance(&mut self) -> bool {
        if self.phase != QuizPhase::InProgress {
            return false;
        }
        self.current_index += 1;
        if self.current_index >= self.questions.len() {
            self.current_index = self.questions.len();
            self.phase = QuizPhase::Completed;
            tracing::info!("Quiz completed: {}/{}", self.score, self.questions.len());
            return true;
        }
        false
    }

    pub fn restart(&mut self) {
        self.phase = QuizPhase::NotStarted;
        self.error_message = None;
    }
}
