pub mod controller;
pub mod interaction;
pub mod session;

use std::collections::HashSet;
use serde::{Serialize, Deserialize};
use thiserror::Error;

pub const OPTION_COUNT: usize = 4;

/// Display and narration strings. The quiz ships a single locale.
pub mod strings {
    pub const CORRECT_FEEDBACK: &str = "Correto! Muito bem!";
    pub const INCORRECT_FEEDBACK_PREFIX: &str = "Incorreto. A resposta certa é: ";
    pub const QUESTIONS_UNAVAILABLE: &str =
        "Não foi possível carregar as perguntas. Tente novamente mais tarde.";
    pub const RESULT_TITLE: &str = "Quiz Concluído!";
    pub const RESULT_PERFECT: &str = "Perfeito! Você é um verdadeiro erudito bíblico!";
    pub const RESULT_EXCELLENT: &str = "Excelente! Seu conhecimento é impressionante!";
    pub const RESULT_GOOD: &str = "Bom trabalho! Continue estudando as escrituras.";
    pub const RESULT_ENCOURAGE: &str =
        "Não desanime! Toda jornada de conhecimento começa com um passo.";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionError {
    #[error("question text is blank")]
    BlankQuestion,
    #[error("expected 4 options, got {0}")]
    OptionCount(usize),
    #[error("option {0:?} appears more than once")]
    DuplicateOption(String),
    #[error("correct answer {0:?} is not one of the options")]
    AnswerNotAnOption(String),
}

impl QuizQuestion {
    /// Checks the fetch-time invariants: four distinct options, exactly one of
    /// which is the correct answer.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.question.trim().is_empty() {
            return Err(QuestionError::BlankQuestion);
        }
        if self.options.len() != OPTION_COUNT {
            return Err(QuestionError::OptionCount(self.options.len()));
        }
        let mut seen = HashSet::new();
        for option in &self.options {
            if !seen.insert(option.as_str()) {
                return Err(QuestionError::DuplicateOption(option.clone()));
            }
        }
        if !self.options.contains(&self.correct_answer) {
            return Err(QuestionError::AnswerNotAnOption(self.correct_answer.clone()));
        }
        Ok(())
    }

    /// Exact match against the correct answer. No selection is never correct.
    pub fn is_correct(&self, selected: Option<&str>) -> bool {
        selected == Some(self.correct_answer.as_str())
    }

    /// Phrase narrated after the reveal.
    pub fn feedback_text(&self, is_correct: bool) -> String {
        if is_correct {
            strings::CORRECT_FEEDBACK.to_string()
        } else {
            format!("{}{}", strings::INCORRECT_FEEDBACK_PREFIX, self.correct_answer)
        }
    }
}

/// Final score summary shown (and narrated) once the quiz is completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub score: usize,
    pub total: usize,
}

impl QuizResult {
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.score as f64 / self.total as f64) * 100.0).round() as u32
    }

    pub fn feedback(&self) -> &'static str {
        let percentage = self.percentage();
        if percentage >= 100 {
            strings::RESULT_PERFECT
        } else if percentage >= 70 {
            strings::RESULT_EXCELLENT
        } else if percentage >= 40 {
            strings::RESULT_GOOD
        } else {
            strings::RESULT_ENCOURAGE
        }
    }

    pub fn narration_text(&self) -> String {
        format!(
            "{} {} Você acertou {} de {} perguntas.",
            strings::RESULT_TITLE,
            self.feedback(),
            self.score,
            self.total
        )
    }
}
