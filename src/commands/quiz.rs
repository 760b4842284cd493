use std::sync::Arc;

use anyhow::Result;

use crate::app::App;
use crate::quiz::session::QuizPhase;

/// Something the user asked for from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Start,
    Retry,
    /// 0-based option index
    Select(usize),
    Next,
    Restart,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Maps a line of input to the action it means on the current screen.
pub fn parse_action(input: &str, phase: QuizPhase) -> Option<UserAction> {
    let input = input.trim().to_lowercase();
    if input == "q" {
        return Some(UserAction::Quit);
    }
    match (phase, input.as_str()) {
        (QuizPhase::NotStarted, "s" | "") => Some(UserAction::Start),
        (QuizPhase::Error, "r" | "") => Some(UserAction::Retry),
        (QuizPhase::InProgress, "n") => Some(UserAction::Next),
        (QuizPhase::InProgress, digit) => match digit.parse::<usize>() {
            Ok(n) if (1..=crate::quiz::OPTION_COUNT).contains(&n) => Some(UserAction::Select(n - 1)),
            _ => None,
        },
        (QuizPhase::Completed, "r" | "") => Some(UserAction::Restart),
        _ => None,
    }
}

pub async fn dispatch(app: &mut App, action: UserAction) -> Result<Flow> {
    match action {
        UserAction::Start | UserAction::Retry => do_start(app).await?,
        UserAction::Select(index) => do_select(app, index),
        UserAction::Next => do_next(app),
        UserAction::Restart => do_restart(app),
        UserAction::Quit => {
            tracing::info!("Quitting");
            app.interaction.teardown();
            return Ok(Flow::Quit);
        }
    }
    Ok(Flow::Continue)
}

/// Internal: fetch a question set and show the first question
async fn do_start(app: &mut App) -> Result<()> {
    app.interaction.teardown();
    app.ui.clear_image();
    app.ui.draw(&crate::ui::View::Loading)?;

    app.session.start().await;
    if app.session.phase() == QuizPhase::InProgress {
        enter_current_question(app);
    }
    Ok(())
}

fn do_select(app: &mut App, index: usize) {
    let Some(option) = app
        .session
        .current_question()
        .and_then(|q| q.options.get(index).cloned())
    else {
        return;
    };
    let update = app.interaction.select(&option);
    app.apply(update);
}

/// Internal: move on once the current question is revealed
fn do_next(app: &mut App) {
    if !app.interaction.can_advance() {
        tracing::debug!("Ignoring next: question not revealed yet");
        return;
    }
    app.interaction.teardown();
    app.ui.clear_image();

    if app.session.advance() {
        app.narrate_result();
    } else {
        enter_current_question(app);
    }
}

fn do_restart(app: &mut App) {
    app.interaction.teardown();
    app.ui.clear_image();
    app.session.restart();
}

fn enter_current_question(app: &mut App) {
    if let Some(question) = app.session.current_question() {
        let question = Arc::clone(question);
        app.interaction.enter(question);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_depend_on_screen() {
        assert_eq!(parse_action("s", QuizPhase::NotStarted), Some(UserAction::Start));
        assert_eq!(parse_action("", QuizPhase::NotStarted), Some(UserAction::Start));
        assert_eq!(parse_action("s", QuizPhase::InProgress), None);
        assert_eq!(parse_action("R", QuizPhase::Error), Some(UserAction::Retry));
        assert_eq!(parse_action("r", QuizPhase::Completed), Some(UserAction::Restart));
        assert_eq!(parse_action("n", QuizPhase::InProgress), Some(UserAction::Next));
        assert_eq!(parse_action(" q ", QuizPhase::Loading), Some(UserAction::Quit));
        assert_eq!(parse_action("1", QuizPhase::Loading), None);
    }

    #[test]
    fn options_are_one_based() {
        assert_eq!(parse_action("1", QuizPhase::InProgress), Some(UserAction::Select(0)));
        assert_eq!(parse_action("4", QuizPhase::InProgress), Some(UserAction::Select(3)));
        assert_eq!(parse_action("0", QuizPhase::InProgress), None);
        assert_eq!(parse_action("5", QuizPhase::InProgress), None);
        assert_eq!(parse_action("", QuizPhase::InProgress), None);
    }
}
