use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::quiz::interaction::{CharacterImage, ImageView, OptionStyle, Stage};
use crate::quiz::strings;
use super::{QuestionView, View};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const TIMER_BAR_WIDTH: u32 = 20;

/// Renders views as plain text and keeps revealed images on disk.
pub struct TerminalUi {
    out: Box<dyn Write + Send>,
    images_dir: Option<PathBuf>,
    image_path: Option<PathBuf>,
}

impl TerminalUi {
    pub fn new(out: Box<dyn Write + Send>, images_dir: Option<PathBuf>) -> Self {
        Self {
            out,
            images_dir,
            image_path: None,
        }
    }

    pub fn stdout(images_dir: Option<PathBuf>) -> Self {
        Self::new(Box::new(std::io::stdout()), images_dir)
    }

    pub fn draw(&mut self, view: &View<'_>) -> Result<()> {
        let text = render(view, self.image_path.as_deref());
        write!(self.out, "{}{}", CLEAR_SCREEN, text)?;
        self.out.flush()?;
        Ok(())
    }

    /// Forgets the image of the previous question.
    pub fn clear_image(&mut self) {
        self.image_path = None;
    }

    /// Writes the revealed image once per question. Without an images
    /// directory the image is only reported as ready.
    pub fn keep_image(&mut self, question_number: usize, image: &CharacterImage) {
        if self.image_path.is_some() {
            return;
        }
        let Some(dir) = self.images_dir.as_deref() else {
            return;
        };
        match save_image(dir, question_number, image) {
            Ok(path) => {
                tracing::info!("Saved character image to {}", path.display());
                self.image_path = Some(path);
            }
            Err(e) => tracing::warn!("Failed to save character image: {:#}", e),
        }
    }
}

pub fn save_image(dir: &Path, question_number: usize, image: &CharacterImage) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!(
        "pergunta-{:02}.{}",
        question_number,
        image_extension(&image.mime_type)
    ));
    std::fs::write(&path, &image.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// File extension for an image mime type. Unknown types are saved as PNG.
fn image_extension(mime_type: &str) -> &'static str {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

pub fn render(view: &View<'_>, image_path: Option<&Path>) -> String {
    match view {
        View::Start => [
            "Quiz Bíblico",
            "",
            "Teste seus conhecimentos sobre a Bíblia com perguntas narradas.",
            "",
            "[s] Começar o Quiz   [q] Sair",
        ]
        .join("\n") + "\n",
        View::Loading => "Gerando seu quiz... um momento.\n".to_string(),
        View::Error { message } => format!(
            "Ocorreu um Erro\n\n{}\n\n[r] Tentar Novamente   [q] Sair\n",
            message
        ),
        View::Question(q) => render_question(q, image_path),
        View::Result(result) => format!(
            "{}\n\nSua Pontuação Final\n{} / {} ({}%)\n\n{}\n\n[r] Jogar Novamente   [q] Sair\n",
            strings::RESULT_TITLE,
            result.score,
            result.total,
            result.percentage(),
            result.feedback()
        ),
    }
}

fn render_question(q: &QuestionView<'_>, image_path: Option<&Path>) -> String {
    let mut lines = vec![format!("Pergunta {} de {}", q.number, q.total), String::new()];
    lines.push(q.text.to_string());
    lines.push(String::new());

    for (i, (option, style)) in q.options.iter().enumerate() {
        lines.push(format!("{} {}. {}", marker(*style), i + 1, option));
    }
    lines.push(String::new());

    match q.stage {
        Stage::Narrating => lines.push("Ouça a pergunta...".to_string()),
        Stage::CountingDown => lines.push(format!(
            "[{}] {}s",
            timer_bar(q.timer_progress),
            q.time_remaining
        )),
        Stage::Revealed => {
            if q.timed_out {
                lines.push("Tempo esgotado!".to_string());
            }
            match &q.image {
                ImageView::Loading => lines.push("Gerando uma imagem celestial...".to_string()),
                ImageView::Ready(_) => match image_path {
                    Some(path) => lines.push(format!("Imagem: {}", path.display())),
                    None => lines.push("Imagem pronta.".to_string()),
                },
                ImageView::Unavailable => lines.push("Imagem não disponível".to_string()),
                ImageView::Hidden => {}
            }
            lines.push(String::new());
            let next = if q.is_last { "Ver Resultado" } else { "Próxima Pergunta" };
            lines.push(format!("[n] {}", next));
        }
    }

    lines.join("\n") + "\n"
}

fn marker(style: OptionStyle) -> &'static str {
    match style {
        OptionStyle::Disabled => " ·",
        OptionStyle::Neutral => "  ",
        OptionStyle::Selected => " >",
        OptionStyle::Correct => " ✔",
        OptionStyle::Wrong => " ✘",
        OptionStyle::Dimmed => "  ",
    }
}

fn timer_bar(progress: u32) -> String {
    let filled = (progress.min(100) * TIMER_BAR_WIDTH / 100) as usize;
    format!(
        "{}{}",
        "#".repeat(filled),
        "-".repeat(TIMER_BAR_WIDTH as usize - filled)
    )
}
