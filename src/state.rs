use serde::{Serialize, Deserialize};

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const API_KEY_ENV_FALLBACK: &str = "API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub gemini: GeminiSettings,
    #[serde(default)]
    pub quiz: QuizSettings,
    #[serde(default)]
    pub general: GeneralSettings,
}

impl Settings {
    /// API key from the environment, falling back to the stored one.
    pub fn resolved_api_key(&self) -> Option<String> {
        [API_KEY_ENV, API_KEY_ENV_FALLBACK]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .chain(self.gemini.api_key.clone())
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub quiz_model: String,
    pub tts_model: String,
    pub image_model: String,
    pub voice_name: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            quiz_model: "gemini-2.5-flash".to_string(),
            tts_model: "gemini-2.5-flash-preview-tts".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            voice_name: "Puck".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
    pub question_count: usize,
    /// Answer window per question, in seconds
    pub timer_seconds: u32,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            question_count: 10,
            timer_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Plays the countdown tick
    pub sound_feedback: bool,
    pub save_images: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            sound_feedback: true,
            save_images: true,
        }
    }
}
