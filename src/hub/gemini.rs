use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::quiz::QuizQuestion;
use crate::state::{GeminiSettings, Settings};
use super::api::{GeminiClient, GenerateContentRequest, GenerationConfig, SpeechConfig};
use super::{ContentGateway, EncodedImage, GatewayError};

/// Remote content gateway backed by the Gemini REST API.
pub struct GeminiGateway {
    client: GeminiClient,
    settings: GeminiSettings,
    question_count: usize,
}

#[derive(Deserialize)]
struct QuestionSet {
    #[serde(default)]
    questions: Vec<QuizQuestion>,
}

impl GeminiGateway {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: GeminiClient::new(&settings.gemini.base_url, settings.resolved_api_key()),
            settings: settings.gemini.clone(),
            question_count: settings.quiz.question_count,
        }
    }

    fn questions_prompt(&self) -> String {
        format!(
            "Crie um quiz bíblico com {} perguntas de múltipla escolha. Cada pergunta deve ter 4 opções de resposta. \
             Forneça a resposta correta para cada pergunta. O quiz deve cobrir uma variedade de tópicos do Antigo e \
             Novo Testamento. O formato da saída deve ser JSON.",
            self.question_count
        )
    }

    fn questions_schema(&self) -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "questions": {
                    "type": "ARRAY",
                    "description": format!("Uma lista de {} perguntas do quiz bíblico.", self.question_count),
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "question": { "type": "STRING", "description": "O texto da pergunta." },
                            "options": {
                                "type": "ARRAY",
                                "description": "Uma lista de 4 possíveis respostas em texto.",
                                "items": { "type": "STRING" }
                            },
                            "correctAnswer": {
                                "type": "STRING",
                                "description": "A resposta correta, que deve corresponder exatamente a uma das opções."
                            }
                        },
                        "required": ["question", "options", "correctAnswer"]
                    }
                }
            },
            "required": ["questions"]
        })
    }

    async fn try_fetch_narration(&self, text: &str) -> Result<Option<String>, GatewayError> {
        let request = GenerateContentRequest::from_text(text).with_config(GenerationConfig {
            response_modalities: Some(vec!["AUDIO".to_string()]),
            speech_config: Some(SpeechConfig::prebuilt(&self.settings.voice_name)),
            ..Default::default()
        });
        let resp = self.client.generate_content(&self.settings.tts_model, &request).await?;
        Ok(resp.inline_data().map(|d| {
            tracing::debug!("Received narration ({}, {} bytes encoded)", d.mime_type, d.data.len());
            d.data.clone()
        }))
    }

    async fn try_fetch_image(&self, label: &str) -> Result<Option<EncodedImage>, GatewayError> {
        let prompt = format!(
            "Um desenho animado, estilo infantil e fofo, do personagem ou conceito bíblico: '{}'. \
             O fundo deve ser simples e de cor clara, sem texto na imagem.",
            label
        );
        let request = GenerateContentRequest::from_text(prompt).with_config(GenerationConfig {
            response_modalities: Some(vec!["IMAGE".to_string()]),
            ..Default::default()
        });
        let resp = self.client.generate_content(&self.settings.image_model, &request).await?;
        Ok(resp.inline_data().map(|d| {
            tracing::debug!("Received image for {:?} ({})", label, d.mime_type);
            EncodedImage {
                mime_type: d.mime_type.clone(),
                data: d.data.clone(),
            }
        }))
    }
}

/// Parses the JSON question set and keeps only well-formed questions.
pub fn parse_question_set(text: &str) -> Result<Vec<QuizQuestion>, GatewayError> {
    let set: QuestionSet = serde_json::from_str(text.trim())
        .map_err(|e| GatewayError::Malformed(e.to_string()))?;

    if set.questions.is_empty() {
        return Err(GatewayError::Empty);
    }

    let received = set.questions.len();
    let questions: Vec<QuizQuestion> = set
        .questions
        .into_iter()
        .filter(|q| match q.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Dropping invalid question {:?}: {}", q.question, e);
                false
            }
        })
        .collect();

    if questions.is_empty() {
        return Err(GatewayError::Malformed(format!(
            "none of the {} questions passed validation",
            received
        )));
    }

    Ok(questions)
}

#[async_trait]
impl ContentGateway for GeminiGateway {
    async fn fetch_questions(&self) -> Result<Vec<QuizQuestion>, GatewayError> {
        let request = GenerateContentRequest::from_text(self.questions_prompt()).with_config(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(self.questions_schema()),
            ..Default::default()
        });

        let resp = self.client.generate_content(&self.settings.quiz_model, &request).await?;
        let text = resp
            .text()
            .ok_or_else(|| GatewayError::Malformed("response has no text".to_string()))?;

        let questions = parse_question_set(&text)?;
        if questions.len() != self.question_count {
            tracing::warn!(
                "Asked for {} questions, received {} usable",
                self.question_count,
                questions.len()
            );
        }
        tracing::info!("Fetched {} quiz questions", questions.len());
        Ok(questions)
    }

    async fn fetch_narration(&self, text: &str) -> String {
        match self.try_fetch_narration(text).await {
            Ok(Some(audio)) => audio,
            Ok(None) => {
                tracing::warn!("API did not return audio data for text: {:?}", text);
                String::new()
            }
            Err(e) => {
                tracing::warn!("Error fetching narration audio: {}", e);
                String::new()
            }
        }
    }

    async fn fetch_character_image(&self, label: &str) -> EncodedImage {
        match self.try_fetch_image(label).await {
            Ok(Some(image)) => image,
            Ok(None) => {
                tracing::warn!("No image was generated for {:?}", label);
                EncodedImage::default()
            }
            Err(e) => {
                tracing::warn!("Error generating character image: {}", e);
                EncodedImage::default()
            }
        }
    }
}
