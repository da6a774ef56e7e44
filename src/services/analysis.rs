use async_trait::async_trait;
use garde::Validate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use strum::{Display, EnumString};

use crate::models::analysis::FoodInfo;
use crate::models::meal::NutrientTotals;

/// The interchangeable cloud backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    OpenAi,
    Gemini,
}

/// Capability shared by the cloud backends: hand over a base64-encoded meal
/// photo, get a structured nutrition estimate back.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(&self, image_base64: &str) -> Result<FoodInfo, AnalysisError>;

    /// Free-form dinner suggestion built from today's macro totals.
    async fn recommend(&self, prompt: &str) -> Result<String, AnalysisError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider API key is not configured")]
    MissingKey,

    #[error("provider returned no content")]
    EmptyResponse,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("failed to parse provider reply as a nutrition estimate: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("nutrition estimate out of range: {0}")]
    Invalid(#[from] garde::Report),
}

/// Both backends are asked for this exact reply shape.
const ANALYZE_PROMPT: &str = concat!(
    "Analyze this meal photo and estimate its nutrition. ",
    "Reply with only this JSON, no markdown fences, no commentary: ",
    "{\"food_name\": \"name of the dish\", \"calories\": 0, ",
    "\"carbs\": 0.0, \"protein\": 0.0, \"fat\": 0.0}"
);

/// Prompt for the dinner-recommendation feature.
pub fn recommendation_prompt(totals: &NutrientTotals) -> String {
    format!(
        "So far today I ate {}g of carbs, {}g of protein and {}g of fat. \
         Suggest three dinner options that balance this out nutritionally, \
         with a one-line reason each. Keep the whole answer under three lines.",
        totals.carbs as i64, totals.protein as i64, totals.fat as i64,
    )
}

/// Models wrap their JSON in ```json fences often enough that every reply is
/// unfenced before parsing.
fn strip_code_fences(raw: &str) -> String {
    if raw.contains("```") {
        raw.replace("```json", "").replace("```", "").trim().to_string()
    } else {
        raw.trim().to_string()
    }
}

/// Parse and range-check a provider reply. An unparsable or out-of-range
/// payload is a malformed response, handled like any transient failure.
fn parse_food_info(raw: &str) -> Result<FoodInfo, AnalysisError> {
    let info: FoodInfo = serde_json::from_str(&strip_code_fences(raw))?;
    info.validate()?;
    Ok(info)
}

/// Holds both backends and the runtime-selected choice.
pub struct ProviderRegistry {
    openai: Arc<dyn AnalysisProvider>,
    gemini: Arc<dyn AnalysisProvider>,
    current: RwLock<CloudProvider>,
}

impl ProviderRegistry {
    pub fn new(
        openai: Arc<dyn AnalysisProvider>,
        gemini: Arc<dyn AnalysisProvider>,
        initial: CloudProvider,
    ) -> Self {
        Self {
            openai,
            gemini,
            current: RwLock::new(initial),
        }
    }

    pub fn current(&self) -> CloudProvider {
        *self.current.read().unwrap()
    }

    pub fn switch(&self, provider: CloudProvider) {
        *self.current.write().unwrap() = provider;
        tracing::info!(%provider, "analysis provider switched");
    }

    /// The currently selected backend.
    pub fn active(&self) -> Arc<dyn AnalysisProvider> {
        match self.current() {
            CloudProvider::OpenAi => self.openai.clone(),
            CloudProvider::Gemini => self.gemini.clone(),
        }
    }
}

/// OpenAI chat-completions backend (vision input via data URL).
pub struct OpenAiProvider {
    http: Client,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    async fn chat(&self, content: serde_json::Value) -> Result<String, AnalysisError> {
        if self.api_key.is_empty() {
            return Err(AnalysisError::MissingKey);
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": 500,
        });

        let response: ChatResponse = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(AnalysisError::EmptyResponse)
    }
}

#[async_trait]
impl AnalysisProvider for OpenAiProvider {
    async fn analyze(&self, image_base64: &str) -> Result<FoodInfo, AnalysisError> {
        let data_url = format!("data:image/jpeg;base64,{image_base64}");
        let content = serde_json::json!([
            { "type": "text", "text": ANALYZE_PROMPT },
            { "type": "image_url", "image_url": { "url": data_url } },
        ]);

        let reply = self.chat(content).await?;
        parse_food_info(&reply)
    }

    async fn recommend(&self, prompt: &str) -> Result<String, AnalysisError> {
        let reply = self.chat(serde_json::Value::String(prompt.to_string())).await?;
        Ok(reply.trim().to_string())
    }
}

/// Gemini generateContent backend (vision input inline).
pub struct GeminiProvider {
    http: Client,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
}

impl GeminiResponse {
    fn first_text(self) -> Result<String, AnalysisError> {
        if let Some(error) = self.error {
            return Err(AnalysisError::Provider(error.message));
        }
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find(|p| !p.text.is_empty()))
            .map(|p| p.text)
            .ok_or(AnalysisError::EmptyResponse)
    }
}

impl GeminiProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    async fn generate(&self, parts: serde_json::Value) -> Result<String, AnalysisError> {
        if self.api_key.is_empty() {
            return Err(AnalysisError::MissingKey);
        }

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        let body = serde_json::json!({ "contents": [{ "parts": parts }] });

        let response: GeminiResponse = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        response.first_text()
    }
}

#[async_trait]
impl AnalysisProvider for GeminiProvider {
    async fn analyze(&self, image_base64: &str) -> Result<FoodInfo, AnalysisError> {
        let parts = serde_json::json!([
            { "inline_data": { "mime_type": "image/jpeg", "data": image_base64 } },
            { "text": ANALYZE_PROMPT },
        ]);

        let reply = self.generate(parts).await?;
        parse_food_info(&reply)
    }

    async fn recommend(&self, prompt: &str) -> Result<String, AnalysisError> {
        let parts = serde_json::json!([{ "text": prompt }]);
        let reply = self.generate(parts).await?;
        Ok(reply.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_code_fences() {
        let fenced = "```json\n{\"food_name\": \"bibimbap\"}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"food_name\": \"bibimbap\"}");

        let bare_fence = "```\n{}\n```";
        assert_eq!(strip_code_fences(bare_fence), "{}");

        assert_eq!(strip_code_fences("  {\"a\": 1} \n"), "{\"a\": 1}");
    }

    #[test]
    fn parses_fenced_reply_with_defaults() {
        let raw = "```json\n{\"food_name\": \"김치찌개\", \"calories\": 450}\n```";
        let info = parse_food_info(raw).unwrap();
        assert_eq!(info.food_name, "김치찌개");
        assert_eq!(info.calories, 450);
        assert_eq!(info.carbs, 0.0);
        assert_eq!(info.fat, 0.0);
    }

    #[test]
    fn rejects_prose_replies() {
        let err = parse_food_info("That looks delicious! Roughly 450 kcal.");
        assert!(matches!(err, Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn rejects_out_of_range_estimates() {
        let raw = r#"{"food_name": "mystery", "calories": 999999}"#;
        assert!(matches!(
            parse_food_info(raw),
            Err(AnalysisError::Invalid(_))
        ));

        let raw = r#"{"food_name": "", "calories": 100}"#;
        assert!(matches!(
            parse_food_info(raw),
            Err(AnalysisError::Invalid(_))
        ));
    }

    #[test]
    fn provider_names_round_trip() {
        assert_eq!("openai".parse::<CloudProvider>().unwrap(), CloudProvider::OpenAi);
        assert_eq!("gemini".parse::<CloudProvider>().unwrap(), CloudProvider::Gemini);
        assert_eq!(CloudProvider::OpenAi.to_string(), "openai");
        assert!("llava".parse::<CloudProvider>().is_err());
    }
}
