use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    OpenAI,
    Gemini,
}

impl Default for LLMProvider {
    fn default() -> Self {
        LLMProvider::OpenAI
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl LLMConfig {
    /// Deterministic settings used by every prompt chain. `o1-preview` only
    /// accepts the default temperature of 1.0.
    pub fn for_model(provider: LLMProvider, base_url: &str, model: &str, api_key: Option<String>) -> Self {
        let temperature = if model == "o1-preview" { 1.0 } else { 0.0 };
        Self {
            provider,
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key,
            max_tokens: None,
            temperature: Some(temperature),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self::for_model(
            LLMProvider::OpenAI,
            "https://api.openai.com/v1",
            "gpt-4o-mini",
            None,
        )
    }
}
