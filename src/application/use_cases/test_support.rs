use crate::application::use_cases::structured_output::ChainSettings;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::llm_clients::LLMClient;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&str, &str) -> Result<String> + Send + Sync>;

enum Script {
    Queue(Mutex<VecDeque<Result<String>>>),
    Responder(Responder),
}

/// In-memory [`LLMClient`] that answers from a queue or a closure and keeps
/// every `(system, user)` pair it was sent.
pub struct ScriptedLlmClient {
    script: Script,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(responses.into())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// For parallel chains where the request order is not fixed.
    pub fn responding(responder: impl Fn(&str, &str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            script: Script::Responder(Box::new(responder)),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for ScriptedLlmClient {
    async fn generate(&self, _config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::LLMError("No scripted response left".to_string()))),
            Script::Responder(responder) => responder(system, user),
        }
    }
}

pub fn chain_settings() -> ChainSettings {
    ChainSettings {
        llm: LLMConfig::default(),
        output_language: "de".to_string(),
        max_concurrent: 4,
        structured_retries: 1,
    }
}
