pub mod gemini;
pub mod openai;

use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::llm_config::LLMProvider;
use async_trait::async_trait;
use gemini::GeminiClient;
use openai::OpenAIClient;
use std::future::Future;
use std::time::Duration;

#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String>;
}

pub(crate) fn status_error(status: reqwest::StatusCode, body: String) -> AppError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        AppError::RateLimited(format!("API error ({}): {}", status, body))
    } else {
        AppError::LLMError(format!("API error ({}): {}", status, body))
    }
}

/// Runs `request` again after `wait` whenever it fails with
/// [`AppError::RateLimited`], at most `max_retries` extra times.
pub async fn with_rate_limit_retry<F, Fut, T>(max_retries: u32, wait: Duration, mut request: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match request().await {
            Err(AppError::RateLimited(msg)) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    "Rate limit error, waiting {:?} (retry {}/{}): {}",
                    wait,
                    attempt,
                    max_retries,
                    msg
                );
                tokio::time::sleep(wait).await;
            }
            other => return other,
        }
    }
}

pub struct RouterClient {
    openai: OpenAIClient,
    gemini: GeminiClient,
    max_retries: u32,
    rate_limit_wait: Duration,
}

impl RouterClient {
    pub fn new(max_retries: u32, rate_limit_wait: Duration) -> Self {
        Self {
            openai: OpenAIClient::new(),
            gemini: GeminiClient::new(),
            max_retries,
            rate_limit_wait,
        }
    }
}

#[async_trait]
impl LLMClient for RouterClient {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        with_rate_limit_retry(self.max_retries, self.rate_limit_wait, move || async move {
            match config.provider {
                LLMProvider::Gemini => self.gemini.generate(config, system, user).await,
                LLMProvider::OpenAI => self.openai.generate(config, system, user).await,
            }
        })
        .await
    }
}
