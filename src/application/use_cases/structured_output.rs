use crate::application::use_cases::prompt_engine::{PromptTemplate, PromptVars};
use crate::domain::curriculum::{
    Curriculum, LearningTargetExamples, SchoolCurriculumDocumentCharacteristics,
};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::nomy::NomyWeekSummaries;
use crate::domain::quiz::MultipleChoiceQuiz;
use crate::domain::week::WeekActivities;
use crate::infrastructure::config::Settings;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::{clean_llm_response, extract_json_payload, snippet};
use crate::shared::token_counter::TokenCounter;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use validator::Validate;

pub const RESPONSE_FORMAT_VAR: &str = "response_format";
pub const RESPONSE_LANGUAGE_VAR: &str = "response_language";

/// Model and request policy shared by every chain.
#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub llm: LLMConfig,
    pub output_language: String,
    pub max_concurrent: usize,
    pub structured_retries: u32,
}

impl ChainSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            llm: settings.llm.clone(),
            output_language: settings.output_language.clone(),
            max_concurrent: settings.max_concurrent_requests.max(1),
            structured_retries: settings.structured_output_retries,
        }
    }
}

/// A record the model is asked to return as JSON.
pub trait StructuredOutput: DeserializeOwned + JsonSchema + Send {
    /// Checks beyond the schema. Failing here triggers a retry like a parse error.
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

impl StructuredOutput for SchoolCurriculumDocumentCharacteristics {}
impl StructuredOutput for LearningTargetExamples {}
impl StructuredOutput for NomyWeekSummaries {}
impl StructuredOutput for WeekActivities {}

impl StructuredOutput for Curriculum {
    fn check(&self) -> Result<()> {
        Ok(self.validate()?)
    }
}

impl StructuredOutput for MultipleChoiceQuiz {
    fn check(&self) -> Result<()> {
        Ok(self.validate()?)
    }
}

/// Instructions telling the model to answer with a JSON instance of `T`.
pub fn format_instructions<T: JsonSchema>() -> Result<String> {
    let schema = schemars::schema_for!(T);
    let schema_json = serde_json::to_string(&schema)?;
    Ok(format!(
        "The output should be formatted as a JSON instance that conforms to the JSON schema below.\n\n\
As an example, for the schema {{\"properties\": {{\"foo\": {{\"title\": \"Foo\", \"description\": \"a list of strings\", \"type\": \"array\", \"items\": {{\"type\": \"string\"}}}}}}, \"required\": [\"foo\"]}}\n\
the object {{\"foo\": [\"bar\", \"baz\"]}} is a well-formatted instance of the schema. \
The object {{\"properties\": {{\"foo\": [\"bar\", \"baz\"]}}}} is not well-formatted.\n\n\
Here is the output schema:\n```\n{}\n```",
        schema_json
    ))
}

pub fn parse_structured<T: StructuredOutput>(raw: &str) -> Result<T> {
    let cleaned = clean_llm_response(raw);
    let payload = extract_json_payload(&cleaned);
    let value: T = serde_json::from_str(&payload).map_err(|e| {
        AppError::ParseError(format!(
            "Failed to parse model output ({}): {}",
            e,
            snippet(&cleaned, 200)
        ))
    })?;
    value.check()?;
    Ok(value)
}

/// Renders `template`, sends it and returns the cleaned answer.
pub async fn generate_text(
    llm: &dyn LLMClient,
    config: &LLMConfig,
    template: &PromptTemplate,
    vars: &PromptVars,
) -> Result<String> {
    let (system, user) = template.format_messages(vars)?;
    tracing::debug!(
        "Prompt size ~{} tokens",
        TokenCounter::estimate_prompt_tokens(&system, &user)
    );
    let raw = llm.generate(config, &system, &user).await?;
    Ok(clean_llm_response(&raw))
}

/// Like [`generate_text`] but parses the answer into `T`. The format
/// instructions are added as `response_format` when the template asks for
/// them. Unparseable or invalid answers are requested again up to
/// `retries` times.
pub async fn generate_structured<T: StructuredOutput>(
    llm: &dyn LLMClient,
    config: &LLMConfig,
    template: &PromptTemplate,
    vars: &PromptVars,
    retries: u32,
) -> Result<T> {
    let mut vars = vars.clone();
    if template.input_variables().contains(&RESPONSE_FORMAT_VAR) && !vars.contains_key(RESPONSE_FORMAT_VAR) {
        vars.insert(RESPONSE_FORMAT_VAR, format_instructions::<T>()?);
    }
    let (system, user) = template.format_messages(&vars)?;
    tracing::debug!(
        "Prompt size ~{} tokens",
        TokenCounter::estimate_prompt_tokens(&system, &user)
    );

    let mut attempt = 0;
    loop {
        let raw = llm.generate(config, &system, &user).await?;
        match parse_structured::<T>(&raw) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable_output() && attempt < retries => {
                attempt += 1;
                tracing::warn!("Retrying structured request ({}/{}): {}", attempt, retries, e);
            }
            Err(e) => return Err(e),
        }
    }
}
