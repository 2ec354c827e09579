use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, LLMProvider};

pub const DEFAULT_CONFIG_FILE: &str = "lairn.toml";
pub const CONFIG_PATH_ENV: &str = "LAIRN_CONFIG";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const ENV_KEYS: &[&str] = &[
    "OPENAI_API_KEY",
    "LLM",
    "LLM_PROVIDER",
    "LLM_BASE_URL",
    "GEMINI_API_KEY",
    "OUTPUT_LANGUAGE",
    "MAIN_DIR",
    "SOFA_DIR",
    "STUDENT_BIRTH_DATE",
    "CURRICULUM_GRADE_BAND",
    "MAX_CONCURRENT_REQUESTS",
    "LLM_MAX_RETRIES",
    "RATE_LIMIT_WAIT_SECS",
    "STRUCTURED_OUTPUT_RETRIES",
];

const BIRTH_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d"];

/// Settings as they appear in `lairn.toml` and the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawSettings {
    openai_api_key: Option<String>,
    llm: String,
    llm_provider: LLMProvider,
    llm_base_url: Option<String>,
    gemini_api_key: Option<String>,
    output_language: String,
    main_dir: Option<String>,
    sofa_dir: Option<String>,
    student_birth_date: Option<String>,
    curriculum_grade_band: String,
    max_concurrent_requests: usize,
    llm_max_retries: u32,
    rate_limit_wait_secs: u64,
    structured_output_retries: u32,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            llm: "gpt-4o-mini".to_string(),
            llm_provider: LLMProvider::OpenAI,
            llm_base_url: None,
            gemini_api_key: None,
            output_language: "de".to_string(),
            main_dir: None,
            sofa_dir: None,
            student_birth_date: None,
            curriculum_grade_band: "Schuljahre 1-2".to_string(),
            max_concurrent_requests: 4,
            llm_max_retries: 5,
            rate_limit_wait_secs: 5,
            structured_output_retries: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub llm: LLMConfig,
    pub output_language: String,
    pub main_dir: PathBuf,
    pub sofa_dir: PathBuf,
    pub student_birth_date: NaiveDate,
    pub curriculum_grade_band: String,
    pub max_concurrent_requests: usize,
    pub llm_max_retries: u32,
    pub rate_limit_wait: Duration,
    pub structured_output_retries: u32,
}

impl Settings {
    /// Loads `.env` (overriding the process environment), then layers
    /// defaults, the TOML file and raw environment variables.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        load_env_file(env_file)?;

        let config_path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let figment = Figment::from(Serialized::defaults(RawSettings::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::raw().only(ENV_KEYS));

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let raw: RawSettings = figment
            .extract()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        let main_dir = non_empty(raw.main_dir)
            .map(PathBuf::from)
            .ok_or_else(|| AppError::ValidationError("Please set MAIN_DIR".to_string()))?;
        let sofa_dir = non_empty(raw.sofa_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| main_dir.join("sofatutor"));

        let birth_date = non_empty(raw.student_birth_date).ok_or_else(|| {
            AppError::ValidationError("Please set STUDENT_BIRTH_DATE in .env file.".to_string())
        })?;
        let student_birth_date = parse_birth_date(&birth_date)?;

        let (base_url, api_key) = match raw.llm_provider {
            LLMProvider::OpenAI => (
                non_empty(raw.llm_base_url).unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
                non_empty(raw.openai_api_key),
            ),
            LLMProvider::Gemini => (
                non_empty(raw.llm_base_url).unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
                non_empty(raw.gemini_api_key),
            ),
        };

        if raw.max_concurrent_requests == 0 {
            return Err(AppError::ValidationError(
                "MAX_CONCURRENT_REQUESTS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            llm: LLMConfig::for_model(raw.llm_provider, &base_url, &raw.llm, api_key),
            output_language: raw.output_language,
            main_dir,
            sofa_dir,
            student_birth_date,
            curriculum_grade_band: raw.curriculum_grade_band,
            max_concurrent_requests: raw.max_concurrent_requests,
            llm_max_retries: raw.llm_max_retries,
            rate_limit_wait: Duration::from_secs(raw.rate_limit_wait_secs),
            structured_output_retries: raw.structured_output_retries,
        })
    }

    /// Replaces the model while keeping provider, endpoint and key.
    pub fn with_model(mut self, model: &str) -> Self {
        self.llm = LLMConfig::for_model(
            self.llm.provider,
            &self.llm.base_url,
            model,
            self.llm.api_key.clone(),
        );
        self
    }
}

fn load_env_file(env_file: Option<&Path>) -> Result<()> {
    match env_file {
        Some(path) => {
            dotenvy::from_path_override(path).map_err(|e| {
                AppError::ConfigError(format!("Failed to load {}: {}", path.display(), e))
            })?;
        }
        None => match dotenvy::dotenv_override() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
        },
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn parse_birth_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    BIRTH_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .ok_or_else(|| {
            AppError::ValidationError(format!("Unrecognised STUDENT_BIRTH_DATE: {}", value))
        })
}
