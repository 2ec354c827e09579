use super::prompts::CURRICULUM_PARSER;
use crate::application::use_cases::batch::BatchReport;
use crate::application::use_cases::prompt_engine::PromptVars;
use crate::application::use_cases::structured_output::{generate_structured, ChainSettings, RESPONSE_LANGUAGE_VAR};
use crate::domain::curriculum::Curriculum;
use crate::domain::error::Result;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::storage::{file_stem, list_files, read_text, write_json, DataLayout};
use std::sync::Arc;

pub struct CurriculumParser {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    settings: ChainSettings,
}

impl CurriculumParser {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>, settings: ChainSettings) -> Self {
        Self {
            llm_client,
            settings,
        }
    }

    pub async fn parse_curriculum(&self, curriculum_summary: &str) -> Result<Curriculum> {
        tracing::info!(
            "Parsing curriculum {}",
            curriculum_summary.lines().next().unwrap_or_default()
        );
        let vars = PromptVars::from([
            ("summary", curriculum_summary.to_string()),
            (RESPONSE_LANGUAGE_VAR, self.settings.output_language.clone()),
        ]);
        generate_structured(
            self.llm_client.as_ref(),
            &self.settings.llm,
            &CURRICULUM_PARSER,
            &vars,
            self.settings.structured_retries,
        )
        .await
    }

    /// Parses every summary text into `pydantic/<stem>.json`.
    pub async fn parse_all(&self, layout: &DataLayout) -> Result<BatchReport> {
        let out_dir = layout.parsed_curricula_dir();
        let mut report = BatchReport::default();

        for summary_path in list_files(&layout.curriculum_summaries_dir(), "txt")? {
            let out_path = out_dir.join(format!("{}.json", file_stem(&summary_path)));
            if out_path.exists() {
                report.skip(&out_path);
                continue;
            }
            let parsed = match read_text(&summary_path) {
                Ok(summary) => self.parse_curriculum(&summary).await,
                Err(e) => Err(e),
            };
            match parsed.and_then(|curriculum| write_json(&out_path, &curriculum)) {
                Ok(()) => report.wrote(&out_path),
                Err(e) => report.fail(summary_path.display().to_string(), &e),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::{chain_settings, ScriptedLlmClient};
    use crate::infrastructure::storage::{read_json, write_text};

    const CURRICULUM_JSON: &str = r#"{
        "subject": "Deutsch",
        "grades": [1, 2],
        "sections": [{"title": "Lesen", "learning_targets": ["Silben lesen"]}]
    }"#;

    #[tokio::test]
    async fn test_parse_all_writes_json_and_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path(), &dir.path().join("sofatutor"), "Schuljahre 1-2");
        write_text(&layout.curriculum_summaries_dir().join("Deutsch.txt"), "# Deutsch\n...").unwrap();
        write_text(&layout.curriculum_summaries_dir().join("Sport.txt"), "# Sport\n...").unwrap();
        write_text(&layout.parsed_curricula_dir().join("Sport.json"), "{}").unwrap();

        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(CURRICULUM_JSON.to_string())]));
        let parser = CurriculumParser::new(llm.clone(), chain_settings());
        let report = parser.parse_all(&layout).await.unwrap();

        assert_eq!((report.written, report.skipped), (1, 1));
        let curriculum: Curriculum = read_json(&layout.parsed_curricula_dir().join("Deutsch.json")).unwrap();
        assert_eq!(curriculum.grades_formatted(), "1 - 2");
        assert!(llm.prompts()[0].1.contains("# Deutsch"));
    }

    #[tokio::test]
    async fn test_empty_grades_are_asked_again() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            Ok(r#"{"subject": "Deutsch", "grades": [], "sections": []}"#.to_string()),
            Ok(CURRICULUM_JSON.to_string()),
        ]));
        let parser = CurriculumParser::new(llm.clone(), chain_settings());
        let curriculum = parser.parse_curriculum("# Deutsch").await.unwrap();
        assert_eq!(curriculum.sections.len(), 1);
        assert_eq!(llm.prompts().len(), 2);
    }
}
