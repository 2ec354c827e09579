use super::prompts::GENERATE_LEARNING_EXAMPLES;
use crate::application::use_cases::batch::BatchReport;
use crate::application::use_cases::context::StudentContext;
use crate::application::use_cases::prompt_engine::PromptVars;
use crate::application::use_cases::structured_output::{generate_structured, ChainSettings, RESPONSE_LANGUAGE_VAR};
use crate::domain::curriculum::{results_to_markdown, Curriculum, LearningTargetExamples};
use crate::domain::error::Result;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::storage::write_text;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

pub const DEFAULT_NUM_EXAMPLES: usize = 5;

pub struct LearningExampleGenerator {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    settings: ChainSettings,
}

impl LearningExampleGenerator {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>, settings: ChainSettings) -> Self {
        Self {
            llm_client,
            settings,
        }
    }

    async fn examples_for_target(
        &self,
        curriculum: &Curriculum,
        section: &str,
        learning_target: &str,
        num_examples: usize,
    ) -> Result<LearningTargetExamples> {
        tracing::info!(
            "Handling learning target: {} of section: {}",
            learning_target,
            section
        );
        let vars = PromptVars::from([
            ("grades", curriculum.grades_formatted()),
            ("subject", curriculum.subject.clone()),
            ("num_examples", num_examples.to_string()),
            ("curriculum", curriculum.str_format(Some(&[section][..]))),
            ("section", section.to_string()),
            ("learning_target", learning_target.to_string()),
            (RESPONSE_LANGUAGE_VAR, self.settings.output_language.clone()),
        ]);
        generate_structured(
            self.llm_client.as_ref(),
            &self.settings.llm,
            &GENERATE_LEARNING_EXAMPLES,
            &vars,
            self.settings.structured_retries,
        )
        .await
    }

    /// One result per learning target, in curriculum order.
    pub async fn create_examples(
        &self,
        curriculum: &Curriculum,
        num_examples: usize,
    ) -> Result<Vec<LearningTargetExamples>> {
        tracing::info!(
            "Generating learning examples for curriculum with subject {}",
            curriculum.subject
        );
        let targets: Vec<(&str, &str)> = curriculum
            .sections
            .iter()
            .flat_map(|section| {
                section
                    .learning_targets
                    .iter()
                    .map(move |target| (section.title.as_str(), target.as_str()))
            })
            .collect();

        stream::iter(targets)
            .map(|(section, target)| self.examples_for_target(curriculum, section, target, num_examples))
            .buffered(self.settings.max_concurrent)
            .try_collect()
            .await
    }

    /// Writes `Beispiele/<subject>.md` for every curriculum without one.
    pub async fn generate_all(&self, context: &StudentContext, num_examples: usize) -> Result<BatchReport> {
        let out_dir = context.layout().learning_examples_dir();
        let mut report = BatchReport::default();

        for (subject, curriculum) in context.load_curricula()? {
            let out_path = out_dir.join(format!("{}.md", subject));
            if out_path.exists() {
                report.skip(&out_path);
                continue;
            }
            let written = self
                .create_examples(&curriculum, num_examples)
                .await
                .and_then(|results| write_text(&out_path, &results_to_markdown(&subject, &results)));
            match written {
                Ok(()) => report.wrote(&out_path),
                Err(e) => report.fail(subject, &e),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::{chain_settings, ScriptedLlmClient};
    use crate::domain::curriculum::CurriculumSection;

    fn curriculum() -> Curriculum {
        Curriculum {
            subject: "Mathematik".to_string(),
            grades: vec![1, 2],
            sections: vec![
                CurriculumSection {
                    title: "Zahlen".to_string(),
                    learning_targets: vec!["Bis 20 zählen".to_string(), "Zahlen vergleichen".to_string()],
                },
                CurriculumSection {
                    title: "Größen".to_string(),
                    learning_targets: vec!["Geld kennen".to_string()],
                },
            ],
        }
    }

    fn target_of(user: &str) -> String {
        user.split("## Learning target: provide examples for this target!")
            .nth(1)
            .and_then(|rest| rest.split("## Response format").next())
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_results_keep_curriculum_order() {
        let llm = Arc::new(ScriptedLlmClient::responding(|_, user| {
            let target = target_of(user);
            let section = if target == "Geld kennen" { "Größen" } else { "Zahlen" };
            Ok(serde_json::json!({
                "section": section,
                "learning_target": target,
                "examples": [format!("Spiel zu {}", target)]
            })
            .to_string())
        }));
        let generator = LearningExampleGenerator::new(llm.clone(), chain_settings());

        let results = generator.create_examples(&curriculum(), 3).await.unwrap();

        let targets: Vec<&str> = results.iter().map(|r| r.learning_target.as_str()).collect();
        assert_eq!(targets, vec!["Bis 20 zählen", "Zahlen vergleichen", "Geld kennen"]);

        let prompts = llm.prompts();
        assert!(prompts[0].0.contains("Provide 3 examples"));
        let geld = prompts.iter().find(|(_, user)| target_of(user) == "Geld kennen").unwrap();
        assert!(geld.1.contains("## Größen"));
        assert!(!geld.1.contains("## Zahlen"));

        let md = results_to_markdown("Mathematik", &results);
        assert!(md.contains("### Geld kennen\n\n  - Spiel zu Geld kennen"));
    }
}
