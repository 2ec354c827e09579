use super::prompts::{PARSE_CURRICULUM_STRUCTURE, SUMMARIZE_CURRICULUM_PAGE, WRITE_SUBJECT_OVERVIEW};
use crate::application::use_cases::batch::BatchReport;
use crate::application::use_cases::prompt_engine::PromptVars;
use crate::application::use_cases::structured_output::{
    generate_structured, generate_text, ChainSettings, RESPONSE_LANGUAGE_VAR,
};
use crate::domain::curriculum::{
    CurriculumPageSummary, CurriculumSummary, SchoolCurriculumDocumentCharacteristics,
};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::pdf::{join_pages, load_pdf_pages, PdfPage};
use crate::infrastructure::storage::{file_stem, list_files, write_text, DataLayout};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    pub n_preface_pages: usize,
    /// Pages before the printed page 1.
    pub page_number_offset: i64,
    pub page_separator: String,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            n_preface_pages: 3,
            page_number_offset: 3,
            page_separator: "\n\n".to_string(),
        }
    }
}

pub struct CurriculumSummarizer {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    settings: ChainSettings,
}

impl CurriculumSummarizer {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>, settings: ChainSettings) -> Self {
        Self {
            llm_client,
            settings,
        }
    }

    pub async fn summarize_curriculum_pdf(&self, path: &Path, options: &SummarizeOptions) -> Result<String> {
        tracing::info!("Summarizing curriculum PDF: {}", path.display());
        let pages = load_pdf_pages(path)?;
        self.summarize_pages(&pages, options).await
    }

    pub async fn summarize_pages(&self, pages: &[PdfPage], options: &SummarizeOptions) -> Result<String> {
        if pages.len() <= options.n_preface_pages {
            return Err(AppError::ValidationError(format!(
                "Curriculum has {} pages, nothing left after {} preface pages",
                pages.len(),
                options.n_preface_pages
            )));
        }
        let (preface, body) = pages.split_at(options.n_preface_pages);

        let doc_structure = self
            .analyze_document_structure(&join_pages(preface, &options.page_separator))
            .await?;
        let doc_structure_fmt = doc_structure.str_format();

        tracing::info!("Summarizing {} curriculum pages", body.len());
        let mut summaries: Vec<CurriculumPageSummary> = stream::iter(body)
            .map(|page| {
                let page_number = page.index as i64 + 1 - options.page_number_offset;
                self.summarize_page(page_number, &page.content, &doc_structure_fmt)
            })
            .buffered(self.settings.max_concurrent)
            .try_collect()
            .await?;
        summaries.sort_by_key(|summary| summary.page_number);

        let summary = CurriculumSummary {
            subject: doc_structure.subject,
            structure: doc_structure.structure,
            summaries,
        };
        self.write_final_overview(&summary).await
    }

    async fn analyze_document_structure(
        &self,
        preface_content: &str,
    ) -> Result<SchoolCurriculumDocumentCharacteristics> {
        tracing::info!("Analyzing document structure");
        let vars = PromptVars::from([
            ("preface_content", preface_content.to_string()),
            (RESPONSE_LANGUAGE_VAR, self.settings.output_language.clone()),
        ]);
        generate_structured(
            self.llm_client.as_ref(),
            &self.settings.llm,
            &PARSE_CURRICULUM_STRUCTURE,
            &vars,
            self.settings.structured_retries,
        )
        .await
    }

    async fn summarize_page(
        &self,
        page_number: i64,
        page_content: &str,
        doc_structure: &str,
    ) -> Result<CurriculumPageSummary> {
        tracing::info!("Treating page {}", page_number);
        let vars = PromptVars::from([
            ("doc_structure", doc_structure.to_string()),
            ("page_number", page_number.to_string()),
            ("page_content", page_content.to_string()),
            (RESPONSE_LANGUAGE_VAR, self.settings.output_language.clone()),
        ]);
        let summary = generate_text(
            self.llm_client.as_ref(),
            &self.settings.llm,
            &SUMMARIZE_CURRICULUM_PAGE,
            &vars,
        )
        .await?;
        Ok(CurriculumPageSummary {
            page_number,
            summary,
        })
    }

    async fn write_final_overview(&self, summary: &CurriculumSummary) -> Result<String> {
        let vars = PromptVars::from([
            ("subject", summary.subject.clone()),
            ("summary", summary.str_format()),
            (RESPONSE_LANGUAGE_VAR, self.settings.output_language.clone()),
        ]);
        generate_text(
            self.llm_client.as_ref(),
            &self.settings.llm,
            &WRITE_SUBJECT_OVERVIEW,
            &vars,
        )
        .await
    }

    /// Summarizes every curriculum PDF that has no summary yet.
    pub async fn summarize_all(&self, layout: &DataLayout, options: &SummarizeOptions) -> Result<BatchReport> {
        let out_dir = layout.curriculum_summaries_dir();
        let mut report = BatchReport::default();

        for pdf in list_files(&layout.curricula_pdf_dir(), "pdf")? {
            let out_path = out_dir.join(format!("{}.txt", file_stem(&pdf)));
            if out_path.exists() {
                report.skip(&out_path);
                continue;
            }
            let written = self
                .summarize_curriculum_pdf(&pdf, options)
                .await
                .and_then(|text| write_text(&out_path, &text));
            match written {
                Ok(()) => report.wrote(&out_path),
                Err(e) => report.fail(pdf.display().to_string(), &e),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::{chain_settings, ScriptedLlmClient};

    fn pages(count: usize) -> Vec<PdfPage> {
        (0..count)
            .map(|index| PdfPage {
                index,
                content: format!("Seite {}", index),
            })
            .collect()
    }

    fn scripted() -> ScriptedLlmClient {
        ScriptedLlmClient::responding(|system, user| {
            if system.contains("curriculum interpreter") {
                Ok(r#"{"subject": "Mathematik", "structure": [{"title": "Zahlen"}]}"#.to_string())
            } else if system.contains("extract the") {
                let number = user
                    .split("## Page number")
                    .nth(1)
                    .and_then(|rest| rest.split_whitespace().next())
                    .unwrap_or("?")
                    .to_string();
                Ok(format!("Zusammenfassung {}", number))
            } else {
                Ok(format!("Überblick\n{}", user))
            }
        })
    }

    #[tokio::test]
    async fn test_summarize_pages_numbers_and_orders_pages() {
        let llm = Arc::new(scripted());
        let summarizer = CurriculumSummarizer::new(llm.clone(), chain_settings());

        let overview = summarizer
            .summarize_pages(&pages(6), &SummarizeOptions::default())
            .await
            .unwrap();

        assert!(overview.starts_with("Überblick"));
        let first = overview.find("## 1:\nZusammenfassung 1").unwrap();
        let third = overview.find("## 3:\nZusammenfassung 3").unwrap();
        assert!(first < third);
        assert!(overview.contains("# Mathematik"));

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1 + 3 + 1);
        assert!(prompts[0].1.starts_with("## Preface content of the document\n\nSeite 0\n\nSeite 1\n\nSeite 2"));
        assert!(prompts.last().unwrap().0.contains("for the subject Mathematik"));
    }

    #[tokio::test]
    async fn test_preface_only_document_is_rejected() {
        let llm = Arc::new(scripted());
        let summarizer = CurriculumSummarizer::new(llm.clone(), chain_settings());
        let result = summarizer.summarize_pages(&pages(3), &SummarizeOptions::default()).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert!(llm.prompts().is_empty());
    }
}
