use crate::application::use_cases::batch::BatchReport;
use crate::application::use_cases::curriculum::{
    CurriculumParser, CurriculumSummarizer, LearningExampleGenerator, SummarizeOptions,
    DEFAULT_NUM_EXAMPLES,
};
use crate::application::use_cases::nomy_reports::NomyReportParser;
use crate::application::use_cases::quiz_generator::{QuizGenerator, DEFAULT_NUM_QUESTIONS};
use crate::application::use_cases::sofatutor_import::{
    crawl_catalog, export_catalog, ImportOptions, SofatutorImporter,
};
use crate::application::use_cases::week_summarizer::{target_weeks, WeekSummarizer};
use crate::application::{ChainSettings, StudentContext};
use crate::domain::error::Result;
use crate::infrastructure::config::Settings;
use crate::infrastructure::llm_clients::{LLMClient, RouterClient};
use crate::infrastructure::sofatutor::catalog::VideoCatalog;
use crate::infrastructure::sofatutor::crawler::SofatutorCrawler;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "lairn")]
#[command(about = "Homeschooling assistant: curricula, weekly reports and learning activities")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Environment file loaded before the configuration
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Model name overriding LLM
    #[arg(long, global = true)]
    pub model: Option<String>,
}

#[derive(Debug, Subcommand, PartialEq)]
pub enum Command {
    /// Summarize every curriculum PDF
    SummarizeCurricula,

    /// Turn curriculum summaries into structured curricula
    ParseCurricula,

    /// Generate learning examples per learning target
    GenerateExamples {
        #[arg(long, default_value_t = DEFAULT_NUM_EXAMPLES)]
        num_examples: usize,
    },

    /// Generate multiple choice starter quizzes per subject
    GenerateQuizzes {
        #[arg(long, default_value_t = DEFAULT_NUM_QUESTIONS)]
        num_questions: usize,
    },

    /// Parse Nomy weekly report PDFs
    ProcessNomy,

    /// Import Sofatutor account exports as learning activities
    ImportSofatutor {
        /// Overwrite previously imported activities
        #[arg(long)]
        force: bool,

        /// Fetch video pages for URLs missing from the catalogue
        #[arg(long)]
        fetch_missing: bool,
    },

    /// Crawl the Sofatutor topic trees into details files
    CrawlSofatutor,

    /// Flatten crawled details into the video catalogue CSV
    ExportSofatutorVideos,

    /// Write weekly summaries
    SummarizeWeek {
        /// Week offset(s) from the current week
        #[arg(short = 'w', long = "weeks")]
        weeks: Vec<i64>,

        /// Process the current week instead of the previous one
        #[arg(short, long)]
        current: bool,

        /// Overwrite existing summaries
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn execute(command: Command, settings: Settings) -> Result<BatchReport> {
    let llm_client: Arc<dyn LLMClient + Send + Sync> = Arc::new(RouterClient::new(
        settings.llm_max_retries,
        settings.rate_limit_wait,
    ));
    let chain = ChainSettings::from_settings(&settings);
    let context = StudentContext::from_settings(&settings);
    let layout = context.layout().clone();
    let today = Local::now().date_naive();

    tracing::info!(
        "Using {:?} model {} (output language {})",
        settings.llm.provider,
        settings.llm.model,
        settings.output_language
    );

    match command {
        Command::SummarizeCurricula => {
            CurriculumSummarizer::new(llm_client, chain)
                .summarize_all(&layout, &SummarizeOptions::default())
                .await
        }
        Command::ParseCurricula => CurriculumParser::new(llm_client, chain).parse_all(&layout).await,
        Command::GenerateExamples { num_examples } => {
            LearningExampleGenerator::new(llm_client, chain)
                .generate_all(&context, num_examples)
                .await
        }
        Command::GenerateQuizzes { num_questions } => {
            QuizGenerator::new(llm_client, chain, context.student_age(today))
                .generate_all(&context, num_questions)
                .await
        }
        Command::ProcessNomy => NomyReportParser::new(llm_client, chain).process_all(&layout).await,
        Command::ImportSofatutor {
            force,
            fetch_missing,
        } => {
            let options = ImportOptions {
                force,
                fetch_missing,
            };
            let catalog = VideoCatalog::load(&layout)?;
            SofatutorImporter::new(layout, catalog, options)
                .import_all()
                .await
        }
        Command::CrawlSofatutor => {
            let crawler = SofatutorCrawler::new(settings.max_concurrent_requests)?;
            crawl_catalog(&layout, &crawler).await
        }
        Command::ExportSofatutorVideos => {
            export_catalog(&layout)?;
            let mut report = BatchReport::default();
            report.wrote(&layout.sofa_catalog_csv());
            Ok(report)
        }
        Command::SummarizeWeek {
            weeks,
            current,
            force,
        } => {
            if force {
                tracing::warn!("Force mode enabled - existing summaries will be overwritten");
            }
            let weeks = target_weeks(today, &weeks, current)?;
            WeekSummarizer::new(llm_client, chain, context, today)
                .summarize_weeks(&weeks, force)
                .await
        }
    }
}
