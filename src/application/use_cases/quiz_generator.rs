use crate::application::use_cases::batch::BatchReport;
use crate::application::use_cases::context::StudentContext;
use crate::application::use_cases::prompt_engine::{PromptTemplate, PromptVars};
use crate::application::use_cases::structured_output::{generate_structured, ChainSettings};
use crate::domain::curriculum::Curriculum;
use crate::domain::error::Result;
use crate::domain::learn_artifact::LearnLogArtifact;
use crate::domain::quiz::MultipleChoiceQuiz;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::storage::write_text;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use std::sync::Arc;

pub const DEFAULT_NUM_QUESTIONS: usize = 10;
pub const MISSING_EVALUATION: &str = "Für dieses Fach liegt keine Beurteilung der Lehrerin vor.";

static GENERATE_MULTIPLE_CHOICE: Lazy<PromptTemplate> = Lazy::new(|| {
    PromptTemplate::new(
        r#"
    |SYSTEM|

    # Experte für spannende, anregende Prüfungsaufgaben für die Grundschule

    Mein Kind ist {age} Jahre alt und würde nun in die zweite Klasse der Grundschule in
    Deutschland kommen. Es wird zu Hause unterrichtet. Du erhältst eine
    Auflistung der Lernziele des Lehrplans für {subject}, sowie die Beurteilung
    der Klassenlehrerin für dieses Fach vom Ende der ersten Klasse.

    Generiere {num_questions} Multiple-Choice-Fragen, die auf dem Lehrplan
    basieren und die Lernziele des Lehrplans abdecken. Sei kreativ und verwende
    zum Beispiel Bilder aus der Welt von Super Mario. Beziehe die Beurteilung
    der Lehrerin mit ein, um eventuelle Stärken und Schwächen zu
    berücksichtigen.

    |USER|

    ## Lernziele des Lehrplans für {subject}

    {curriculum}

    ## Beurteilung der Lehrerin aus dem Abschlusszeugnis der ersten Klasse

    {evaluation}

    ## Response format

      - Genau 4 Antwortmöglichkeiten pro Frage
      - Genau eine Antwortmöglichkeit ist korrekt

    {response_format}

    ## Antwort Sprache

    Deutsch
"#,
        &[
            "age",
            "subject",
            "num_questions",
            "curriculum",
            "evaluation",
            "response_format",
        ],
    )
});

pub struct QuizGenerator {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    settings: ChainSettings,
    age: i32,
}

impl QuizGenerator {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>, settings: ChainSettings, age: i32) -> Self {
        Self {
            llm_client,
            settings,
            age,
        }
    }

    pub async fn generate(
        &self,
        subject: &str,
        curriculum: &Curriculum,
        evaluation: Option<&LearnLogArtifact>,
        num_questions: usize,
    ) -> Result<MultipleChoiceQuiz> {
        tracing::info!("Generating {} quiz questions for {}", num_questions, subject);
        let evaluation = evaluation
            .map(|artifact| artifact.str_format())
            .unwrap_or_else(|| MISSING_EVALUATION.to_string());
        let vars = PromptVars::from([
            ("age", self.age.to_string()),
            ("subject", subject.to_string()),
            ("num_questions", num_questions.to_string()),
            ("curriculum", curriculum.str_format(None)),
            ("evaluation", evaluation),
        ]);
        generate_structured(
            self.llm_client.as_ref(),
            &self.settings.llm,
            &GENERATE_MULTIPLE_CHOICE,
            &vars,
            self.settings.structured_retries,
        )
        .await
    }

    /// Writes `Starter Quizze/<subject>.md` for every curriculum without a quiz.
    pub async fn generate_all(&self, context: &StudentContext, num_questions: usize) -> Result<BatchReport> {
        let out_dir = context.layout().quizzes_dir();
        let curricula = context.load_curricula()?;
        let evaluations = context.load_evaluations(1)?;
        let mut report = BatchReport::default();

        let mut pending = Vec::new();
        for (subject, curriculum) in &curricula {
            let out_path = out_dir.join(format!("{}.md", subject));
            if out_path.exists() {
                report.skip(&out_path);
                continue;
            }
            if !evaluations.contains_key(subject) {
                tracing::warn!("No evaluation for {}, using a placeholder", subject);
            }
            pending.push((subject, curriculum, out_path));
        }

        let evaluations = &evaluations;
        let results: Vec<_> = stream::iter(pending)
            .map(move |(subject, curriculum, out_path)| async move {
                let quiz = self
                    .generate(subject, curriculum, evaluations.get(subject), num_questions)
                    .await;
                (subject, out_path, quiz)
            })
            .buffered(self.settings.max_concurrent)
            .collect()
            .await;

        for (subject, out_path, quiz) in results {
            match quiz.and_then(|quiz| write_text(&out_path, &quiz.str_fmt())) {
                Ok(()) => report.wrote(&out_path),
                Err(e) => report.fail(subject.clone(), &e),
            }
        }
        Ok(report)
    }
}
