use crate::domain::curriculum::Curriculum;
use crate::domain::error::Result;
use crate::domain::learn_artifact::LearnLogArtifact;
use crate::domain::learn_log::LearnLogMessage;
use crate::domain::nomy::NomyWeekSummary;
use crate::domain::sofatutor::SofatutorLearningActivity;
use crate::domain::week::WeeklySummary;
use crate::infrastructure::config::Settings;
use crate::infrastructure::storage::{list_files, load_json_dir, read_text, DataLayout};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

pub const EVALUATION_TAG: &str = "Zeugnis";

/// Read access to everything collected about the student.
#[derive(Debug, Clone)]
pub struct StudentContext {
    layout: DataLayout,
    birth_date: NaiveDate,
}

impl StudentContext {
    pub fn new(layout: DataLayout, birth_date: NaiveDate) -> Self {
        Self { layout, birth_date }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(DataLayout::from_settings(settings), settings.student_birth_date)
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Full years lived on `today`.
    pub fn student_age(&self, today: NaiveDate) -> i32 {
        let mut age = today.year() - self.birth_date.year();
        if (today.month(), today.day()) < (self.birth_date.month(), self.birth_date.day()) {
            age -= 1;
        }
        age
    }

    pub fn load_curricula(&self) -> Result<BTreeMap<String, Curriculum>> {
        let curricula: Vec<Curriculum> = load_json_dir(&self.layout.parsed_curricula_dir())?;
        Ok(curricula
            .into_iter()
            .map(|curriculum| (curriculum.subject.clone(), curriculum))
            .collect())
    }

    /// Artifacts carrying every tag in `must_include_tags`.
    pub fn load_artifacts(&self, must_include_tags: &[&str]) -> Result<Vec<LearnLogArtifact>> {
        let artifacts: Vec<LearnLogArtifact> = load_json_dir(&self.layout.artifacts_dir())?;
        Ok(artifacts
            .into_iter()
            .filter(|artifact| artifact.has_tags(must_include_tags))
            .collect())
    }

    /// End-of-year evaluations for `class_level`, keyed by subject.
    pub fn load_evaluations(&self, class_level: u32) -> Result<BTreeMap<String, LearnLogArtifact>> {
        let class_tag = format!("Klasse {}", class_level);
        let mut evaluations = BTreeMap::new();
        for artifact in self.load_artifacts(&[EVALUATION_TAG, class_tag.as_str()])? {
            let Some(subject) = artifact.school_subject.clone() else {
                continue;
            };
            if let Some(replaced) = evaluations.insert(subject, artifact) {
                tracing::warn!("Duplicate evaluation {} ignored", replaced.identifier());
            }
        }
        Ok(evaluations)
    }

    /// Chat exports are often hand-edited, so each file goes through the
    /// lenient message parser.
    pub fn load_logs(&self) -> Result<Vec<LearnLogMessage>> {
        let mut logs = Vec::new();
        for path in list_files(&self.layout.logs_dir(), "json")? {
            match read_text(&path).and_then(|raw| LearnLogMessage::from_json_str(&raw)) {
                Ok(message) => logs.push(message),
                Err(e) => tracing::warn!("Skipping log {}: {}", path.display(), e),
            }
        }
        logs.sort_by_key(|message| message.timestamp);
        Ok(logs)
    }

    pub fn load_sofa_activities(&self) -> Result<Vec<SofatutorLearningActivity>> {
        load_json_dir(&self.layout.sofa_activities_dir())
    }

    pub fn load_nomy_summaries(&self) -> Result<Vec<NomyWeekSummary>> {
        load_json_dir(&self.layout.nomy_data_dir())
    }

    pub fn load_weekly_summaries(&self) -> Result<Vec<WeeklySummary>> {
        load_json_dir(&self.layout.weekly_summaries_dir())
    }

    pub fn load_additional_explanations(&self) -> Result<Option<String>> {
        let path = self.layout.additional_explanations_path();
        if !path.is_file() {
            return Ok(None);
        }
        let text = read_text(&path)?;
        Ok(Some(text.trim().to_string()).filter(|t| !t.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::curriculum::CurriculumSection;
    use crate::infrastructure::storage::{write_json, write_text};

    fn context(dir: &std::path::Path) -> StudentContext {
        let layout = DataLayout::new(dir, &dir.join("sofatutor"), "Schuljahre 1-2");
        StudentContext::new(layout, NaiveDate::from_ymd_opt(2016, 9, 12).unwrap())
    }

    fn artifact(subject: Option<&str>, tags: &[&str]) -> LearnLogArtifact {
        LearnLogArtifact {
            date: "2024-07-10".to_string(),
            school_subject: subject.map(str::to_string),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            content: format!("Bewertung {:?}", subject),
        }
    }

    #[test]
    fn test_student_age_counts_full_years() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        assert_eq!(ctx.student_age(NaiveDate::from_ymd_opt(2024, 9, 11).unwrap()), 7);
        assert_eq!(ctx.student_age(NaiveDate::from_ymd_opt(2024, 9, 12).unwrap()), 8);
    }

    #[test]
    fn test_evaluations_need_both_tags_and_a_subject() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let artifacts_dir = ctx.layout().artifacts_dir();
        write_json(&artifacts_dir.join("a.json"), &artifact(Some("Deutsch"), &["Zeugnis", "Klasse 1"])).unwrap();
        write_json(&artifacts_dir.join("b.json"), &artifact(Some("Mathematik"), &["Zeugnis", "Klasse 2"])).unwrap();
        write_json(&artifacts_dir.join("c.json"), &artifact(None, &["Zeugnis", "Klasse 1"])).unwrap();
        write_json(&artifacts_dir.join("d.json"), &artifact(Some("Sport"), &["Klasse 1"])).unwrap();

        let evaluations = ctx.load_evaluations(1).unwrap();
        assert_eq!(evaluations.keys().collect::<Vec<_>>(), vec!["Deutsch"]);
        assert_eq!(ctx.load_artifacts(&["Klasse 1"]).unwrap().len(), 3);
    }

    #[test]
    fn test_curricula_keyed_by_subject() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        for subject in ["Sachunterricht", "Deutsch"] {
            let curriculum = Curriculum {
                subject: subject.to_string(),
                grades: vec![1, 2],
                sections: vec![CurriculumSection {
                    title: "Allgemein".to_string(),
                    learning_targets: vec!["Ziel".to_string()],
                }],
            };
            write_json(&ctx.layout().parsed_curricula_dir().join(format!("{subject}.json")), &curriculum).unwrap();
        }
        let curricula = ctx.load_curricula().unwrap();
        assert_eq!(curricula.keys().collect::<Vec<_>>(), vec!["Deutsch", "Sachunterricht"]);
    }

    #[test]
    fn test_logs_skip_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let logs_dir = ctx.layout().logs_dir();
        write_text(
            &logs_dir.join("2.json"),
            r#"{"user": "Mama", "timestamp": "2024-09-03T10:00:00", "text": "Lesen geübt"}"#,
        )
        .unwrap();
        write_text(
            &logs_dir.join("1.json"),
            r#"{"user": "Papa", "timestamp": "2024-09-02T09:00:00", "text": "Rechnen"}"#,
        )
        .unwrap();
        write_text(&logs_dir.join("3.json"), "kaputt").unwrap();

        let logs = ctx.load_logs().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].user, "Papa");
    }

    #[test]
    fn test_additional_explanations_optional() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        assert_eq!(ctx.load_additional_explanations().unwrap(), None);

        write_text(&ctx.layout().additional_explanations_path(), "  Kunst zählt zu Sachunterricht.\n").unwrap();
        assert_eq!(
            ctx.load_additional_explanations().unwrap().as_deref(),
            Some("Kunst zählt zu Sachunterricht.")
        );
    }
}
