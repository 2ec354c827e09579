use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SchoolCurriculumDocumentSection {
    /// The title of the section
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SchoolCurriculumDocumentCharacteristics {
    /// The school subject the document is about
    pub subject: String,
    /// The structure of the document
    pub structure: Vec<SchoolCurriculumDocumentSection>,
}

impl SchoolCurriculumDocumentCharacteristics {
    /// ```text
    /// Subject: {subject}
    /// TOC:
    ///   - {section1}
    ///   - {section2}
    /// ```
    pub fn str_format(&self) -> String {
        let toc = self
            .structure
            .iter()
            .map(|section| format!("  - {}", section.title))
            .collect::<Vec<_>>()
            .join("\n");
        format!("Subject: {}\nTOC:\n{}", self.subject, toc)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurriculumPageSummary {
    pub page_number: i64,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurriculumSummary {
    pub subject: String,
    pub structure: Vec<SchoolCurriculumDocumentSection>,
    pub summaries: Vec<CurriculumPageSummary>,
}

impl CurriculumSummary {
    pub fn str_format(&self) -> String {
        let toc = self
            .structure
            .iter()
            .map(|section| format!("  - {}", section.title))
            .collect::<Vec<_>>()
            .join("\n");
        let summaries = self
            .summaries
            .iter()
            .map(|page| format!("## {}:\n{}", page.page_number, page.summary))
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("\n# {}\n\n{}\n\n{}\n", self.subject, toc, summaries)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CurriculumSection {
    /// The title of the section
    pub title: String,
    /// The learning targets of the section
    pub learning_targets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
pub struct Curriculum {
    /// The school subject the document is about
    pub subject: String,
    /// The grades the curriculum is for
    #[validate(length(min = 1, message = "a curriculum covers at least one grade"))]
    pub grades: Vec<i32>,
    /// The sections of the curriculum
    pub sections: Vec<CurriculumSection>,
}

impl Curriculum {
    pub fn grades_formatted(&self) -> String {
        match (self.grades.iter().min(), self.grades.iter().max()) {
            (Some(min), Some(max)) => format!("{} - {}", min, max),
            _ => String::new(),
        }
    }

    /// Renders the curriculum, optionally restricted to the named sections.
    pub fn str_format(&self, section_subset: Option<&[&str]>) -> String {
        let mut s = format!("# {} ({})\n", self.subject, self.grades_formatted());
        for section in &self.sections {
            if let Some(subset) = section_subset {
                if !subset.contains(&section.title.as_str()) {
                    continue;
                }
            }
            s.push_str(&format!("\n## {}\n", section.title));
            let targets = section
                .learning_targets
                .iter()
                .map(|target| format!("  - {}", target))
                .collect::<Vec<_>>()
                .join("\n");
            s.push_str(&targets);
            s.push('\n');
        }
        s
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct LearningTargetExamples {
    /// The section of the curriculum
    pub section: String,
    /// The learning target
    pub learning_target: String,
    /// Examples for learning and exercising activities that can be done in the home schooling
    /// context to achieve the learning target
    pub examples: Vec<String>,
}

pub fn results_to_markdown(subject: &str, results: &[LearningTargetExamples]) -> String {
    let mut md = format!("# {}\n\n", subject);
    let mut section = "";
    for result in results {
        if result.section != section {
            md.push_str(&format!("\n## {}\n\n", result.section));
            section = &result.section;
        }
        md.push_str(&format!("\n### {}\n\n", result.learning_target));
        for example in &result.examples {
            md.push_str(&format!("  - {}\n", example));
        }
    }
    md
}
