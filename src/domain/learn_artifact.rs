use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A dated, tagged text record such as a report-card excerpt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearnLogArtifact {
    /// The date this artifact relates to. Depending on context, either a date when learning
    /// activities took place, or the date when a certificate or similar was issued. Use ISO 8601
    /// format.
    pub date: String,
    /// The school subject this artifact relates to, if any.
    pub school_subject: Option<String>,
    /// Tags that describe this artifact.
    pub tags: Vec<String>,
    /// The content of the artifact.
    pub content: String,
}

impl LearnLogArtifact {
    /// `{date}_{subject}_{hash}` where the hash is the first 8 hex chars of
    /// the content's SHA-256.
    pub fn identifier(&self) -> String {
        let digest = Sha256::digest(self.content.as_bytes());
        let content_hash = hex::encode(digest);
        format!(
            "{}_{}_{}",
            self.date,
            self.school_subject.as_deref().unwrap_or("None"),
            &content_hash[..8]
        )
    }

    pub fn has_tags(&self, required: &[&str]) -> bool {
        required
            .iter()
            .all(|tag| self.tags.iter().any(|have| have == tag))
    }

    pub fn str_format(&self) -> String {
        format!(
            "\n## {} - {}\n\nTags: {}\n\n{}\n",
            self.date,
            self.school_subject.as_deref().unwrap_or("None"),
            self.tags.join(", "),
            self.content.trim()
        )
    }
}
