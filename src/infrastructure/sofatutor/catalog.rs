use super::crawler::{LevelDetails, TopicNode};
use crate::domain::error::{AppError, Result};
use crate::domain::sofatutor::YearType;
use crate::infrastructure::storage::{atomic_write_bytes, DataLayout};
use calamine::{open_workbook, Reader, Xlsx};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const TOPIC_CHAIN_SEPARATOR: &str = " > ";
const COLUMNS: [&str; 7] = [
    "subject",
    "year_type",
    "year",
    "topic_chain",
    "title",
    "url",
    "description",
];

/// One video of the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogRow {
    pub subject: String,
    pub year_type: String,
    pub year: i32,
    pub topic_chain: Option<String>,
    pub title: Option<String>,
    pub url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMatch<'a> {
    pub related_years: Vec<i32>,
    pub row: &'a CatalogRow,
}

impl CatalogMatch<'_> {
    pub fn year_type(&self) -> Option<YearType> {
        YearType::parse(&self.row.year_type)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VideoCatalog {
    rows: Vec<CatalogRow>,
}

impl VideoCatalog {
    pub fn new(rows: Vec<CatalogRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CatalogRow] {
        &self.rows
    }

    /// Prefers the spreadsheet, then the CSV export. No catalogue at all
    /// gives an empty one.
    pub fn load(layout: &DataLayout) -> Result<Self> {
        let xlsx = layout.sofa_catalog_xlsx();
        if xlsx.is_file() {
            return Self::from_xlsx(&xlsx);
        }
        let csv = layout.sofa_catalog_csv();
        if csv.is_file() {
            return Self::from_csv(&csv);
        }
        tracing::warn!(
            "No video catalogue at {} or {}",
            xlsx.display(),
            csv.display()
        );
        Ok(Self::default())
    }

    pub fn from_xlsx(path: &Path) -> Result<Self> {
        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e| AppError::ParseError(format!("Failed to open Excel file: {}", e)))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| AppError::ParseError("No worksheet found".to_string()))?
            .map_err(|e| AppError::ParseError(format!("Failed to read Excel range: {}", e)))?;

        let mut rows = range.rows();
        let header: Vec<String> = match rows.next() {
            Some(header) => header.iter().map(|cell| cell.to_string()).collect(),
            None => return Ok(Self::default()),
        };
        let positions = column_positions(&header)?;

        let mut parsed = Vec::new();
        for (line, row) in rows.enumerate() {
            let cells: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
            match row_from_cells(&cells, &positions) {
                Some(row) => parsed.push(row),
                None => tracing::warn!("Skipping catalogue row {} of {}", line + 2, path.display()),
            }
        }
        tracing::info!("Loaded {} catalogue rows from {}", parsed.len(), path.display());
        Ok(Self::new(parsed))
    }

    pub fn from_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| AppError::IoError(format!("Failed to open {}: {}", path.display(), e)))?;
        let catalog = Self::from_csv_reader(file)?;
        tracing::info!("Loaded {} catalogue rows from {}", catalog.rows.len(), path.display());
        Ok(catalog)
    }

    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let mut rows = Vec::new();
        for (line, record) in reader.deserialize::<CatalogRow>().enumerate() {
            match record {
                Ok(row) => rows.push(row),
                Err(e) => tracing::warn!("Skipping catalogue row {}: {}", line + 2, e),
            }
        }
        Ok(Self::new(rows))
    }

    /// Rows whose URL contains `url`. Related years are the distinct years
    /// of all matches, everything else comes from the first one.
    pub fn lookup(&self, url: &str) -> Option<CatalogMatch<'_>> {
        let matches: Vec<&CatalogRow> = self.rows.iter().filter(|r| r.url.contains(url)).collect();
        let first = *matches.first()?;
        let mut related_years = Vec::new();
        for row in &matches {
            if !related_years.contains(&row.year) {
                related_years.push(row.year);
            }
        }
        Some(CatalogMatch {
            related_years,
            row: first,
        })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in &self.rows {
            writer
                .serialize(row)
                .map_err(|e| AppError::Internal(format!("Failed to write CSV row: {}", e)))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Internal(format!("Failed to flush CSV: {}", e)))?;
        atomic_write_bytes(path, &bytes)
    }
}

fn column_positions(header: &[String]) -> Result<HashMap<&'static str, usize>> {
    let mut positions = HashMap::new();
    for column in COLUMNS {
        if let Some(index) = header.iter().position(|h| h.trim() == column) {
            positions.insert(column, index);
        }
    }
    for required in ["subject", "year_type", "year", "url"] {
        if !positions.contains_key(required) {
            return Err(AppError::ParseError(format!(
                "Catalogue is missing the {} column",
                required
            )));
        }
    }
    Ok(positions)
}

fn row_from_cells(cells: &[String], positions: &HashMap<&'static str, usize>) -> Option<CatalogRow> {
    let cell = |column: &str| -> Option<String> {
        let value = cells.get(*positions.get(column)?)?.trim();
        (!value.is_empty()).then(|| value.to_string())
    };
    // Spreadsheets store years as floats.
    let year = cell("year")?.parse::<f64>().ok()? as i32;
    Some(CatalogRow {
        subject: cell("subject")?,
        year_type: cell("year_type")?,
        year,
        topic_chain: cell("topic_chain"),
        title: cell("title"),
        url: cell("url")?,
        description: cell("description"),
    })
}

/// Flattens a crawled level into catalogue rows, one per video.
pub fn rows_from_details(details: &LevelDetails) -> Vec<CatalogRow> {
    let mut rows = Vec::new();
    for topic in &details.topics {
        walk_videos(details, topic, vec![topic.topic.clone()], &mut rows);
    }
    rows
}

fn walk_videos(details: &LevelDetails, node: &TopicNode, chain: Vec<String>, rows: &mut Vec<CatalogRow>) {
    if let Some(content) = &node.video_content {
        for video in &content.videos {
            rows.push(CatalogRow {
                subject: details.subject.clone(),
                year_type: details.year_type.as_str().to_string(),
                year: details.year,
                topic_chain: Some(chain.join(TOPIC_CHAIN_SEPARATOR)),
                title: video.title.clone(),
                url: video.video_url.clone(),
                description: video.description.clone(),
            });
        }
    }
    for sub_topic in &node.sub_topics {
        let mut sub_chain = chain.clone();
        sub_chain.push(sub_topic.label.clone());
        walk_videos(details, &sub_topic.content, sub_chain, rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sofatutor::crawler::{SubTopic, TopicVideos};
    use crate::infrastructure::sofatutor::video_page::VideoPage;

    fn row(year: i32, url: &str) -> CatalogRow {
        CatalogRow {
            subject: "Englisch".to_string(),
            year_type: "learn_year".to_string(),
            year,
            topic_chain: Some("Grammatik > Präpositionen".to_string()),
            title: Some("Prepositions".to_string()),
            url: url.to_string(),
            description: Some("Lerne Präpositionen.".to_string()),
        }
    }

    #[test]
    fn test_lookup_collects_related_years() {
        let url = "https://www.sofatutor.com/englisch/videos/prepositions";
        let catalog = VideoCatalog::new(vec![
            row(3, url),
            row(4, url),
            row(3, url),
            row(1, "https://www.sofatutor.com/englisch/videos/colours"),
        ]);
        let found = catalog.lookup(url).unwrap();
        assert_eq!(found.related_years, vec![3, 4]);
        assert_eq!(found.year_type(), Some(YearType::LearnYear));
        assert!(catalog.lookup("https://www.sofatutor.com/unknown").is_none());
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sofatutor_videos.csv");
        let catalog = VideoCatalog::new(vec![row(3, "https://a"), CatalogRow { description: None, ..row(4, "https://b") }]);
        catalog.write_csv(&path).unwrap();

        let loaded = VideoCatalog::from_csv(&path).unwrap();
        assert_eq!(loaded.rows(), catalog.rows());
    }

    #[test]
    fn test_csv_reader_skips_bad_rows() {
        let data = "subject,year_type,year,topic_chain,title,url,description\n\
                    Mathematik,grade,2,Zahlen,Plus,https://m/plus,Addieren\n\
                    Mathematik,grade,zwei,Zahlen,Minus,https://m/minus,\n";
        let catalog = VideoCatalog::from_csv_reader(data.as_bytes()).unwrap();
        assert_eq!(catalog.rows().len(), 1);
        assert_eq!(catalog.rows()[0].url, "https://m/plus");
    }

    #[test]
    fn test_row_from_spreadsheet_cells() {
        let header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
        let positions = column_positions(&header).unwrap();
        let cells: Vec<String> = ["Deutsch", "grade", "2.0", "", "Silben", "https://d/silben", ""]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let row = row_from_cells(&cells, &positions).unwrap();
        assert_eq!(row.year, 2);
        assert_eq!(row.topic_chain, None);
        assert_eq!(row.title.as_deref(), Some("Silben"));
    }

    #[test]
    fn test_missing_required_column() {
        let header = vec!["subject".to_string(), "url".to_string()];
        assert!(column_positions(&header).is_err());
    }

    #[test]
    fn test_rows_from_details_joins_topic_chain() {
        let video = |url: &str| VideoPage {
            video_url: url.to_string(),
            title: Some("Video".to_string()),
            description: None,
            transcript: None,
        };
        let leaf = TopicNode {
            href: "/m/zahlen/bis-20".to_string(),
            url: "https://www.sofatutor.com/m/zahlen/bis-20".to_string(),
            topic: "Zahlen bis 20".to_string(),
            content_structure_text: None,
            sub_topics: vec![],
            video_content: Some(TopicVideos {
                topic: "Zahlen bis 20".to_string(),
                topic_description: None,
                videos: vec![video("https://v/1"), video("https://v/2")],
            }),
        };
        let details = LevelDetails {
            subject: "Mathematik".to_string(),
            year: 1,
            year_type: YearType::Grade,
            topic_overview: None,
            topics: vec![TopicNode {
                href: "/m/zahlen".to_string(),
                url: "https://www.sofatutor.com/m/zahlen".to_string(),
                topic: "Zahlen".to_string(),
                content_structure_text: None,
                sub_topics: vec![SubTopic {
                    label: "Bis 20".to_string(),
                    content: leaf,
                }],
                video_content: None,
            }],
        };

        let rows = rows_from_details(&details);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].topic_chain.as_deref(), Some("Zahlen > Bis 20"));
        assert_eq!(rows[0].year_type, "grade");
        assert_eq!(rows[1].url, "https://v/2");
    }
}
