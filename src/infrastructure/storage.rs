use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::Settings;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const SOFA_EXPORT_PAGE: &str = "Mein Sofa.html";

fn io_err(msg: impl Into<String>) -> AppError {
    AppError::IoError(msg.into())
}

/// Every location the pipelines read from or write to.
#[derive(Debug, Clone)]
pub struct DataLayout {
    main_dir: PathBuf,
    sofa_dir: PathBuf,
    grade_band: String,
}

impl DataLayout {
    pub fn new(main_dir: &Path, sofa_dir: &Path, grade_band: &str) -> Self {
        Self {
            main_dir: main_dir.to_path_buf(),
            sofa_dir: sofa_dir.to_path_buf(),
            grade_band: grade_band.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.main_dir,
            &settings.sofa_dir,
            &settings.curriculum_grade_band,
        )
    }

    pub fn curricula_pdf_dir(&self) -> PathBuf {
        self.main_dir.join("Schullehrplan_Grundschule")
    }

    pub fn curriculum_summaries_dir(&self) -> PathBuf {
        self.main_dir
            .join("Schullehrplan_Grundschule_Zusammenfassungen")
            .join(&self.grade_band)
    }

    pub fn parsed_curricula_dir(&self) -> PathBuf {
        self.curriculum_summaries_dir().join("pydantic")
    }

    pub fn learning_examples_dir(&self) -> PathBuf {
        self.curriculum_summaries_dir().join("Beispiele")
    }

    pub fn quizzes_dir(&self) -> PathBuf {
        self.curriculum_summaries_dir().join("Starter Quizze")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.main_dir.join("artifacts")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.main_dir.join("slack_log_messages")
    }

    pub fn additional_explanations_path(&self) -> PathBuf {
        self.main_dir.join("additional_explanations.md")
    }

    pub fn nomy_reports_dir(&self) -> PathBuf {
        self.main_dir.join("nomy").join("summaries")
    }

    pub fn nomy_data_dir(&self) -> PathBuf {
        self.main_dir.join("nomy").join("data")
    }

    pub fn sofa_exports_dir(&self) -> PathBuf {
        self.sofa_dir.join("sofatutor_exports")
    }

    pub fn sofa_parsed_dir(&self) -> PathBuf {
        self.sofa_dir.join("sofatutor_parsed")
    }

    pub fn sofa_details_dir(&self) -> PathBuf {
        self.sofa_parsed_dir().join("details")
    }

    pub fn sofa_catalog_xlsx(&self) -> PathBuf {
        self.sofa_parsed_dir().join("sofatutor_videos.xlsx")
    }

    pub fn sofa_catalog_csv(&self) -> PathBuf {
        self.sofa_parsed_dir().join("sofatutor_videos.csv")
    }

    pub fn sofa_video_cache_dir(&self) -> PathBuf {
        self.sofa_parsed_dir().join("video_pages")
    }

    pub fn sofa_activities_dir(&self) -> PathBuf {
        self.sofa_dir.join("activities")
    }

    pub fn weekly_summaries_dir(&self) -> PathBuf {
        self.main_dir.join("weekly_summaries")
    }

    /// `Mein Sofa.html` of every `*export*` directory, sorted by directory name.
    pub fn sofa_export_pages(&self) -> Result<Vec<PathBuf>> {
        let root = self.sofa_exports_dir();
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut pages = Vec::new();
        for entry in fs::read_dir(&root)
            .map_err(|e| io_err(format!("Failed to read dir {}: {e}", root.display())))?
        {
            let path = entry?.path();
            let is_export = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.contains("export"))
                .unwrap_or(false);
            let page = path.join(SOFA_EXPORT_PAGE);
            if path.is_dir() && is_export && page.is_file() {
                pages.push(page);
            }
        }
        pages.sort();
        Ok(pages)
    }
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| io_err(format!("Failed to create dir {}: {e}", path.display())))?;
    Ok(())
}

/// Files in `dir` with extension `ext` (without the dot), sorted by name.
/// A missing directory yields an empty list.
pub fn list_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .map_err(|e| io_err(format!("Failed to read dir {}: {e}", dir.display())))?
    {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(ext))
            .unwrap_or(false);
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| io_err(format!("Failed to read {}: {e}", path.display())))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = read_text(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| AppError::ParseError(format!("Invalid JSON in {}: {e}", path.display())))
}

/// Every `*.json` in `dir` parsed as `T`, in file-name order. Unreadable
/// files are logged and skipped.
pub fn load_json_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    for path in list_files(dir, "json")? {
        match read_json(&path) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
        }
    }
    Ok(items)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write_bytes(path, &bytes)
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    atomic_write_bytes(path, text.as_bytes())
}

/// Writes through a temp file in the same directory and renames it into place.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| io_err(format!("Not a file path: {}", path.display())))?;
    let tmp_path = path.with_file_name(format!(".{}.tmp-{}", file_name, Uuid::new_v4()));
    {
        let mut file = fs::File::create(&tmp_path).map_err(|e| {
            io_err(format!("Failed to create temp file {}: {e}", tmp_path.display()))
        })?;
        file.write_all(bytes).map_err(|e| {
            io_err(format!("Failed to write temp file {}: {e}", tmp_path.display()))
        })?;
        file.sync_all().ok();
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_err(format!(
            "Failed to rename temp file {} to {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}
