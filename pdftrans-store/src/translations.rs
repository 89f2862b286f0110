use chrono::Utc;
use pdftrans_core::QualityReport;
use pdftrans_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// One line of `Translation/index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub filename: String,
    pub display_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Index {
    entries: Vec<IndexEntry>,
}

/// `Translation/<id>/meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationMeta {
    pub id: String,
    pub filename: String,
    pub display_name: String,
    pub created_at: String,
    pub has_ocr: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_profile: Option<serde_json::Value>,
}

/// What one run hands the store for persistence once a pipeline finishes.
pub struct SaveRequest {
    pub task_id: String,
    pub filename: String,
    pub translated_md: String,
    pub ocr_md: Option<String>,
    pub images: HashMap<String, Vec<u8>>,
    pub quality_report: Option<QualityReport>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub prompt_profile: Option<serde_json::Value>,
}

/// Filesystem layout under a `Translation/` root, mirroring the glossary
/// store's "file-per-record plus an index" idiom (`pdftrans_store::glossary`)
/// applied to per-task translation artifacts.
pub struct TranslationStore {
    root: PathBuf,
    index_lock: Mutex<()>,
}

impl TranslationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), index_lock: Mutex::new(()) }
    }

    fn task_dir(&self, task_id: &str) -> PathBuf {
        self.root.join(task_id)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    async fn load_index(&self) -> Index {
        match tokio::fs::read(self.index_path()).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Index::default(),
        }
    }

    /// Derive a display name from the uploaded filename's stem, appending
    /// `-2`, `-3`, ... on collision with an existing display name.
    fn unique_display_name(existing: &[IndexEntry], filename: &str) -> String {
        let stem = Path::new(filename).file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
        let taken: std::collections::HashSet<&str> =
            existing.iter().map(|e| e.display_name.as_str()).collect();

        if !taken.contains(stem) {
            return stem.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{stem}-{n}");
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }

    fn normalize_extension(name: &str) -> String {
        let lower = name.to_lowercase();
        if lower.ends_with(".jpeg") {
            format!("{}.jpg", &name[..name.len() - 5])
        } else {
            name.to_string()
        }
    }

    /// Persist `translated.md`, `ocr_raw.md` (if any), images, `meta.json`,
    /// the optional `quality_report.json`, and append to `index.json`
    /// newest-first.
    pub async fn save(&self, req: SaveRequest) -> Result<()> {
        let dir = self.task_dir(&req.task_id);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join("translated.md"), &req.translated_md).await?;

        let has_ocr = req.ocr_md.is_some();
        if let Some(ocr_md) = &req.ocr_md {
            tokio::fs::write(dir.join("ocr_raw.md"), ocr_md).await?;
        }

        if !req.images.is_empty() {
            let images_dir = dir.join("images");
            tokio::fs::create_dir_all(&images_dir).await?;
            for (name, bytes) in &req.images {
                let normalized = Self::normalize_extension(name);
                tokio::fs::write(images_dir.join(normalized), bytes).await?;
            }
        }

        if let Some(report) = &req.quality_report {
            let json = serde_json::to_vec_pretty(report)?;
            tokio::fs::write(dir.join("quality_report.json"), json).await?;
        }

        let _guard = self.index_lock.lock().await;
        let mut index = self.load_index().await;
        let display_name = Self::unique_display_name(&index.entries, &req.filename);
        let created_at = Utc::now().to_rfc3339();

        let meta = TranslationMeta {
            id: req.task_id.clone(),
            filename: req.filename.clone(),
            display_name: display_name.clone(),
            created_at: created_at.clone(),
            has_ocr,
            provider: req.provider,
            model: req.model,
            prompt_profile: req.prompt_profile,
        };
        tokio::fs::write(dir.join("meta.json"), serde_json::to_vec_pretty(&meta)?).await?;

        index.entries.insert(0, IndexEntry { id: req.task_id, filename: req.filename, display_name, created_at });
        tokio::fs::write(self.index_path(), serde_json::to_vec_pretty(&index)?).await?;

        Ok(())
    }

    pub async fn list(&self) -> Vec<IndexEntry> {
        self.load_index().await.entries
    }

    pub async fn meta(&self, task_id: &str) -> Result<Option<TranslationMeta>> {
        let path = self.task_dir(task_id).join("meta.json");
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(_) => Ok(None),
        }
    }

    pub async fn translated_md(&self, task_id: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.task_dir(task_id).join("translated.md")).await {
            Ok(content) => Ok(Some(content)),
            Err(_) => Ok(None),
        }
    }

    pub async fn quality_report(&self, task_id: &str) -> Result<Option<QualityReport>> {
        let path = self.task_dir(task_id).join("quality_report.json");
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(task_id: &str, filename: &str) -> SaveRequest {
        SaveRequest {
            task_id: task_id.to_string(),
            filename: filename.to_string(),
            translated_md: "# 标题\n\n内容".to_string(),
            ocr_md: None,
            images: HashMap::new(),
            quality_report: None,
            provider: None,
            model: None,
            prompt_profile: None,
        }
    }

    #[tokio::test]
    async fn save_then_list_is_newest_first() {
        let dir = tempdir().unwrap();
        let store = TranslationStore::new(dir.path());
        store.save(request("task-1", "paper.pdf")).await.unwrap();
        store.save(request("task-2", "other.pdf")).await.unwrap();

        let entries = store.list().await;
        assert_eq!(entries[0].id, "task-2");
        assert_eq!(entries[1].id, "task-1");
    }

    #[tokio::test]
    async fn display_name_collisions_get_suffixed() {
        let dir = tempdir().unwrap();
        let store = TranslationStore::new(dir.path());
        store.save(request("task-1", "paper.pdf")).await.unwrap();
        store.save(request("task-2", "paper.pdf")).await.unwrap();
        store.save(request("task-3", "paper.pdf")).await.unwrap();

        let entries = store.list().await;
        let names: Vec<&str> = entries.iter().map(|e| e.display_name.as_str()).collect();
        assert!(names.contains(&"paper"));
        assert!(names.contains(&"paper-2"));
        assert!(names.contains(&"paper-3"));
    }

    #[tokio::test]
    async fn jpeg_images_are_normalized_to_jpg() {
        let dir = tempdir().unwrap();
        let store = TranslationStore::new(dir.path());
        let mut req = request("task-1", "paper.pdf");
        req.images.insert("fig_1.jpeg".to_string(), vec![0xFF, 0xD8]);
        store.save(req).await.unwrap();

        assert!(tokio::fs::try_exists(dir.path().join("task-1/images/fig_1.jpg")).await.unwrap());
        assert!(!tokio::fs::try_exists(dir.path().join("task-1/images/fig_1.jpeg")).await.unwrap());
    }

    #[tokio::test]
    async fn persists_ocr_markdown_and_quality_report() {
        let dir = tempdir().unwrap();
        let store = TranslationStore::new(dir.path());
        let mut req = request("task-1", "scanned.pdf");
        req.ocr_md = Some("raw ocr text".to_string());
        req.quality_report =
            Some(QualityReport::new(vec![], vec![], vec![], vec!["looks good".to_string()]));
        store.save(req).await.unwrap();

        let meta = store.meta("task-1").await.unwrap().unwrap();
        assert!(meta.has_ocr);
        let report = store.quality_report("task-1").await.unwrap().unwrap();
        assert_eq!(report.score, 100);
    }
}
