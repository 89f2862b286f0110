use chrono::Utc;
use pdftrans_core::{GlossaryEntry, GlossaryFile, MergeConflict, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File-per-domain JSON glossary store, serialized under `glossaries/`.
///
/// Writes are serialized by an async mutex; reads are unlocked and tolerate
/// concurrent writes (last-write-wins at file level). Every mutation creates
/// a timestamped backup copy before the write becomes visible.
pub struct GlossaryStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl GlossaryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), write_lock: Mutex::new(()) }
    }

    fn domain_path(&self, domain: &str) -> PathBuf {
        self.root.join(format!("{domain}.json"))
    }

    fn backup_path(&self, domain: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        self.root.join(format!("{domain}.{stamp}.bak.json"))
    }

    /// Loads a domain's glossary, tolerating a missing file (empty list) and
    /// corrupted JSON (empty list with a warning).
    pub async fn load(&self, domain: &str) -> GlossaryFile {
        let path = self.domain_path(domain);
        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<GlossaryFile>(&bytes) {
                Ok(file) => file,
                Err(err) => {
                    warn!(domain, %err, "corrupted glossary file, treating as empty");
                    GlossaryFile { domain: domain.to_string(), entries: Vec::new(), updated_at: Utc::now().to_rfc3339() }
                }
            },
            Err(_) => GlossaryFile { domain: domain.to_string(), entries: Vec::new(), updated_at: Utc::now().to_rfc3339() },
        }
    }

    /// Lists known domains: every `*.json` file under the store root whose
    /// stem does not contain `.bak` (backups are excluded).
    pub async fn domains(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(_) => return Ok(out),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            if stem.contains(".bak") {
                continue;
            }
            out.push(stem.to_string());
        }
        out.sort();
        Ok(out)
    }

    async fn write_with_backup(&self, domain: &str, file: &GlossaryFile) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.domain_path(domain);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let backup = self.backup_path(domain);
            tokio::fs::copy(&path, &backup).await?;
            debug!(domain, backup = %backup.display(), "wrote glossary backup");
        }

        let json = serde_json::to_vec_pretty(file)?;
        tokio::fs::write(&path, json).await?;
        Ok(())
    }

    /// Upsert a single entry, preserving original English casing on updates.
    pub async fn update(&self, entry: GlossaryEntry) -> Result<GlossaryFile> {
        let mut file = self.load(&entry.domain).await;
        file.domain = entry.domain.clone();

        let existing_casing = file
            .entries
            .iter()
            .find(|e| e.english.eq_ignore_ascii_case(&entry.english))
            .map(|e| e.english.clone());

        let mut entry = entry;
        if let Some(casing) = existing_casing {
            entry.english = casing;
        }

        if let Some(existing) = file.entries.iter_mut().find(|e| e.english == entry.english) {
            *existing = entry;
        } else {
            file.entries.push(entry);
        }

        file.updated_at = Utc::now().to_rfc3339();
        self.write_with_backup(&file.domain, &file).await?;
        Ok(file)
    }

    /// Merge candidate entries into the stored glossary: existing
    /// translations are kept verbatim, new ones are added, and a conflict is
    /// recorded whenever an incoming entry would change an existing
    /// translation.
    pub async fn merge(
        &self,
        domain: &str,
        candidates: Vec<GlossaryEntry>,
    ) -> Result<(GlossaryFile, Vec<MergeConflict>)> {
        let mut file = self.load(domain).await;
        let mut conflicts = Vec::new();

        for candidate in candidates {
            match file.entries.iter().find(|e| e.english.eq_ignore_ascii_case(&candidate.english)) {
                Some(existing) if existing.chinese != candidate.chinese => {
                    conflicts.push(MergeConflict {
                        english: candidate.english.clone(),
                        existing: existing.chinese.clone(),
                        incoming: candidate.chinese.clone(),
                    });
                }
                Some(_) => {}
                None => file.entries.push(candidate),
            }
        }

        file.updated_at = Utc::now().to_rfc3339();
        self.write_with_backup(domain, &file).await?;
        Ok((file, conflicts))
    }

    /// Case-insensitive substring match on English or Chinese, within one
    /// domain (`Some(domain)`) or across all domains (`None`).
    pub async fn query(&self, domain: Option<&str>, term: &str) -> Result<Vec<GlossaryEntry>> {
        let needle = term.to_lowercase();
        let domains = match domain {
            Some(d) => vec![d.to_string()],
            None => self.domains().await?,
        };

        let mut out = Vec::new();
        for domain in domains {
            let file = self.load(&domain).await;
            out.extend(file.entries.into_iter().filter(|e| {
                e.english.to_lowercase().contains(&needle) || e.chinese.to_lowercase().contains(&needle)
            }));
        }
        Ok(out)
    }

    /// Returns the full glossary merged across all domains as an
    /// English-to-Chinese map, used to seed `AgentContext::glossary`.
    pub async fn as_map(&self, domain: &str) -> HashMap<String, String> {
        self.load(domain)
            .await
            .entries
            .into_iter()
            .map(|e| {
                let rendering = if e.keep_english { e.english.clone() } else { e.chinese };
                (e.english, rendering)
            })
            .collect()
    }
}
