use chrono::Utc;
use pdftrans_core::{PaperMetadata, PdfTransError, Result};
use sqlx::{
    sqlite::{SqlitePool, SqlitePoolOptions},
    Row,
};

fn store_err(err: impl std::fmt::Display) -> PdfTransError {
    PdfTransError::Store(err.to_string())
}

/// One persisted row, joining `PaperMetadata` with its storage-level fields.
#[derive(Debug, Clone)]
pub struct PaperRecord {
    pub id: String,
    pub metadata: PaperMetadata,
    pub embedding: Option<Vec<f32>>,
    pub quality_score: Option<i32>,
    pub filename: String,
    pub created_at: String,
}

/// SQLite-backed paper metadata store with an FTS5 shadow index, mirroring
/// `adk-session`'s `DatabaseSessionService` (sqlx pool, idempotent
/// migrations, `map_err` into a typed error per call) applied to a
/// search-oriented schema instead of a session/event schema.
pub struct PaperRepository {
    pool: SqlitePool,
}

impl PaperRepository {
    pub async fn connect(database_url: &str) -> Result<Self> {
        // An in-memory database is private per connection; cap the pool at
        // one connection so migrations and queries land on the same schema.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(store_err)?;
        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent schema creation plus simple column-level migrations: check
    /// `PRAGMA table_info` and `ALTER TABLE` to add any newly introduced
    /// column.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS papers (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                title_zh TEXT NOT NULL DEFAULT '',
                authors TEXT NOT NULL DEFAULT '[]',
                abstract_text TEXT NOT NULL DEFAULT '',
                domain TEXT NOT NULL DEFAULT '',
                research_problem TEXT NOT NULL DEFAULT '',
                methodology TEXT NOT NULL DEFAULT '',
                contributions TEXT NOT NULL DEFAULT '[]',
                keywords TEXT NOT NULL DEFAULT '[]',
                tags TEXT NOT NULL DEFAULT '[]',
                base_models TEXT NOT NULL DEFAULT '[]',
                year INTEGER,
                venue TEXT NOT NULL DEFAULT '',
                embedding BLOB,
                quality_score INTEGER,
                filename TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS papers_fts USING fts5(
                title, title_zh, abstract_text, research_problem, methodology, keywords,
                content='papers', content_rowid='rowid'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS papers_ai AFTER INSERT ON papers BEGIN
                INSERT INTO papers_fts(rowid, title, title_zh, abstract_text, research_problem, methodology, keywords)
                VALUES (new.rowid, new.title, new.title_zh, new.abstract_text, new.research_problem, new.methodology, new.keywords);
            END
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS papers_ad AFTER DELETE ON papers BEGIN
                INSERT INTO papers_fts(papers_fts, rowid, title, title_zh, abstract_text, research_problem, methodology, keywords)
                VALUES ('delete', old.rowid, old.title, old.title_zh, old.abstract_text, old.research_problem, old.methodology, old.keywords);
            END
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS papers_au AFTER UPDATE ON papers BEGIN
                INSERT INTO papers_fts(papers_fts, rowid, title, title_zh, abstract_text, research_problem, methodology, keywords)
                VALUES ('delete', old.rowid, old.title, old.title_zh, old.abstract_text, old.research_problem, old.methodology, old.keywords);
                INSERT INTO papers_fts(rowid, title, title_zh, abstract_text, research_problem, methodology, keywords)
                VALUES (new.rowid, new.title, new.title_zh, new.abstract_text, new.research_problem, new.methodology, new.keywords);
            END
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        self.ensure_columns().await
    }

    async fn ensure_columns(&self) -> Result<()> {
        let rows = sqlx::query("PRAGMA table_info(papers)").fetch_all(&self.pool).await.map_err(store_err)?;
        let existing: Vec<String> = rows.iter().map(|r| r.get::<String, _>("name")).collect();

        let expected: &[(&str, &str)] = &[
            ("tags", "TEXT NOT NULL DEFAULT '[]'"),
            ("base_models", "TEXT NOT NULL DEFAULT '[]'"),
        ];

        for (column, ddl) in expected {
            if !existing.iter().any(|c| c == column) {
                let stmt = format!("ALTER TABLE papers ADD COLUMN {column} {ddl}");
                sqlx::query(&stmt).execute(&self.pool).await.map_err(store_err)?;
            }
        }
        Ok(())
    }

    /// INSERT ... ON CONFLICT(id) DO UPDATE, atomic per call.
    pub async fn upsert(
        &self,
        id: &str,
        metadata: &PaperMetadata,
        embedding: Option<&[f32]>,
        quality_score: Option<i32>,
        filename: &str,
    ) -> Result<()> {
        let authors = serde_json::to_string(&metadata.authors)?;
        let contributions = serde_json::to_string(&metadata.contributions)?;
        let keywords = serde_json::to_string(&metadata.keywords)?;
        let tags = serde_json::to_string(&metadata.tags)?;
        let base_models = serde_json::to_string(&metadata.base_models)?;
        let embedding_blob = embedding.map(pack_embedding);
        let created_at = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO papers (
                id, title, title_zh, authors, abstract_text, domain, research_problem,
                methodology, contributions, keywords, tags, base_models, year, venue,
                embedding, quality_score, filename, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                title_zh = excluded.title_zh,
                authors = excluded.authors,
                abstract_text = excluded.abstract_text,
                domain = excluded.domain,
                research_problem = excluded.research_problem,
                methodology = excluded.methodology,
                contributions = excluded.contributions,
                keywords = excluded.keywords,
                tags = excluded.tags,
                base_models = excluded.base_models,
                year = excluded.year,
                venue = excluded.venue,
                embedding = excluded.embedding,
                quality_score = excluded.quality_score,
                filename = excluded.filename
            "#,
        )
        .bind(id)
        .bind(&metadata.title)
        .bind(&metadata.title_zh)
        .bind(&authors)
        .bind(&metadata.abstract_text)
        .bind(&metadata.domain)
        .bind(&metadata.research_problem)
        .bind(&metadata.methodology)
        .bind(&contributions)
        .bind(&keywords)
        .bind(&tags)
        .bind(&base_models)
        .bind(metadata.year)
        .bind(&metadata.venue)
        .bind(embedding_blob)
        .bind(quality_score)
        .bind(filename)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<PaperRecord>> {
        let row = sqlx::query("SELECT * FROM papers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(row_to_record).transpose()
    }

    /// Full-text search via FTS5 `MATCH`.
    pub async fn search_fulltext(&self, query: &str) -> Result<Vec<PaperRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT papers.* FROM papers
            JOIN papers_fts ON papers.rowid = papers_fts.rowid
            WHERE papers_fts MATCH ?
            "#,
        )
        .bind(query)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(row_to_record).collect()
    }

    pub async fn search_domain(&self, domain: &str) -> Result<Vec<PaperRecord>> {
        let pattern = format!("%{domain}%");
        let rows = sqlx::query("SELECT * FROM papers WHERE domain LIKE ?")
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.into_iter().map(row_to_record).collect()
    }

    pub async fn search_keyword(&self, keyword: &str) -> Result<Vec<PaperRecord>> {
        let pattern = format!("%{keyword}%");
        let rows = sqlx::query("SELECT * FROM papers WHERE keywords LIKE ?")
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.into_iter().map(row_to_record).collect()
    }
}

/// Embeddings are packed as contiguous little-endian float32 bytes.
fn pack_embedding(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn unpack_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<PaperRecord> {
    let authors: String = row.try_get("authors").map_err(store_err)?;
    let contributions: String = row.try_get("contributions").map_err(store_err)?;
    let keywords: String = row.try_get("keywords").map_err(store_err)?;
    let tags: String = row.try_get("tags").map_err(store_err)?;
    let base_models: String = row.try_get("base_models").map_err(store_err)?;
    let embedding: Option<Vec<u8>> = row.try_get("embedding").map_err(store_err)?;

    let metadata = PaperMetadata {
        title: row.try_get("title").map_err(store_err)?,
        title_zh: row.try_get("title_zh").map_err(store_err)?,
        authors: serde_json::from_str(&authors)?,
        abstract_text: row.try_get("abstract_text").map_err(store_err)?,
        domain: row.try_get("domain").map_err(store_err)?,
        research_problem: row.try_get("research_problem").map_err(store_err)?,
        methodology: row.try_get("methodology").map_err(store_err)?,
        contributions: serde_json::from_str(&contributions)?,
        keywords: serde_json::from_str(&keywords)?,
        tags: serde_json::from_str(&tags)?,
        base_models: serde_json::from_str(&base_models)?,
        year: row.try_get("year").map_err(store_err)?,
        venue: row.try_get("venue").map_err(store_err)?,
    };

    Ok(PaperRecord {
        id: row.try_get("id").map_err(store_err)?,
        metadata,
        embedding: embedding.map(|b| unpack_embedding(&b)),
        quality_score: row.try_get("quality_score").map_err(store_err)?,
        filename: row.try_get("filename").map_err(store_err)?,
        created_at: row.try_get("created_at").map_err(store_err)?,
    })
}
