//! Core DocStore implementation

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use eyre::{Context, Result, eyre};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

/// Lifecycle status of a stored section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionStatus {
    Pending,
    Completed,
    NeedsReview,
}

impl SectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionStatus::Pending => "pending",
            SectionStatus::Completed => "completed",
            SectionStatus::NeedsReview => "needs_review",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => SectionStatus::Completed,
            "needs_review" => SectionStatus::NeedsReview,
            _ => SectionStatus::Pending,
        }
    }
}

/// A stored document
#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub id: String,
    pub user_query: String,
    pub template_type: String,
    pub content_generated: bool,
    pub created_at: i64,
}

/// A stored section
#[derive(Debug, Clone)]
pub struct SectionRow {
    pub id: String,
    pub document_id: String,
    pub section_name: String,
    pub content: String,
    pub feedback: String,
    pub status: SectionStatus,
    pub position: i64,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id                TEXT PRIMARY KEY,
    user_query        TEXT NOT NULL,
    template_type     TEXT NOT NULL,
    content_generated INTEGER NOT NULL DEFAULT 0,
    created_at        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sections (
    id           TEXT PRIMARY KEY,
    document_id  TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    section_name TEXT NOT NULL,
    content      TEXT NOT NULL DEFAULT '',
    feedback     TEXT NOT NULL DEFAULT '',
    status       TEXT NOT NULL DEFAULT 'pending',
    position     INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_sections_document ON sections(document_id, position);
";

/// SQLite-backed store for documents and sections
pub struct DocStore {
    conn: Mutex<Connection>,
}

impl DocStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create store directory")?;
        }

        let conn = Connection::open(path).context("Failed to open store database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA).context("Failed to apply store schema")?;

        debug!(path = %path.display(), "Opened doc store");
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| eyre!("Store connection lock poisoned"))
    }

    /// Create a document record; a second create for the same id is a no-op
    pub fn create_document(&self, id: &str, user_query: &str, template_type: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO documents (id, user_query, template_type, content_generated, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![id, user_query, template_type, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    /// Fetch a document by id
    pub fn document(&self, id: &str) -> Result<Option<DocumentRow>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, user_query, template_type, content_generated, created_at
                 FROM documents WHERE id = ?1",
                params![id],
                |row| {
                    Ok(DocumentRow {
                        id: row.get(0)?,
                        user_query: row.get(1)?,
                        template_type: row.get(2)?,
                        content_generated: row.get::<_, i64>(3)? != 0,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Save a generated section; saving an existing id updates its content and position
    pub fn save_section(
        &self,
        document_id: &str,
        section_id: &str,
        section_name: &str,
        content: &str,
        position: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sections (id, document_id, section_name, content, status, position)
             VALUES (?1, ?2, ?3, ?4, 'completed', ?5)
             ON CONFLICT(id) DO UPDATE SET content = excluded.content, position = excluded.position",
            params![section_id, document_id, section_name, content, position],
        )?;
        Ok(())
    }

    /// Record human feedback for a section
    ///
    /// Regenerate feedback moves the section back to pending; any other
    /// feedback marks it completed. Edited content replaces the stored
    /// content. Returns the number of rows touched (0 when the section has
    /// not been persisted yet).
    pub fn update_section_feedback(
        &self,
        section_id: &str,
        feedback_type: &str,
        edited_content: Option<&str>,
    ) -> Result<usize> {
        let status = if feedback_type == "regenerate" {
            SectionStatus::Pending
        } else {
            SectionStatus::Completed
        };

        let conn = self.conn()?;
        let touched = if let Some(content) = edited_content {
            conn.execute(
                "UPDATE sections SET content = ?1, feedback = ?2, status = ?3 WHERE id = ?4",
                params![content, feedback_type, status.as_str(), section_id],
            )?
        } else {
            conn.execute(
                "UPDATE sections SET feedback = ?1, status = ?2 WHERE id = ?3",
                params![feedback_type, status.as_str(), section_id],
            )?
        };
        Ok(touched)
    }

    /// Mark a document as fully generated
    pub fn mark_content_generated(&self, document_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE documents SET content_generated = 1 WHERE id = ?1",
            params![document_id],
        )?;
        info!(document_id, "Marked document content generated");
        Ok(())
    }

    /// Check whether a document has already been fully generated
    ///
    /// Unknown documents report false rather than erroring.
    pub fn content_generated(&self, document_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let flag: Option<i64> = conn
            .query_row(
                "SELECT content_generated FROM documents WHERE id = ?1",
                params![document_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(flag.unwrap_or(0) != 0)
    }

    /// List a document's sections in their original order
    pub fn sections_for(&self, document_id: &str) -> Result<Vec<SectionRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, document_id, section_name, content, feedback, status, position
             FROM sections WHERE document_id = ?1 ORDER BY position ASC",
        )?;

        let rows = stmt
            .query_map(params![document_id], |row| {
                Ok(SectionRow {
                    id: row.get(0)?,
                    document_id: row.get(1)?,
                    section_name: row.get(2)?,
                    content: row.get(3)?,
                    feedback: row.get(4)?,
                    status: SectionStatus::parse(&row.get::<_, String>(5)?),
                    position: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Delete a document and its sections
    pub fn delete_document(&self, document_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sections WHERE document_id = ?1", params![document_id])?;
        conn.execute("DELETE FROM documents WHERE id = ?1", params![document_id])?;
        info!(document_id, "Deleted document");
        Ok(())
    }
}
