use super::{Db, models::Chunk, serialize_vector};
use rusqlite::{OptionalExtension, Result, params};

impl Db {
    pub fn document_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn chunk_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Deletes a source file and all of its chunks
    pub fn delete_document(&self, filename: &str) -> Result<bool> {
        let doc_id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM documents WHERE filename = ?",
                params![filename],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(doc_id) = doc_id {
            // vec0 tables do not take part in foreign key cascades
            self.conn.execute(
                "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks WHERE document_id = ?)",
                params![doc_id],
            )?;

            let rows = self
                .conn
                .execute("DELETE FROM documents WHERE id = ?", params![doc_id])?;
            Ok(rows > 0)
        } else {
            Ok(false)
        }
    }

    /// Upserts the source file row and appends the chunks with their
    /// vectors, numbering positions after any chunks already stored.
    pub fn insert_chunks(
        &mut self,
        filename: &str,
        modified_at: f64,
        chunks: &[Chunk<'_>],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(rusqlite::Error::ToSqlConversionFailure(
                format!(
                    "{} chunks but {} embeddings for {filename}",
                    chunks.len(),
                    embeddings.len()
                )
                .into(),
            ));
        }

        let tx = self.conn.transaction()?;

        let doc_id: i64 = tx.query_row(
            r#"
            INSERT INTO documents (filename, modified_at, indexed_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(filename) DO UPDATE SET
                modified_at = excluded.modified_at,
                indexed_at = CURRENT_TIMESTAMP
            RETURNING id
            "#,
            params![filename, modified_at],
            |row| row.get(0),
        )?;

        let base: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM chunks WHERE document_id = ?",
            params![doc_id],
            |row| row.get(0),
        )?;

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            tx.execute(
                "INSERT INTO chunks (document_id, position, section, content) VALUES (?, ?, ?, ?)",
                params![
                    doc_id,
                    base + chunk.position as i64,
                    chunk.section,
                    chunk.content
                ],
            )?;
            let chunk_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)",
                params![chunk_id, serialize_vector(embedding)],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modified_at(db: &Db, filename: &str) -> f64 {
        db.conn
            .query_row(
                "SELECT modified_at FROM documents WHERE filename = ?",
                params![filename],
                |row| row.get(0),
            )
            .unwrap()
    }

    fn count(db: &Db, table: &str) -> i64 {
        db.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_documents_crud() {
        let mut db = Db::open_in_memory(4).unwrap();
        let filename = "/docs/paper.pdf";

        let chunks = vec![
            Chunk {
                position: 0,
                section: Some("page 1"),
                content: "Hello",
            },
            Chunk {
                position: 1,
                section: Some("page 1"),
                content: "World",
            },
        ];
        let embeddings = vec![vec![0.1; 4], vec![0.2; 4]];
        db.insert_chunks(filename, 100.0, &chunks, &embeddings)
            .unwrap();

        assert_eq!(db.document_count().unwrap(), 1);
        assert_eq!(modified_at(&db, filename), 100.0);
        assert_eq!(count(&db, "chunks"), 2);
        assert_eq!(count(&db, "vec_chunks"), 2);

        // A second page appends rather than replacing
        let page2 = vec![Chunk {
            position: 0,
            section: Some("page 2"),
            content: "Again",
        }];
        db.insert_chunks(filename, 150.0, &page2, &[vec![0.3; 4]])
            .unwrap();
        assert_eq!(db.document_count().unwrap(), 1);
        assert_eq!(db.chunk_count().unwrap(), 3);
        assert_eq!(modified_at(&db, filename), 150.0);

        let max_pos: i64 = db
            .conn
            .query_row("SELECT MAX(position) FROM chunks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(max_pos, 2);

        assert!(db.delete_document(filename).unwrap());
        assert_eq!(count(&db, "chunks"), 0);
        assert_eq!(count(&db, "vec_chunks"), 0);
        assert!(!db.delete_document(filename).unwrap());
    }

    #[test]
    fn test_insert_chunks_length_mismatch_is_error() {
        let mut db = Db::open_in_memory(4).unwrap();
        let chunks = vec![Chunk {
            position: 0,
            section: None,
            content: "Lonely",
        }];
        let result = db.insert_chunks("/docs/a.txt", 1.0, &chunks, &[]);
        assert!(result.is_err());
        assert_eq!(db.document_count().unwrap(), 0);
        assert_eq!(count(&db, "chunks"), 0);
    }
}
