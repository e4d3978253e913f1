use super::{Db, models::SearchResult, serialize_vector};
use rusqlite::{Result, params};

fn map_search_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchResult> {
    let distance: f64 = row.get(5)?;

    Ok(SearchResult {
        document_name: row.get(0)?,
        chunk_content: row.get(1)?,
        section: row.get(2)?,
        position: row.get::<_, i64>(3)? as usize,
        chunk_id: row.get(4)?,
        similarity: 1.0 - (distance / 2.0),
    })
}

impl Db {
    /// Vector similarity search using cosine distance, nearest first
    pub fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                d.filename,
                c.content,
                c.section,
                c.position,
                c.id as chunk_id,
                vec_distance_cosine(v.embedding, ?) as distance
            FROM vec_chunks v
            JOIN chunks c ON v.rowid = c.id
            JOIN documents d ON c.document_id = d.id
            ORDER BY distance ASC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(
            params![serialize_vector(query_vector), top_k as i64],
            map_search_row,
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Chunk;

    fn padded(head: &[f32]) -> Vec<f32> {
        let mut v = vec![0.0f32; 8];
        v[..head.len()].copy_from_slice(head);
        v
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let mut db = Db::open_in_memory(8).unwrap();

        let rust = padded(&[0.1, 0.2, 0.3]);
        let other = padded(&[0.9, -0.8, 0.1]);

        db.insert_chunks(
            "rust.txt",
            1.0,
            &[Chunk {
                position: 0,
                section: None,
                content: "Rust programming language",
            }],
            &[rust.clone()],
        )
        .unwrap();
        db.insert_chunks(
            "sheet.xlsx",
            1.0,
            &[Chunk {
                position: 0,
                section: Some("Budget"),
                content: "Quarterly numbers",
            }],
            &[other],
        )
        .unwrap();

        let results = db.search(&rust, 5).unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].document_name, "rust.txt");
        assert!(results[0].similarity > 0.99);
        assert!(results[0].section.is_none());

        assert_eq!(results[1].document_name, "sheet.xlsx");
        assert_eq!(results[1].section.as_deref(), Some("Budget"));
        assert!(results[1].similarity < results[0].similarity);
    }

    #[test]
    fn test_search_respects_top_k() {
        let mut db = Db::open_in_memory(8).unwrap();
        for i in 0..5 {
            db.insert_chunks(
                &format!("f{i}.txt"),
                1.0,
                &[Chunk {
                    position: 0,
                    section: None,
                    content: "text",
                }],
                &[padded(&[1.0, i as f32])],
            )
            .unwrap();
        }

        let results = db.search(&padded(&[1.0, 0.0]), 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document_name, "f0.txt");
    }

    #[test]
    fn test_search_empty_index() {
        let db = Db::open_in_memory(8).unwrap();
        assert!(db.search(&padded(&[1.0]), 3).unwrap().is_empty());
    }
}
