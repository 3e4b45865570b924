use rusqlite::{params, Result};

use super::models::ProcessLogRow;
use super::Database;

impl Database {
    /// Insert rows in one transaction, then drop everything but the newest `keep`.
    pub fn append_process_log(&self, rows: &[(String, String, String)], keep: usize) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO process_log (timestamp, level, message) VALUES (?1, ?2, ?3)",
            )?;
            for (timestamp, level, message) in rows {
                stmt.execute(params![timestamp, level, message])?;
            }
        }
        tx.execute(
            "DELETE FROM process_log WHERE seq NOT IN
                (SELECT seq FROM process_log ORDER BY seq DESC LIMIT ?1)",
            params![keep as i64],
        )?;
        tx.commit()
    }

    /// Newest `limit` rows, oldest first.
    pub fn recent_process_log(&self, limit: usize) -> Result<Vec<ProcessLogRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT seq, timestamp, level, message FROM process_log
             ORDER BY seq DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(ProcessLogRow {
                seq: row.get(0)?,
                timestamp: row.get(1)?,
                level: row.get(2)?,
                message: row.get(3)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        entries.reverse();
        Ok(entries)
    }

    pub fn clear_process_log(&self) -> Result<usize> {
        self.conn().execute("DELETE FROM process_log", [])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(message: &str) -> (String, String, String) {
        ("2024-01-02 03:04:05".to_string(), "info".to_string(), message.to_string())
    }

    #[test]
    fn test_append_keeps_newest() {
        let db = Database::open_in_memory().unwrap();
        db.append_process_log(&[row("a"), row("b"), row("c")], 2).unwrap();
        db.append_process_log(&[row("d")], 2).unwrap();

        let messages: Vec<String> = db
            .recent_process_log(10)
            .unwrap()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(messages, vec!["c", "d"]);
    }

    #[test]
    fn test_clear() {
        let db = Database::open_in_memory().unwrap();
        db.append_process_log(&[row("a")], 10).unwrap();
        assert_eq!(db.clear_process_log().unwrap(), 1);
        assert!(db.recent_process_log(10).unwrap().is_empty());
    }
}
