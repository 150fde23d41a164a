use anyhow::Result;
use rusqlite::Connection;

/// Thin wrapper around a SQLite connection.
///
/// Opens a file-backed database when a path is given, otherwise an
/// in-memory database (used by tests and one-off runs).
pub struct AsnscopeDatabase {
    pub conn: Connection,
}

impl AsnscopeDatabase {
    pub fn new(path: &Option<String>) -> Result<AsnscopeDatabase> {
        let conn = match path {
            Some(p) => Connection::open(p.as_str())?,
            None => Connection::open_in_memory()?,
        };
        Ok(AsnscopeDatabase { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = AsnscopeDatabase::new(&None).unwrap();
        let one: u32 = db.conn.query_row("select 1", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);
    }
}
