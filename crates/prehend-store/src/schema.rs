use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // In-memory and fresh databases legitimately fail this.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::debug!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS turns (
            id                 TEXT PRIMARY KEY,
            input              TEXT NOT NULL,
            timestamp          TEXT NOT NULL,
            path               TEXT NOT NULL,
            text               TEXT NOT NULL,
            confidence         REAL NOT NULL,
            nexus_count        INTEGER NOT NULL,
            kairos_detected    INTEGER NOT NULL DEFAULT 0,
            convergence_cycles INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS nexuses (
            turn_id      TEXT NOT NULL REFERENCES turns(id) ON DELETE CASCADE,
            atom         TEXT NOT NULL,
            participants TEXT NOT NULL,
            strength     REAL NOT NULL,
            agreement    REAL NOT NULL,
            readiness    REAL NOT NULL,
            felt_energy  REAL NOT NULL,
            passed       INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (turn_id, atom)
        );

        CREATE INDEX IF NOT EXISTS idx_turns_timestamp ON turns(timestamp);
        CREATE INDEX IF NOT EXISTS idx_turns_path ON turns(path);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}
