use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use uuid::Uuid;

use prehend_core::{Emission, EmissionPath, TurnReport};

use crate::error::{Result, StoreError};
use crate::schema;

/// One journaled turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnRecord {
    pub id: Uuid,
    pub input: String,
    pub timestamp: DateTime<Utc>,
    pub path: EmissionPath,
    pub text: String,
    pub confidence: f64,
    pub nexus_count: usize,
    pub kairos_detected: bool,
    pub convergence_cycles: u32,
}

/// A nexus formed during a journaled turn, with its cascade result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NexusRecord {
    pub atom: String,
    pub participants: BTreeSet<String>,
    pub strength: f64,
    pub agreement: f64,
    pub readiness: f64,
    pub felt_energy: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PathCounts {
    pub intersection: u64,
    pub fallback: u64,
    pub kairos: u64,
}

impl PathCounts {
    pub fn total(&self) -> u64 {
        self.intersection + self.fallback
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Write ---

    /// Journal one turn and every nexus it formed, in one transaction.
    pub fn record_turn(&self, input: &str, emission: &Emission, report: &TurnReport) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO turns (id, input, timestamp, path, text, confidence, nexus_count,
                                kairos_detected, convergence_cycles)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id.to_string(),
                input,
                format_timestamp(Utc::now()),
                emission.path.as_str(),
                emission.text,
                emission.confidence,
                emission.nexus_count as i64,
                emission.kairos_detected as i32,
                emission.convergence_cycles,
            ],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO nexuses (turn_id, atom, participants, strength, agreement,
                                      readiness, felt_energy, passed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for nexus in &report.nexuses {
                let passed = report
                    .verdicts
                    .iter()
                    .any(|v| v.atom == nexus.atom && v.passed());
                insert.execute(params![
                    id.to_string(),
                    nexus.atom,
                    serde_json::to_string(&nexus.participants)?,
                    nexus.intersection_strength,
                    nexus.agreement,
                    nexus.emission_readiness,
                    nexus.felt_energy,
                    passed as i32,
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!(turn = %id, nexuses = report.nexuses.len(), "turn journaled");
        Ok(id)
    }

    // --- Read ---

    /// Most recent turns first.
    pub fn recent_turns(&self, limit: usize) -> Result<Vec<TurnRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, input, timestamp, path, text, confidence, nexus_count,
                    kairos_detected, convergence_cycles
             FROM turns ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i32>(7)? != 0,
                    row.get::<_, u32>(8)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, input, timestamp, path, text, confidence, nexus_count, kairos, cycles)| {
                    Ok(TurnRecord {
                        id: parse_uuid(&id)?,
                        input,
                        timestamp: parse_timestamp(&timestamp)?,
                        path: path.parse().map_err(StoreError::InvalidData)?,
                        text,
                        confidence,
                        nexus_count: usize::try_from(nexus_count)
                            .map_err(|_| StoreError::InvalidData(format!("nexus_count {nexus_count}")))?,
                        kairos_detected: kairos,
                        convergence_cycles: cycles,
                    })
                },
            )
            .collect()
    }

    pub fn turn_nexuses(&self, turn_id: Uuid) -> Result<Vec<NexusRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT atom, participants, strength, agreement, readiness, felt_energy, passed
             FROM nexuses WHERE turn_id = ?1 ORDER BY rowid",
        )?;

        let rows = stmt
            .query_map([turn_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, i32>(6)? != 0,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(atom, participants, strength, agreement, readiness, felt_energy, passed)| {
                    Ok(NexusRecord {
                        atom,
                        participants: serde_json::from_str(&participants)?,
                        strength,
                        agreement,
                        readiness,
                        felt_energy,
                        passed,
                    })
                },
            )
            .collect()
    }

    pub fn path_counts(&self) -> Result<PathCounts> {
        let counts = self.conn.query_row(
            "SELECT
                COALESCE(SUM(path = 'intersection'), 0),
                COALESCE(SUM(path = 'fallback'), 0),
                COALESCE(SUM(kairos_detected), 0)
             FROM turns",
            [],
            |row| {
                Ok(PathCounts {
                    intersection: row.get::<_, i64>(0)? as u64,
                    fallback: row.get::<_, i64>(1)? as u64,
                    kairos: row.get::<_, i64>(2)? as u64,
                })
            },
        )?;
        Ok(counts)
    }
}

/// Second-precision RFC 3339 in UTC (`2026-10-16T12:30:05Z`), so the
/// `timestamp` column sorts lexically.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("invalid timestamp '{s}': {e}")))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidData(format!("invalid UUID '{s}': {e}")))
}
