//! SQLite persistence for scans and threats.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;

use sbomguard_core::model::{Component, ScoredThreat};
use sbomguard_core::scoring::extract_cvss;

/// Persistent storage for scan runs and their scored threats.
pub struct ThreatStore {
    conn: Connection,
}

/// A threat row as read back from the store.
#[derive(Debug, Clone)]
pub struct StoredThreat {
    pub id: i64,
    pub project: String,
    pub threat: ScoredThreat,
}

impl ThreatStore {
    /// Open or create the threat database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory for {}", db_path.display()))?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("opening threat database at {}", db_path.display()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS scans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project TEXT NOT NULL,
                sbom_path TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scan_id INTEGER NOT NULL REFERENCES scans(id),
                name TEXT NOT NULL,
                version TEXT,
                purl TEXT,
                supplier TEXT,
                hashes TEXT,
                properties TEXT
            );
            CREATE TABLE IF NOT EXISTS vulnerabilities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                component_id INTEGER NOT NULL REFERENCES components(id),
                cve TEXT,
                severity TEXT,
                cvss REAL,
                exploit_maturity TEXT,
                published TEXT,
                raw TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS threats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project TEXT NOT NULL,
                scan_id INTEGER NOT NULL REFERENCES scans(id),
                vulnerability_id INTEGER NOT NULL REFERENCES vulnerabilities(id),
                rule_id TEXT NOT NULL,
                score REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_threats_project ON threats(project);
            CREATE INDEX IF NOT EXISTS idx_threats_score ON threats(score);",
        )?;
        Ok(())
    }

    /// Record the start of a scan run.
    pub fn begin_scan(&self, project: &str, sbom_path: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO scans (project, sbom_path, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![project, sbom_path, Utc::now().to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_component(&self, scan_id: i64, component: &Component) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO components (scan_id, name, version, purl, supplier, hashes, properties)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                scan_id,
                component.name,
                component.version,
                component.purl,
                component.supplier,
                serde_json::to_string(&component.hashes)?,
                serde_json::to_string(&component.properties)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Persist one raw vulnerability record, denormalizing the common
    /// evidence columns for querying.
    pub fn insert_vulnerability(
        &self,
        component_id: i64,
        vuln: &serde_json::Value,
    ) -> Result<i64> {
        use sbomguard_core::assemble::extract_field;

        self.conn.execute(
            "INSERT INTO vulnerabilities
                (component_id, cve, severity, cvss, exploit_maturity, published, raw)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                component_id,
                extract_field(vuln, &["VulnerabilityID", "cve"]),
                extract_field(vuln, &["Severity", "severity"]),
                extract_cvss(vuln),
                extract_field(vuln, &["Exploitability", "exploit_maturity"]),
                extract_field(vuln, &["PublishedDate", "published"]),
                serde_json::to_string(vuln)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_threat(
        &self,
        scan_id: i64,
        vulnerability_id: i64,
        project: &str,
        threat: &ScoredThreat,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO threats
                (project, scan_id, vulnerability_id, rule_id, score, status, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                project,
                scan_id,
                vulnerability_id,
                threat.rule_id,
                threat.score,
                threat.status,
                serde_json::to_string(threat)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List stored threats, optionally filtered by project.
    pub fn list_threats(&self, project: Option<&str>) -> Result<Vec<StoredThreat>> {
        let mut rows = Vec::new();
        match project {
            Some(project) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, project, payload FROM threats WHERE project = ?1 ORDER BY id",
                )?;
                let mapped = stmt.query_map(rusqlite::params![project], row_to_parts)?;
                for row in mapped {
                    if let Some(stored) = into_stored(row?) {
                        rows.push(stored);
                    }
                }
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT id, project, payload FROM threats ORDER BY id")?;
                let mapped = stmt.query_map([], row_to_parts)?;
                for row in mapped {
                    if let Some(stored) = into_stored(row?) {
                        rows.push(stored);
                    }
                }
            }
        }
        Ok(rows)
    }

    /// Fetch a single threat by id.
    pub fn get_threat(&self, id: i64) -> Result<Option<StoredThreat>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, project, payload FROM threats WHERE id = ?1")?;
        let mut mapped = stmt.query_map(rusqlite::params![id], row_to_parts)?;
        match mapped.next() {
            Some(row) => Ok(into_stored(row?)),
            None => Ok(None),
        }
    }
}

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_stored((id, project, payload): (i64, String, String)) -> Option<StoredThreat> {
    let threat = serde_json::from_str(&payload).ok()?;
    Some(StoredThreat {
        id,
        project,
        threat,
    })
}
