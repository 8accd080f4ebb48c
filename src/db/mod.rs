mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::models::*;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(SystemClock),
        })
    }

    /// Open `aklow.db` in `data_dir`, or in the platform data directory.
    pub fn open_default(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => directories::ProjectDirs::from("io", "aklow", "aklow-gateway")
                .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
                .data_dir()
                .to_path_buf(),
        };
        Self::open(data_dir.join("aklow.db"))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(SystemClock),
        })
    }

    /// Stamp rows with `clock` instead of wall-clock time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Autopilot preferences
    // ============================================================

    /// Levels for every action; unset actions report the default level.
    pub fn get_autopilot_settings(&self, tenant_id: &str, user_id: &str) -> Result<AutopilotSettings> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT action, level FROM autopilot_levels
             WHERE tenant_id = ? AND user_id = ?",
        )?;

        let stored = stmt
            .query_map((tenant_id, user_id), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut settings = AutopilotSettings::default();
        for (action, level) in stored {
            // Rows for retired actions or levels are ignored
            if let (Some(action), Some(level)) =
                (AutopilotAction::from_str(&action), AutopilotLevel::from_str(&level))
            {
                settings.levels.insert(action, level);
            }
        }
        Ok(settings)
    }

    pub fn set_autopilot_level(
        &self,
        tenant_id: &str,
        user_id: &str,
        input: SetAutopilotLevelInput,
    ) -> Result<AutopilotSettings> {
        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "INSERT INTO autopilot_levels (tenant_id, user_id, action, level, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (tenant_id, user_id, action)
                 DO UPDATE SET level = excluded.level, updated_at = excluded.updated_at",
                (
                    tenant_id,
                    user_id,
                    input.action.as_str(),
                    input.level.as_str(),
                    self.clock.now().to_rfc3339(),
                ),
            )?;
        }
        self.get_autopilot_settings(tenant_id, user_id)
    }

    // ============================================================
    // Recent commands
    // ============================================================

    /// Most recent first.
    pub fn get_recent_commands(&self, tenant_id: &str, user_id: &str) -> Result<Vec<RecentCommand>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT command, used_at FROM recent_commands
             WHERE tenant_id = ? AND user_id = ?
             ORDER BY rowid DESC",
        )?;

        let commands = stmt
            .query_map((tenant_id, user_id), |row| {
                Ok(RecentCommand {
                    command: row.get(0)?,
                    used_at: parse_datetime(row.get::<_, String>(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(commands)
    }

    /// Record a command use. Repeats move to the front; the list is capped
    /// at [`RECENT_COMMANDS_LIMIT`].
    pub fn push_recent_command(
        &self,
        tenant_id: &str,
        user_id: &str,
        command: &str,
    ) -> Result<Vec<RecentCommand>> {
        let command = command.trim();
        if command.is_empty() {
            anyhow::bail!("Command must not be empty");
        }

        {
            let conn = self.conn.lock().expect("database lock poisoned");
            // REPLACE deletes the old row, so a repeat gets the newest rowid
            conn.execute(
                "INSERT OR REPLACE INTO recent_commands (tenant_id, user_id, command, used_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (tenant_id, user_id, command, self.clock.now().to_rfc3339()),
            )?;
            conn.execute(
                "DELETE FROM recent_commands
                 WHERE tenant_id = ?1 AND user_id = ?2 AND rowid NOT IN (
                     SELECT rowid FROM recent_commands
                     WHERE tenant_id = ?1 AND user_id = ?2
                     ORDER BY rowid DESC LIMIT ?3
                 )",
                (tenant_id, user_id, RECENT_COMMANDS_LIMIT as i64),
            )?;
        }

        self.get_recent_commands(tenant_id, user_id)
    }

    // ============================================================
    // Integration connections
    // ============================================================

    pub fn get_connections(&self, tenant_id: &str) -> Result<Vec<IntegrationConnection>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, provider, created_at FROM integration_connections
             WHERE tenant_id = ? ORDER BY provider",
        )?;

        let connections = stmt
            .query_map([tenant_id], row_to_connection)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(connections)
    }

    /// Connect `provider` for the tenant. Connecting again returns the
    /// existing connection.
    pub fn create_connection(&self, tenant_id: &str, provider: &str) -> Result<IntegrationConnection> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO integration_connections (id, tenant_id, provider, created_at)
             VALUES (?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                tenant_id,
                provider,
                self.clock.now().to_rfc3339(),
            ),
        )?;

        let connection = conn.query_row(
            "SELECT id, tenant_id, provider, created_at FROM integration_connections
             WHERE tenant_id = ? AND provider = ?",
            (tenant_id, provider),
            row_to_connection,
        )?;
        Ok(connection)
    }

    pub fn delete_connection(&self, tenant_id: &str, provider: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM integration_connections WHERE tenant_id = ? AND provider = ?",
            (tenant_id, provider),
        )?;
        Ok(rows > 0)
    }
}

fn row_to_connection(row: &rusqlite::Row<'_>) -> rusqlite::Result<IntegrationConnection> {
    Ok(IntegrationConnection {
        id: parse_uuid(row.get::<_, String>(0)?),
        tenant_id: row.get(1)?,
        provider: row.get(2)?,
        created_at: parse_datetime(row.get::<_, String>(3)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
