use crate::dashboard::{DashboardHandle, StateEvent};
use crate::expansion::DEFAULT_COLLAPSE_DELAY_SECS;

use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use tauri::{command, AppHandle, Manager, State};

/// Persisted user configuration with its documented defaults.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Collapse debounce in seconds. Stored raw; zero means "unset" and
    /// is normalized to the default at the point of use.
    pub hover_delay: f64,
    /// Whether the dashboard renders the calendar widget
    pub show_calendar: bool,
    /// Whether the app registers itself as a login item
    pub launch_at_login: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hover_delay: DEFAULT_COLLAPSE_DELAY_SECS,
            show_calendar: true,
            launch_at_login: false,
        }
    }
}

/// Helper to log SQL in debug mode
pub fn log_sql(sql: &str) {
    log::debug!("SQL: {}", sql);
}

fn db_path(app: &AppHandle) -> PathBuf {
    let dir = app.path().app_data_dir().unwrap_or_else(|_| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notchdash")
    });
    dir.join("notchdash.db")
}

/// Initialize the database file and schema.
pub fn init_db(app: &AppHandle) -> Result<(), String> {
    let path = db_path(app);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }

    let conn = Connection::open(&path).map_err(|e| e.to_string())?;
    create_tables(&conn).map_err(|e| e.to_string())
}

/// Create the schema on an open connection.
pub fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    // Rowid preserves insertion order; duplicates are allowed
    conn.execute(
        "CREATE TABLE IF NOT EXISTS file_tray (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Get a connection to the database
pub fn get_connection(app: &AppHandle) -> Result<Connection, String> {
    Connection::open(db_path(app)).map_err(|e| e.to_string())
}

fn read_setting(conn: &Connection, key: &str) -> Option<String> {
    let sql = "SELECT value FROM settings WHERE key = ?1";
    log_sql(sql);
    conn.query_row(sql, [key], |row| row.get(0)).ok()
}

/// Insert or replace one setting.
pub fn write_setting(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    let sql = "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)";
    log_sql(&format!("{} [{}, {}]", sql, key, value));
    conn.execute(sql, [key, value])?;
    Ok(())
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "true" | "1")
}

/// Read the full settings struct, falling back to defaults for missing
/// or unparseable values.
pub fn load_settings(conn: &Connection) -> Settings {
    let defaults = Settings::default();

    Settings {
        hover_delay: read_setting(conn, "hover_delay")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(defaults.hover_delay),
        show_calendar: read_setting(conn, "show_calendar")
            .map(|v| parse_bool(&v))
            .unwrap_or(defaults.show_calendar),
        launch_at_login: read_setting(conn, "launch_at_login")
            .map(|v| parse_bool(&v))
            .unwrap_or(defaults.launch_at_login),
    }
}

/// Replace the persisted tray with the given paths, preserving order.
pub fn save_tray(conn: &Connection, paths: &[String]) -> rusqlite::Result<()> {
    conn.execute_batch("BEGIN TRANSACTION;")?;

    // Clear existing (simpler than syncing)
    conn.execute("DELETE FROM file_tray", [])?;

    for path in paths {
        let sql = "INSERT INTO file_tray (path) VALUES (?1)";
        log_sql(&format!("{} [{}]", sql, path));
        conn.execute(sql, [path])?;
    }

    conn.execute_batch("COMMIT;")?;
    Ok(())
}

/// Load the persisted tray in insertion order.
pub fn load_tray(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let sql = "SELECT path FROM file_tray ORDER BY id";
    log_sql(sql);

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut paths = Vec::new();
    for row in rows {
        paths.push(row?);
    }
    Ok(paths)
}

#[command]
pub fn get_settings(app: AppHandle) -> Result<Settings, String> {
    let conn = get_connection(&app)?;
    Ok(load_settings(&conn))
}

/// Upsert one setting. A changed hover delay is forwarded to the running
/// dashboard so the next collapse uses it.
#[command]
pub fn update_setting(
    app: AppHandle,
    dashboard: State<DashboardHandle>,
    key: String,
    value: String,
) -> Result<(), String> {
    let conn = get_connection(&app)?;
    write_setting(&conn, &key, &value).map_err(|e| e.to_string())?;

    if key == "hover_delay" {
        let delay = value.parse::<f64>().map_err(|e| e.to_string())?;
        dashboard.send(StateEvent::SetHoverDelay(delay));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().expect("temp dir");
        let conn = Connection::open(dir.path().join("test.db")).expect("open db");
        create_tables(&conn).expect("schema");
        (dir, conn)
    }

    #[test]
    fn missing_keys_yield_defaults() {
        let (_dir, conn) = test_conn();
        assert_eq!(load_settings(&conn), Settings::default());
    }

    #[test]
    fn settings_round_trip() {
        let (_dir, conn) = test_conn();
        write_setting(&conn, "hover_delay", "3.5").unwrap();
        write_setting(&conn, "show_calendar", "false").unwrap();
        write_setting(&conn, "launch_at_login", "true").unwrap();

        let settings = load_settings(&conn);
        assert_eq!(settings.hover_delay, 3.5);
        assert!(!settings.show_calendar);
        assert!(settings.launch_at_login);
    }

    #[test]
    fn unparseable_values_fall_back() {
        let (_dir, conn) = test_conn();
        write_setting(&conn, "hover_delay", "soon").unwrap();
        assert_eq!(
            load_settings(&conn).hover_delay,
            DEFAULT_COLLAPSE_DELAY_SECS
        );
    }

    #[test]
    fn zero_hover_delay_is_stored_raw() {
        // Normalization to the default happens at the point of use, not
        // in the store.
        let (_dir, conn) = test_conn();
        write_setting(&conn, "hover_delay", "0").unwrap();
        assert_eq!(load_settings(&conn).hover_delay, 0.0);
    }

    #[test]
    fn tray_preserves_order_and_duplicates() {
        let (_dir, conn) = test_conn();
        let paths = vec![
            "/tmp/a".to_string(),
            "/tmp/b".to_string(),
            "/tmp/a".to_string(),
        ];
        save_tray(&conn, &paths).unwrap();
        assert_eq!(load_tray(&conn).unwrap(), paths);

        // A later save replaces the previous contents
        save_tray(&conn, &["/tmp/c".to_string()]).unwrap();
        assert_eq!(load_tray(&conn).unwrap(), vec!["/tmp/c".to_string()]);
    }
}
