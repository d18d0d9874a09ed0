//! Plain-text SQL dumps of a whole database, and replaying them.
//!
//! A dump is one statement per line: the schema of every user table followed
//! by its rows as `INSERT` statements, then indexes, triggers and views, all
//! inside a single transaction.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::config::IN_MEMORY;
use crate::error::{Error, Result, StatementContext};
use crate::value::{hex_literal, quote, Value};

const BACKUP_SUFFIX: &str = "_backup_dump.sql";

/// Produces the dump script for `conn`, one line per element.
pub fn dump(conn: &Connection) -> Result<Vec<String>> {
    let mut lines = vec!["BEGIN TRANSACTION;".to_string()];

    let tables = schema_entries(
        conn,
        "SELECT name, sql FROM sqlite_master \
         WHERE type = 'table' AND sql NOT NULL AND substr(name, 1, 7) <> 'sqlite_' \
         ORDER BY rowid",
    )?;
    for (name, sql) in &tables {
        lines.push(format!("{};", if_not_exists(sql)));
        dump_rows(conn, name, &mut lines)?;
    }

    let has_sequence: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence')",
            [],
            |row| row.get(0),
        )
        .op("Backup")?;
    if has_sequence {
        lines.push("DELETE FROM \"sqlite_sequence\";".to_string());
        dump_rows(conn, "sqlite_sequence", &mut lines)?;
    }

    let others = schema_entries(
        conn,
        "SELECT name, sql FROM sqlite_master \
         WHERE type IN ('index', 'trigger', 'view') AND sql NOT NULL \
         ORDER BY rowid",
    )?;
    for (_, sql) in &others {
        lines.push(format!("{};", if_not_exists(sql)));
    }

    lines.push("COMMIT;".to_string());
    Ok(lines)
}

/// Writes the dump of `conn` under `dir` and returns the file's path.
///
/// The file is named `<stem>.<unix-nanos>_backup_dump.sql`, `<stem>` being
/// the stem of `db_path` (`memory` for in-memory databases).
pub fn backup(conn: &Connection, db_path: &str, dir: &Path) -> Result<PathBuf> {
    let target = dir.join(backup_file_name(db_path));
    let lines = dump(conn)?;

    let io_err = |source: std::io::Error| Error::Io {
        path: target.clone(),
        source,
    };
    fs::create_dir_all(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(File::create(&target).map_err(io_err)?);
    for line in &lines {
        writeln!(out, "{line}").map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;

    Ok(target)
}

/// Replays a dump script into `conn`.
///
/// A script that fails part way is rolled back, leaving `conn` in autocommit
/// mode with none of the script's changes applied.
pub fn restore(conn: &Connection, path: &Path) -> Result<()> {
    let script = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if let Err(source) = conn.execute_batch(&script) {
        if !conn.is_autocommit() {
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::warn!("rollback after failed restore failed: {}", e);
            }
        }
        return Err(Error::Statement { op: "Restore", source });
    }
    Ok(())
}

pub fn backup_file_name(db_path: &str) -> String {
    let stem = if db_path == IN_MEMORY || db_path.is_empty() {
        "memory".to_string()
    } else {
        Path::new(db_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "memory".to_string())
    };
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{stem}.{nanos}{BACKUP_SUFFIX}")
}

fn schema_entries(conn: &Connection, sql: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(sql).op("Backup")?;
    let entries = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .op("Backup")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .op("Backup")?;
    Ok(entries)
}

fn dump_rows(conn: &Connection, table: &str, lines: &mut Vec<String>) -> Result<()> {
    let table = quote_identifier(table);
    let mut stmt = conn.prepare(&format!("SELECT * FROM {table}")).op("Backup")?;
    let width = stmt.column_count();
    let mut rows = stmt.query([]).op("Backup")?;
    while let Some(row) = rows.next().op("Backup")? {
        let literals = (0..width)
            .map(|i| row.get::<_, Value>(i).map(|v| dump_literal(&v)))
            .collect::<rusqlite::Result<Vec<_>>>()
            .op("Backup")?;
        lines.push(format!("INSERT INTO {table} VALUES({});", literals.join(",")));
    }
    Ok(())
}

/// Literal rendering that preserves the storage class on replay.
fn dump_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Boolean(b) => i64::from(*b).to_string(),
        Value::Real(v) if v.is_infinite() => {
            let literal = if v.is_sign_positive() { "9e999" } else { "-9e999" };
            literal.to_string()
        }
        Value::Real(v) if v.is_nan() => "NULL".to_string(),
        Value::Real(v) => format!("{v:?}"),
        Value::Text(s) => quote(s),
        Value::Blob(b) => hex_literal(b),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite stores schema text without `IF NOT EXISTS`; putting it back lets a
/// dump replay into a database that already has the schema.
fn if_not_exists(sql: &str) -> String {
    const PREFIXES: [&str; 5] = [
        "CREATE TABLE ",
        "CREATE UNIQUE INDEX ",
        "CREATE INDEX ",
        "CREATE TRIGGER ",
        "CREATE VIEW ",
    ];
    for prefix in PREFIXES {
        if let Some(rest) = sql.strip_prefix(prefix) {
            if rest.trim_start().to_ascii_uppercase().starts_with("IF NOT EXISTS") {
                return sql.to_string();
            }
            return format!("{prefix}IF NOT EXISTS {rest}");
        }
    }
    sql.to_string()
}
