//! The CRUD facade over one SQLite connection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::{params_from_iter, Connection, OpenFlags, ToSql};

use crate::condition::Where;
use crate::config::{SqliteConfig, IN_MEMORY};
use crate::dump;
use crate::error::{Error, Result, StatementContext};
use crate::ident::{self, validate_identifier};
use crate::query::SqlQuery;
use crate::schema::{create_table_statement, ColumnDefinition, Schema};
use crate::value::{format_value, Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Direction::Asc),
            "DESC" => Ok(Direction::Desc),
            _ => Err(Error::invalid(format!(
                "ORDER BY direction must be ASC or DESC, got '{s}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Option<Direction>,
}

impl OrderBy {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: None,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Some(Direction::Asc),
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Some(Direction::Desc),
        }
    }

    /// Builds an ordering from a column and a direction token, which must be
    /// `ASC` or `DESC`.
    pub fn parse(column: impl Into<String>, direction: &str) -> Result<Self> {
        Ok(Self {
            column: column.into(),
            direction: Some(direction.parse()?),
        })
    }

    pub fn to_sql(&self) -> String {
        match self.direction {
            Some(d) => format!("ORDER BY {} {}", self.column, d.as_sql()),
            None => format!("ORDER BY {}", self.column),
        }
    }
}

/// Options for [`Database::select`]. The default selects every column of
/// every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectOptions {
    pub filter: Option<Where>,
    /// Empty selects `*`.
    pub columns: Vec<String>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u32>,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: impl Into<Where>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    /// Caps the number of rows returned. `0` means no limit.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Result of a select, shaped by how many rows matched.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Empty,
    One(Row),
    Many(Vec<Row>),
}

impl Selection {
    pub fn from_rows(mut rows: Vec<Row>) -> Self {
        match rows.len() {
            0 => Selection::Empty,
            1 => Selection::One(rows.remove(0)),
            _ => Selection::Many(rows),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Empty)
    }

    pub fn len(&self) -> usize {
        match self {
            Selection::Empty => 0,
            Selection::One(_) => 1,
            Selection::Many(rows) => rows.len(),
        }
    }

    pub fn first(&self) -> Option<&Row> {
        match self {
            Selection::Empty => None,
            Selection::One(row) => Some(row),
            Selection::Many(rows) => rows.first(),
        }
    }

    /// Flattens any shape into a plain sequence of rows.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Selection::Empty => Vec::new(),
            Selection::One(row) => vec![row],
            Selection::Many(rows) => rows,
        }
    }
}

/// One `column = value` pair of an `UPDATE ... SET` list.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Value,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn to_sql(&self) -> String {
        format!("{} = ?", self.column)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.column, format_value(&self.value))
    }
}

/// Owns one SQLite connection and exposes table checks and CRUD over it.
///
/// The connection is closed by [`Database::close`] or when the value is
/// dropped. Share one `Database` by reference rather than opening the same
/// file twice; SQLite's own file locking is the only coordination between
/// independent connections.
pub struct Database {
    conn: Connection,
    path: String,
}

impl Database {
    /// Opens (or creates) the database at `path`; `:memory:` gives an
    /// ephemeral in-memory database.
    pub fn open(path: impl Into<String>) -> Result<Self> {
        Self::open_with_config(&SqliteConfig::new(path, Schema::new()))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open_with_config(&SqliteConfig::in_memory())
    }

    /// Opens the configured database and creates any missing schema tables.
    pub fn open_with_config(config: &SqliteConfig) -> Result<Self> {
        let mutex = if config.thread_safe {
            OpenFlags::SQLITE_OPEN_FULL_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_NO_MUTEX
        };
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | mutex;

        let conn = Connection::open_with_flags(&config.db_path, flags).map_err(|source| {
            Error::Connection {
                path: config.db_path.clone(),
                source,
            }
        })?;
        tracing::info!("connection established on: {}", config.db_path);

        let db = Self {
            conn,
            path: config.db_path.clone(),
        };
        db.apply_schema(&config.schema)?;
        Ok(db)
    }

    /// Wraps a connection the caller already opened.
    pub fn from_connection(conn: Connection) -> Self {
        let path = match conn.path() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => IN_MEMORY.to_string(),
        };
        Self { conn, path }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.conn
            .close()
            .map_err(|(_, source)| Error::Statement { op: "Close", source })?;
        tracing::info!("connection closed: {}", path);
        Ok(())
    }

    /// Creates every table of `schema` that does not exist yet.
    pub fn apply_schema(&self, schema: &Schema) -> Result<()> {
        for table in &schema.tables {
            if !self.has_table(&table.name)? {
                self.create_table(&table.name, &table.columns)?;
                tracing::info!("created table {} from schema", table.name);
            }
        }
        Ok(())
    }

    pub fn has_table(&self, table: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE)",
                [table],
                |row| row.get(0),
            )
            .op("Has table")
    }

    /// Exact (case-insensitive) match against the table's declared columns.
    pub fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2 COLLATE NOCASE)",
                [table, column],
                |row| row.get(0),
            )
            .op("Has column")
    }

    /// Creates `table`, failing with [`Error::AlreadyExists`] when it is
    /// already there. Returns whether the table exists afterwards.
    pub fn create_table(&self, table: &str, columns: &[ColumnDefinition]) -> Result<bool> {
        let sql = create_table_statement(table, columns)?;
        if self.has_table(table)? {
            return Err(Error::AlreadyExists(table.to_string()));
        }

        tracing::debug!("create table: {}", sql);
        self.conn.execute(&sql, []).op("Create table")?;
        self.has_table(table)
    }

    /// Returns `false` without touching anything when the table is missing,
    /// otherwise whether it is gone after the drop.
    pub fn drop_table(&self, table: &str) -> Result<bool> {
        validate_identifier(table)?;
        if !self.has_table(table)? {
            return Ok(false);
        }

        let sql = format!("DROP TABLE {table}");
        tracing::debug!("drop table: {}", sql);
        self.conn.execute(&sql, []).op("Drop table")?;
        Ok(!self.has_table(table)?)
    }

    /// Inserts one row, binding `values` positionally. Columns must be named
    /// when the table has defaults the row relies on.
    ///
    /// Returns whether the connection's change counter moved, i.e. whether a
    /// row was actually written.
    pub fn insert(&self, table: &str, values: &[Value], columns: Option<&[&str]>) -> Result<bool> {
        validate_identifier(table)?;
        if values.is_empty() {
            return Err(Error::invalid("insert needs at least one value"));
        }
        let marks = vec!["?"; values.len()].join(",");
        let sql = match columns {
            Some(columns) => {
                ident::validate_all(columns.iter().copied())?;
                if columns.len() != values.len() {
                    return Err(Error::invalid(format!(
                        "{} columns given for {} values",
                        columns.len(),
                        values.len()
                    )));
                }
                format!("INSERT INTO {table} ({}) VALUES ({marks})", columns.join(","))
            }
            None => format!("INSERT INTO {table} VALUES ({marks})"),
        };

        let before = self.total_changes("Insert")?;
        tracing::debug!("insert: {}", sql);
        self.conn
            .execute(&sql, params_from_iter(values.iter()))
            .op("Insert")?;
        Ok(self.total_changes("Insert")? > before)
    }

    pub fn select(&self, table: &str, options: &SelectOptions) -> Result<Selection> {
        validate_identifier(table)?;
        ident::validate_all(options.columns.iter().map(String::as_str))?;

        let columns = if options.columns.is_empty() {
            "*".to_string()
        } else {
            options.columns.join(",")
        };
        let mut sql = format!("SELECT {columns} FROM {table}");
        let mut params = Vec::new();
        if let Some(filter) = &options.filter {
            filter.validate()?;
            sql.push(' ');
            sql.push_str(&filter.sql());
            params = filter.params();
        }
        if let Some(order_by) = &options.order_by {
            validate_identifier(&order_by.column)?;
            sql.push(' ');
            sql.push_str(&order_by.to_sql());
        }
        if let Some(limit) = options.limit.filter(|&n| n > 0) {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        tracing::debug!("select: {}", sql);
        let rows = self.query_rows("Select", &sql, params_from_iter(params.iter()))?;
        Ok(Selection::from_rows(rows))
    }

    /// Updates the rows matching `filter`.
    ///
    /// Returns `false` when nothing matched; otherwise compares a snapshot of
    /// the matching rows taken before and after the statement and reports
    /// whether it changed. `order_by` and `limit` narrow the affected rows;
    /// a `limit` of `0` means no limit.
    pub fn update(
        &self,
        table: &str,
        assignments: &[Assignment],
        filter: &Where,
        order_by: Option<&OrderBy>,
        limit: Option<u32>,
    ) -> Result<bool> {
        validate_identifier(table)?;
        filter.validate()?;
        if assignments.is_empty() {
            return Err(Error::invalid("update needs at least one assignment"));
        }
        ident::validate_all(assignments.iter().map(|a| a.column.as_str()))?;

        let snapshot = SelectOptions::new().filter(filter.clone());
        let before = self.select(table, &snapshot)?;
        if before.is_empty() {
            return Ok(false);
        }

        let set: Vec<String> = assignments.iter().map(Assignment::to_sql).collect();
        let mut sql = format!("UPDATE {table} SET {}", set.join(","));
        // A zero limit means no limit, as in select.
        let limit = limit.filter(|&n| n > 0);
        if order_by.is_none() && limit.is_none() {
            sql.push(' ');
            sql.push_str(&filter.sql());
        } else {
            let mut inner = format!("SELECT rowid FROM {table} {}", filter.sql());
            if let Some(order_by) = order_by {
                validate_identifier(&order_by.column)?;
                inner.push(' ');
                inner.push_str(&order_by.to_sql());
            }
            if let Some(limit) = limit {
                inner.push_str(&format!(" LIMIT {limit}"));
            }
            sql.push_str(&format!(" WHERE rowid IN ({inner})"));
        }

        let params: Vec<Value> = assignments
            .iter()
            .map(|a| a.value.clone())
            .chain(filter.params())
            .collect();
        tracing::debug!("update: {}", sql);
        self.conn
            .execute(&sql, params_from_iter(params.iter()))
            .op("Update")?;

        let after = self.select(table, &snapshot)?;
        Ok(before != after)
    }

    /// Deletes the rows matching `filter` and returns whether a lookup with
    /// the same filter now comes back empty.
    pub fn delete(&self, table: &str, filter: &Where) -> Result<bool> {
        validate_identifier(table)?;
        filter.validate()?;

        let sql = format!("DELETE FROM {table} {}", filter.sql());
        tracing::debug!("delete: {}", sql);
        self.conn
            .execute(&sql, params_from_iter(filter.params().iter()))
            .op("Delete")?;

        let remaining = self.select(table, &SelectOptions::new().filter(filter.clone()).limit(1))?;
        Ok(remaining.is_empty())
    }

    /// User tables in catalog order.
    pub fn get_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND substr(name, 1, 7) <> 'sqlite_' ORDER BY rowid",
            )
            .op("Get tables")?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .op("Get tables")?
            .collect::<rusqlite::Result<Vec<String>>>()
            .op("Get tables")?;
        Ok(names)
    }

    /// Column names in declaration order, read from a probe select.
    pub fn get_columns(&self, table: &str) -> Result<Vec<String>> {
        validate_identifier(table)?;
        let stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {table} LIMIT 1"))
            .op("Get columns")?;
        Ok(stmt.column_names().into_iter().map(String::from).collect())
    }

    /// Executes a raw statement and returns the number of rows it changed.
    pub fn run(&self, query: &SqlQuery) -> Result<usize> {
        let named = named_params(query);
        tracing::debug!("run: {}", query.statement);
        let mut stmt = self.conn.prepare(&query.statement).op("Run")?;
        stmt.execute(named.as_slice()).op("Run")
    }

    /// Executes a raw query and collects every row.
    pub fn query(&self, query: &SqlQuery) -> Result<Vec<Row>> {
        let named = named_params(query);
        tracing::debug!("query: {}", query.statement);
        self.query_rows("Run", &query.statement, named.as_slice())
    }

    /// Writes a SQL dump of the whole database into `dir` and returns the
    /// path of the new file.
    pub fn backup(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let target = dump::backup(&self.conn, &self.path, dir.as_ref())?;
        tracing::info!("backup saved in: {}", target.display());
        Ok(target)
    }

    /// Replays a dump script into this database.
    pub fn restore(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        dump::restore(&self.conn, path)?;
        tracing::info!("restoration completed from: {}", path.display());
        Ok(())
    }

    fn query_rows<P: rusqlite::Params>(&self, op: &'static str, sql: &str, params: P) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql).op(op)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(params, |row| Row::from_rusqlite(&columns, row))
            .op(op)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .op(op)?;
        Ok(rows)
    }

    fn total_changes(&self, op: &'static str) -> Result<i64> {
        self.conn
            .query_row("SELECT total_changes()", [], |row| row.get(0))
            .op(op)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

fn named_params(query: &SqlQuery) -> Vec<(&str, &dyn ToSql)> {
    query
        .params
        .values
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_accepts_only_asc_and_desc() {
        assert_eq!("asc".parse::<Direction>().unwrap(), Direction::Asc);
        assert_eq!("DESC".parse::<Direction>().unwrap(), Direction::Desc);
        let err = "SIDEWAYS".parse::<Direction>().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn order_by_rendering() {
        assert_eq!(OrderBy::new("name").to_sql(), "ORDER BY name");
        assert_eq!(OrderBy::desc("id").to_sql(), "ORDER BY id DESC");
        assert!(OrderBy::parse("id", "UP").is_err());
    }

    #[test]
    fn selection_shape_follows_row_count() {
        let row = |id| Row::new(vec!["id".into()], vec![Value::Integer(id)]);

        assert_eq!(Selection::from_rows(vec![]), Selection::Empty);
        assert_eq!(Selection::from_rows(vec![row(1)]), Selection::One(row(1)));
        let many = Selection::from_rows(vec![row(1), row(2)]);
        assert_eq!(many.len(), 2);
        assert_eq!(many.into_rows(), vec![row(1), row(2)]);
    }

    #[test]
    fn assignment_renders_placeholder_and_literal() {
        let a = Assignment::new("name", "Bob");
        assert_eq!(a.to_sql(), "name = ?");
        assert_eq!(a.to_string(), "name = 'Bob'");
    }
}
