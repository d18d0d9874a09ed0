//! Column declarations and `CREATE TABLE` rendering.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::value::{format_value, Value};

/// Schema definition for the SQLite database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn to_sql(&self) -> Result<String> {
        create_table_statement(&self.name, &self.columns)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Numeric,
    Text,
    Real,
    Blob,
    DateTime,
}

impl DataType {
    pub fn as_sql(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Numeric => "NUMERIC",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
            DataType::DateTime => "DATETIME",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnConstraint {
    PrimaryKey,
    NotNull,
    Unique,
}

impl ColumnConstraint {
    pub fn as_sql(self) -> &'static str {
        match self {
            ColumnConstraint::PrimaryKey => "PRIMARY KEY",
            ColumnConstraint::NotNull => "NOT NULL",
            ColumnConstraint::Unique => "UNIQUE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    Integer(i64),
    Text(String),
    Real(f64),
    Null,
    CurrentTimestamp,
}

impl DefaultValue {
    /// DDL cannot take bound parameters, so defaults are rendered as literals.
    pub fn to_sql(&self) -> String {
        match self {
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
            DefaultValue::Integer(v) => format_value(&Value::Integer(*v)),
            DefaultValue::Real(v) => format_value(&Value::Real(*v)),
            DefaultValue::Text(s) => format_value(&Value::Text(s.clone())),
            DefaultValue::Null => format_value(&Value::Null),
        }
    }
}

impl From<i64> for DefaultValue {
    fn from(v: i64) -> Self {
        DefaultValue::Integer(v)
    }
}

impl From<i32> for DefaultValue {
    fn from(v: i32) -> Self {
        DefaultValue::Integer(i64::from(v))
    }
}

impl From<f64> for DefaultValue {
    fn from(v: f64) -> Self {
        DefaultValue::Real(v)
    }
}

impl From<&str> for DefaultValue {
    fn from(v: &str) -> Self {
        DefaultValue::Text(v.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(v: String) -> Self {
        DefaultValue::Text(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub constraints: Vec<ColumnConstraint>,
    #[serde(default)]
    pub default_value: Option<DefaultValue>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
            default_value: None,
        }
    }

    pub fn primary_key(self) -> Self {
        self.with_constraint(ColumnConstraint::PrimaryKey)
    }

    pub fn not_null(self) -> Self {
        self.with_constraint(ColumnConstraint::NotNull)
    }

    pub fn unique(self) -> Self {
        self.with_constraint(ColumnConstraint::Unique)
    }

    pub fn default(mut self, value: impl Into<DefaultValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    pub fn has(&self, constraint: ColumnConstraint) -> bool {
        self.constraints.contains(&constraint)
    }

    /// `<name> <TYPE>[ DEFAULT <lit>][ PRIMARY KEY][ NOT NULL][ UNIQUE]`,
    /// always in that order regardless of how the constraints were added.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type);
        if let Some(default) = &self.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        for constraint in [
            ColumnConstraint::PrimaryKey,
            ColumnConstraint::NotNull,
            ColumnConstraint::Unique,
        ] {
            if self.has(constraint) {
                sql.push(' ');
                sql.push_str(constraint.as_sql());
            }
        }
        sql
    }
}

pub fn create_table_statement(table: &str, columns: &[ColumnDefinition]) -> Result<String> {
    ident::validate_identifier(table)?;
    if columns.is_empty() {
        return Err(Error::invalid(format!("table '{table}' needs at least one column")));
    }
    ident::validate_all(columns.iter().map(|c| c.name.as_str()))?;

    let columns: Vec<String> = columns.iter().map(ColumnDefinition::to_sql).collect();
    Ok(format!("CREATE TABLE IF NOT EXISTS {table} ({})", columns.join(",")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_renders_in_fixed_order() {
        let column = ColumnDefinition::new("id", DataType::Integer)
            .unique()
            .not_null()
            .primary_key()
            .default(7);
        assert_eq!(column.to_sql(), "id INTEGER DEFAULT 7 PRIMARY KEY NOT NULL UNIQUE");
    }

    #[test]
    fn text_default_is_quoted_and_timestamp_is_not() {
        let name = ColumnDefinition::new("name", DataType::Text).default("O'Neil");
        assert_eq!(name.to_sql(), "name TEXT DEFAULT 'O''Neil'");

        let created = ColumnDefinition::new("created", DataType::DateTime)
            .default(DefaultValue::CurrentTimestamp);
        assert_eq!(created.to_sql(), "created DATETIME DEFAULT CURRENT_TIMESTAMP");
    }

    #[test]
    fn bare_column() {
        assert_eq!(ColumnDefinition::new("score", DataType::Real).to_sql(), "score REAL");
    }

    #[test]
    fn create_table_statement_joins_columns() {
        let sql = create_table_statement(
            "person",
            &[
                ColumnDefinition::new("id", DataType::Integer).primary_key().not_null(),
                ColumnDefinition::new("name", DataType::Text),
            ],
        )
        .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS person (id INTEGER PRIMARY KEY NOT NULL,name TEXT)"
        );
    }

    #[test]
    fn create_table_statement_rejects_empty_columns() {
        let err = create_table_statement("person", &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn create_table_statement_rejects_bad_names() {
        let cols = [ColumnDefinition::new("id", DataType::Integer)];
        assert!(create_table_statement("person; DROP TABLE x", &cols).is_err());

        let cols = [ColumnDefinition::new("bad name", DataType::Integer)];
        assert!(create_table_statement("person", &cols).is_err());
    }

    #[test]
    fn schema_deserializes_with_defaults() {
        let schema: Schema = serde_json::from_str(
            r#"{"tables":[{"name":"car","columns":[{"name":"id","data_type":"Integer","constraints":["PrimaryKey"]}]}]}"#,
        )
        .unwrap();
        assert_eq!(schema.tables[0].columns[0].to_sql(), "id INTEGER PRIMARY KEY");
    }
}
