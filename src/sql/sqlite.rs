//! Read-only in-memory SQLite copy of the song dataset.

use log::{debug, info};
use rusqlite::{params_from_iter, types::Value as SqlValue, types::ValueRef, Connection};
use serde_json::Value;

use super::engine::{QueryEngine, QueryError, ResultRows};
use crate::{
    error::{EvalError, Result},
    records::Record,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn of(v: &Value) -> Option<Self> {
        match v {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnType::Integer),
            Value::Number(n) if n.is_i64() => Some(ColumnType::Integer),
            Value::Number(_) => Some(ColumnType::Real),
            _ => Some(ColumnType::Text),
        }
    }

    fn widen(self, other: Self) -> Self {
        use ColumnType::*;
        match (self, other) {
            (Text, _) | (_, Text) => Text,
            (Real, _) | (_, Real) => Real,
            _ => Integer,
        }
    }

    fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    fn convert(self, v: Option<&Value>) -> SqlValue {
        match (self, v) {
            (_, None) | (_, Some(Value::Null)) => SqlValue::Null,
            (_, Some(Value::Bool(b))) => SqlValue::Integer(*b as i64),
            (ColumnType::Integer, Some(Value::Number(n))) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            (ColumnType::Real, Some(Value::Number(n))) => {
                SqlValue::Real(n.as_f64().unwrap_or(f64::NAN))
            }
            (_, Some(Value::String(s))) => SqlValue::Text(s.clone()),
            (_, Some(other)) => SqlValue::Text(other.to_string()),
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Stringified cell, so results of different storage classes compare as text.
fn stringify(v: ValueRef<'_>) -> String {
    match v {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format!("{f:?}"),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => b.iter().map(|x| format!("{x:02x}")).collect(),
    }
}

/// Skips leading whitespace and comments.
fn skip_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail).trim_start();
        } else {
            return rest;
        }
    }
}

/// First keyword of a statement, lowercased.
fn leading_keyword(sql: &str) -> String {
    skip_comments(sql)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// True when a second statement follows the first `;` outside quotes.
fn has_trailing_statement(sql: &str) -> bool {
    let mut quote: Option<char> = None;
    for (i, c) in sql.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if matches!(c, '\'' | '"' | '`') => quote = Some(c),
            None if c == ';' => {
                let mut rest = &sql[i + 1..];
                loop {
                    rest = skip_comments(rest);
                    match rest.strip_prefix(';') {
                        Some(r) => rest = r,
                        None => return !rest.is_empty(),
                    }
                }
            }
            None => {}
        }
    }
    false
}

fn classify_prepare_error(e: rusqlite::Error) -> QueryError {
    let text = match e {
        rusqlite::Error::SqlInputError { msg, .. } => msg,
        rusqlite::Error::SqliteFailure(_, msg) => {
            msg.unwrap_or_else(|| "statement failed to compile".to_string())
        }
        other => return QueryError::Runtime(other.to_string()),
    };
    let lower = text.to_lowercase();
    if lower.contains("no such column") || lower.contains("no such table") {
        QueryError::Schema(text)
    } else {
        QueryError::Syntax(text)
    }
}

fn runtime(e: rusqlite::Error) -> QueryError {
    QueryError::Runtime(e.to_string())
}

pub struct SqliteSnapshot {
    conn: Connection,
    table: String,
    columns: Vec<String>,
}

impl SqliteSnapshot {
    /// Loads `records` into table `table` and locks the connection read-only.
    pub fn from_records(table: &str, records: &[Record]) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut types: Vec<Option<ColumnType>> = Vec::new();
        for rec in records {
            for (name, value) in rec {
                let pos = match columns.iter().position(|c| c == name) {
                    Some(pos) => pos,
                    None => {
                        columns.push(name.clone());
                        types.push(None);
                        columns.len() - 1
                    }
                };
                if let Some(t) = ColumnType::of(value) {
                    types[pos] = Some(types[pos].map_or(t, |prev| prev.widen(t)));
                }
            }
        }
        if columns.is_empty() {
            return Err(EvalError::EmptyDataset(table.to_string()));
        }
        let types: Vec<ColumnType> = types
            .into_iter()
            .map(|t| t.unwrap_or(ColumnType::Text))
            .collect();

        let mut conn = Connection::open_in_memory()?;

        let defs: Vec<String> = columns
            .iter()
            .zip(&types)
            .map(|(c, t)| format!("{} {}", quote_ident(c), t.sql_name()))
            .collect();
        let create = format!("CREATE TABLE {} ({})", quote_ident(table), defs.join(", "));
        debug!("{create}");
        conn.execute(&create, [])?;

        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&insert)?;
            for rec in records {
                let row = columns
                    .iter()
                    .zip(&types)
                    .map(|(c, t)| t.convert(rec.get(c)));
                stmt.execute(params_from_iter(row))?;
            }
        }
        tx.commit()?;

        conn.execute_batch("PRAGMA query_only = ON;")?;
        info!(
            "SQL snapshot ready: table {table} with {} rows, {} columns",
            records.len(),
            columns.len()
        );

        Ok(Self {
            conn,
            table: table.to_string(),
            columns,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl QueryEngine for SqliteSnapshot {
    fn execute(&self, sql: &str) -> std::result::Result<ResultRows, QueryError> {
        let sql = sql.trim();
        let mut stmt = self.conn.prepare(sql).map_err(classify_prepare_error)?;
        if has_trailing_statement(sql) {
            return Err(QueryError::Runtime(
                "only one statement may be executed at a time".to_string(),
            ));
        }

        let keyword = leading_keyword(sql);
        if !stmt.readonly() || !matches!(keyword.as_str(), "select" | "with") {
            return Err(QueryError::Runtime(format!(
                "only read-only SELECT statements may run against the snapshot (got {keyword:?})"
            )));
        }

        let width = stmt.column_count();
        let mut rows = stmt.query([]).map_err(runtime)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(runtime)? {
            let mut tuple = Vec::with_capacity(width);
            for i in 0..width {
                tuple.push(stringify(row.get_ref(i).map_err(runtime)?));
            }
            out.push(tuple);
        }
        Ok(ResultRows::new(out))
    }
}
