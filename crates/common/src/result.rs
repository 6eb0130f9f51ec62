use crate::Row;
use std::fmt;
use tabled::{builder::Builder, settings};
use types::{SqlType, Value};

/// Result of one executed statement.
///
/// SHOW statements carry column names, display attributes, and projected
/// rows; plain DDL carries only the message. The struct owns its rows and
/// column lists exclusively.
#[derive(Clone, Debug)]
pub struct QueryResult {
    pub column_names: Option<Vec<String>>,
    pub column_attributes: Option<Vec<SqlType>>,
    pub rows: Option<Vec<Row>>,
    pub message: String,
}

impl QueryResult {
    /// A message-only result, e.g. `created foo`.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            column_names: None,
            column_attributes: None,
            rows: None,
            message: message.into(),
        }
    }

    pub fn with_rows(
        column_names: Vec<String>,
        column_attributes: Vec<SqlType>,
        rows: Vec<Row>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            column_names: Some(column_names),
            column_attributes: Some(column_attributes),
            rows: Some(rows),
            message: message.into(),
        }
    }
}

/// Format a single value for display: INT as decimal, TEXT double-quoted,
/// BOOLEAN as `true`/`false`.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Int(n) => n.to_string(),
        Value::Text(text) => format!("\"{text}\""),
        Value::Bool(b) => b.to_string(),
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(column_names) = &self.column_names {
            let mut builder = Builder::default();
            builder.push_record(column_names.iter().cloned());

            for row in self.rows.as_deref().unwrap_or_default() {
                builder.push_record(column_names.iter().map(|name| {
                    row.get(name).map(format_value).unwrap_or_default()
                }));
            }

            let mut table = builder.build();
            table.with(settings::Style::ascii());
            writeln!(f, "{table}")?;
        }
        write!(f, "{}", self.message)
    }
}
