// src/table.rs

use anyhow::{bail, Result};
use serde_json::{Map, Value};

/// Rows of JSON objects with a column order fixed by first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
}

impl Table {
    /// Accepts only an array of objects. A bare object (such as an error
    /// envelope served with a 200) is rejected.
    pub fn from_json(value: Value) -> Result<Self> {
        let objects = match value {
            Value::Array(items) => items,
            other => bail!("expected a JSON array of rows, got {}", kind_of(&other)),
        };

        let mut table = Table::default();
        for (idx, item) in objects.into_iter().enumerate() {
            match item {
                Value::Object(row) => table.push(row),
                other => bail!("row {} is {}, not an object", idx, kind_of(&other)),
            }
        }
        Ok(table)
    }

    pub fn push(&mut self, row: Map<String, Value>) {
        for key in row.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every row rendered as CSV cells in the order of `columns`.
    pub fn records<'a>(
        &'a self,
        columns: &'a [String],
    ) -> impl Iterator<Item = Vec<String>> + 'a {
        self.rows
            .iter()
            .map(move |row| columns.iter().map(|c| cell(row.get(c))).collect())
    }

    /// Keep only rows whose `column` renders with `prefix`.
    pub fn retain_prefix(&mut self, column: &str, prefix: &str) {
        self.rows
            .retain(|row| cell(row.get(column)).starts_with(prefix));
    }
}

/// Missing and null are empty; nested values are compact JSON.
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
