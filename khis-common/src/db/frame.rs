//! In-memory tabular data exchanged with the relational store
//!
//! A `Frame` is an ordered list of typed columns plus rows of `Value`s.
//! Domain row structs implement [`IntoFrame`] to describe their table shape.

use crate::{Error, Result};
use chrono::NaiveDate;

/// Storage date format ("2024-01-01")
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Single cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view (integers widen to f64)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Date view (text cells parse as YYYY-MM-DD)
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Text(s) => NaiveDate::parse_from_str(s, DATE_FORMAT).ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Declared column type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Date,
}

impl ColumnType {
    /// SQL type used when creating a table
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::Date => "DATE",
        }
    }

    /// Map a declared SQLite type back to a column type (SQLite affinity rules)
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnType::Real
        } else if upper.contains("DATE") {
            ColumnType::Date
        } else {
            ColumnType::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered rows sharing one column list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; its width must match the column count
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::Schema(format!(
                "Row has {} values but frame has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |values| RowRef {
            frame: self,
            values,
        })
    }
}

/// Borrowed row with by-name typed accessors
///
/// Accessors fail with `Error::Schema` when the column is missing or the
/// cell has the wrong type.
pub struct RowRef<'a> {
    frame: &'a Frame,
    values: &'a [Value],
}

impl<'a> RowRef<'a> {
    fn cell(&self, name: &str) -> Result<&'a Value> {
        self.frame
            .column_index(name)
            .map(|i| &self.values[i])
            .ok_or_else(|| Error::Schema(format!("Missing column: {}", name)))
    }

    pub fn text(&self, name: &str) -> Result<&'a str> {
        let cell = self.cell(name)?;
        cell.as_str()
            .ok_or_else(|| Error::Schema(format!("Column {} is not text: {:?}", name, cell)))
    }

    /// Text cell, `None` when null
    pub fn opt_text(&self, name: &str) -> Result<Option<&'a str>> {
        let cell = self.cell(name)?;
        if cell.is_null() {
            return Ok(None);
        }
        cell.as_str()
            .map(Some)
            .ok_or_else(|| Error::Schema(format!("Column {} is not text: {:?}", name, cell)))
    }

    pub fn real(&self, name: &str) -> Result<f64> {
        let cell = self.cell(name)?;
        cell.as_f64()
            .ok_or_else(|| Error::Schema(format!("Column {} is not numeric: {:?}", name, cell)))
    }

    pub fn date(&self, name: &str) -> Result<NaiveDate> {
        let cell = self.cell(name)?;
        cell.as_date()
            .ok_or_else(|| Error::Schema(format!("Column {} is not a date: {:?}", name, cell)))
    }
}

/// Row types with a fixed table shape
pub trait IntoFrame {
    fn schema() -> Vec<Column>;
    fn to_row(&self) -> Vec<Value>;
}

/// Build a frame from typed rows
pub fn to_frame<T: IntoFrame>(items: &[T]) -> Frame {
    Frame {
        columns: T::schema(),
        rows: items.iter().map(IntoFrame::to_row).collect(),
    }
}
