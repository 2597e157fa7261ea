//! Relational store abstraction
//!
//! The pipeline only ever needs four operations against its tables: check
//! existence, write a frame, delete rows by a key column, and select columns.
//! `TableStore` captures those; `SqliteStore` implements them over sqlx.

use super::frame::{Column, ColumnType, Frame, Value, DATE_FORMAT};
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool, ValueRef};
use tracing::{debug, info};

/// How `write` treats an existing table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop and recreate the table, then insert
    Replace,
    /// Create the table if missing, then insert
    Append,
    /// Refuse to touch an existing table
    Fail,
}

#[async_trait]
pub trait TableStore: Send + Sync {
    async fn exists(&self, table: &str) -> Result<bool>;

    /// Write every row of `frame`; returns rows written
    async fn write(&self, table: &str, frame: &Frame, mode: WriteMode) -> Result<u64>;

    /// Delete rows whose `column` equals any of `values`; returns rows deleted
    async fn delete_where(&self, table: &str, column: &str, values: &[String]) -> Result<u64>;

    /// Read the named columns of every row
    async fn select(&self, table: &str, columns: &[&str]) -> Result<Frame>;
}

/// Validate identifier to prevent SQL injection
fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() < 100
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!("Invalid identifier: {:?}", name)))
    }
}

/// sqlx-backed store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Declared column types, in table order
    async fn table_columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = sqlx::query(&format!("PRAGMA table_info(\"{}\")", table))
            .fetch_all(&self.pool)
            .await?;

        // PRAGMA table_info returns: (cid, name, type, notnull, dflt_value, pk)
        rows.iter()
            .map(|row| {
                let name: String = row.try_get(1)?;
                let declared: String = row.try_get(2)?;
                Ok(Column::new(name, ColumnType::from_declared(&declared)))
            })
            .collect()
    }
}

fn create_table_sql(table: &str, columns: &[Column], if_not_exists: bool) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("\"{}\" {}", c.name, c.kind.sql_type()))
        .collect();
    format!(
        "CREATE TABLE {}\"{}\" ({})",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        table,
        defs.join(", ")
    )
}

fn insert_sql(table: &str, columns: &[Column]) -> String {
    let names: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c.name)).collect();
    let params = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        table,
        names.join(", "),
        params
    )
}

fn decode_cell(row: &SqliteRow, index: usize, kind: ColumnType) -> Result<Value> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match kind {
        ColumnType::Integer => Value::Integer(row.try_get::<i64, _>(index)?),
        ColumnType::Real => row
            .try_get::<f64, _>(index)
            .map(Value::Real)
            .or_else(|_| row.try_get::<i64, _>(index).map(|v| Value::Real(v as f64)))?,
        ColumnType::Date => {
            let raw: String = row.try_get(index)?;
            match chrono::NaiveDate::parse_from_str(&raw, DATE_FORMAT) {
                Ok(date) => Value::Date(date),
                Err(_) => Value::Text(raw),
            }
        }
        ColumnType::Text => row
            .try_get::<String, _>(index)
            .map(Value::Text)
            .or_else(|_| row.try_get::<i64, _>(index).map(Value::Integer))
            .or_else(|_| row.try_get::<f64, _>(index).map(Value::Real))?,
    };
    Ok(value)
}

#[async_trait]
impl TableStore for SqliteStore {
    async fn exists(&self, table: &str) -> Result<bool> {
        validate_identifier(table)?;
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn write(&self, table: &str, frame: &Frame, mode: WriteMode) -> Result<u64> {
        validate_identifier(table)?;
        for column in frame.columns() {
            validate_identifier(&column.name)?;
        }

        if mode == WriteMode::Fail && self.exists(table).await? {
            return Err(Error::Persistence(format!("Table {} already exists", table)));
        }

        let persist = |e: sqlx::Error| Error::Persistence(format!("Write to {} failed: {}", table, e));

        let mut tx = self.pool.begin().await.map_err(persist)?;

        match mode {
            WriteMode::Replace => {
                sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", table))
                    .execute(&mut *tx)
                    .await
                    .map_err(persist)?;
                sqlx::query(&create_table_sql(table, frame.columns(), false))
                    .execute(&mut *tx)
                    .await
                    .map_err(persist)?;
            }
            WriteMode::Append | WriteMode::Fail => {
                sqlx::query(&create_table_sql(table, frame.columns(), true))
                    .execute(&mut *tx)
                    .await
                    .map_err(persist)?;
            }
        }

        let sql = insert_sql(table, frame.columns());
        let mut written = 0u64;
        for row in frame.rows() {
            let mut query = sqlx::query(&sql);
            for value in row {
                query = match value {
                    Value::Null => query.bind(Option::<String>::None),
                    Value::Integer(v) => query.bind(*v),
                    Value::Real(v) => query.bind(*v),
                    Value::Text(s) => query.bind(s.as_str()),
                    Value::Date(d) => query.bind(d.format(DATE_FORMAT).to_string()),
                };
            }
            written += query.execute(&mut *tx).await.map_err(persist)?.rows_affected();
        }

        tx.commit().await.map_err(persist)?;

        debug!("Wrote {} rows to {} ({:?})", written, table, mode);
        Ok(written)
    }

    async fn delete_where(&self, table: &str, column: &str, values: &[String]) -> Result<u64> {
        validate_identifier(table)?;
        validate_identifier(column)?;

        if values.is_empty() {
            info!("No keys given for delete on {}, nothing to do", table);
            return Ok(0);
        }
        if !self.exists(table).await? {
            info!("Table {} does not exist yet, nothing to delete", table);
            return Ok(0);
        }

        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"{}\" IN ({})",
            table, column, placeholders
        );
        let mut query = sqlx::query(&sql);
        for value in values {
            query = query.bind(value.as_str());
        }

        let deleted = query
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Persistence(format!("Delete from {} failed: {}", table, e)))?
            .rows_affected();

        info!("Deleted {} rows from {}", deleted, table);
        Ok(deleted)
    }

    async fn select(&self, table: &str, columns: &[&str]) -> Result<Frame> {
        validate_identifier(table)?;
        for column in columns {
            validate_identifier(column)?;
        }

        if !self.exists(table).await? {
            return Err(Error::NotFound(format!("Table {} does not exist", table)));
        }

        let declared = self.table_columns(table).await?;
        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|name| !declared.iter().any(|c| c.name == *name))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Schema(format!(
                "Table {} is missing columns: {}",
                table,
                missing.join(", ")
            )));
        }

        let selected: Vec<Column> = columns
            .iter()
            .filter_map(|name| declared.iter().find(|c| c.name == *name).cloned())
            .collect();

        let quoted: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c)).collect();
        let sql = format!("SELECT {} FROM \"{}\"", quoted.join(", "), table);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut frame = Frame::new(selected.clone());
        for row in &rows {
            let values = selected
                .iter()
                .enumerate()
                .map(|(i, column)| decode_cell(row, i, column.kind))
                .collect::<Result<Vec<_>>>()?;
            frame.push_row(values)?;
        }

        debug!("Selected {} rows from {}", frame.height(), table);
        Ok(frame)
    }
}
