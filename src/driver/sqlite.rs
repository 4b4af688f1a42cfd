//! SQLite driver implementation
//!
//! Vectors are stored as blobs of little-endian f32 values. `VEC_ToText` is
//! always registered so stored vectors can be rendered back as portable text
//! (the client-tier fallback source). `VEC_FromText` and
//! `VEC_DISTANCE_COSINE` are registered only when `vector_functions` is set
//! in the connection parameters, emulating a server with native vector
//! distance support. `VEC_DISTANCE_COSINE` returns `1 - cosine similarity`.

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use super::Driver;
use crate::config::ConnectParams;
use crate::value::{TabularResult, Value};
use crate::vectors;
use crate::{Error, Result};

pub struct SqliteDriver {
    conn: Option<Connection>,
}

impl SqliteDriver {
    /// Open a database file (":memory:" for an in-memory database)
    pub fn open(params: &ConnectParams) -> Result<Self> {
        let conn = if params.database == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(&params.database)
        };
        let conn = conn.map_err(|e| Error::Connection(format!("sqlite connect failed: {}", e)))?;

        register_vec_to_text(&conn)?;
        if params.vector_functions {
            register_vector_distance(&conn)?;
        }

        Ok(Self { conn: Some(conn) })
    }

    fn handle(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::Connection("connection already closed".to_string()))
    }
}

impl Driver for SqliteDriver {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<TabularResult> {
        let conn = self.handle()?;
        let mut stmt = conn.prepare(sql)?;
        let bound = rusqlite::params_from_iter(
            params.iter().cloned().map(rusqlite::types::Value::from),
        );

        // Statements without a result set (INSERT, UPDATE, DDL)
        if stmt.column_count() == 0 {
            stmt.execute(bound)?;
            return Ok(TabularResult::empty());
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut result = TabularResult::new(columns);

        let mut rows = stmt.query(bound)?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(result.columns.len());
            for i in 0..result.columns.len() {
                values.push(Value::from(row.get::<_, rusqlite::types::Value>(i)?));
            }
            result.push_row(values);
        }

        Ok(result)
    }

    fn execute_raw(&mut self, sql: &str) -> Result<TabularResult> {
        self.handle()?.execute_batch(sql)?;
        Ok(TabularResult::empty())
    }

    fn ping(&mut self) -> Result<()> {
        self.handle()?.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| Error::Driver(e))?;
        }
        Ok(())
    }
}

/// Read a function argument as a vector: blob (packed f32) or portable text
fn vector_arg(ctx: &Context, idx: usize) -> rusqlite::Result<Vec<f32>> {
    match ctx.get_raw(idx) {
        ValueRef::Blob(blob) => Ok(vectors::decode_blob(blob)),
        ValueRef::Text(text) => {
            let text = std::str::from_utf8(text)
                .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
            vectors::parse_text(text).ok_or_else(|| {
                rusqlite::Error::UserFunctionError(
                    format!("unparseable vector text: {:.80}", text).into(),
                )
            })
        }
        _ => Err(rusqlite::Error::UserFunctionError(
            "expected a vector blob or vector text".into(),
        )),
    }
}

/// Register `VEC_ToText`: stored vector -> JSON array text
fn register_vec_to_text(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "VEC_ToText",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| match ctx.get_raw(0) {
            ValueRef::Null => Ok(rusqlite::types::Value::Null),
            // Stored text is handed back verbatim; the caller's parser
            // decides what counts as malformed
            ValueRef::Text(text) => Ok(rusqlite::types::Value::Text(
                String::from_utf8_lossy(text).into_owned(),
            )),
            ValueRef::Blob(blob) => Ok(rusqlite::types::Value::Text(vectors::to_json_text(
                &vectors::decode_blob(blob),
            ))),
            _ => Err(rusqlite::Error::UserFunctionError(
                "expected a vector blob or vector text".into(),
            )),
        },
    )?;
    Ok(())
}

/// Register `VEC_FromText` and `VEC_DISTANCE_COSINE`
fn register_vector_distance(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "VEC_FromText",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let vector = vector_arg(ctx, 0)?;
            Ok(rusqlite::types::Value::Blob(vectors::encode_blob(&vector)))
        },
    )?;

    conn.create_scalar_function(
        "VEC_DISTANCE_COSINE",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let a = vector_arg(ctx, 0)?;
            let b = vector_arg(ctx, 1)?;
            Ok(1.0 - vectors::cosine_similarity(&a, &b) as f64)
        },
    )?;
    Ok(())
}
