//! Tabular Result Adapter
//!
//! Runs one statement against a named connection and hands back the uniform
//! column/row shape. Statement text is executed as given; validation and
//! injection safety are the caller's responsibility.

use crate::registry::{lock, NamedConnection, Registry};
use crate::value::{TabularResult, Value};
use crate::Result;

/// Execute a statement and fetch its result set
///
/// If execution with bound parameters fails, the text is retried once as a
/// raw (possibly multi-statement) batch with no parameters. A statement that
/// produced no result set yields an empty column list with zero rows.
pub fn run(conn: &mut NamedConnection, sql: &str, params: &[Value]) -> Result<TabularResult> {
    conn.touch();
    match conn.driver.execute(sql, params) {
        Ok(result) => Ok(result),
        Err(first) => {
            tracing::debug!("Parameterized execute failed ({}), retrying as raw statement text", first);
            conn.driver.execute_raw(sql)
        }
    }
}

/// Execute a statement on the connection registered under `conn_name`
pub fn execute_sql(
    registry: &Registry,
    conn_name: &str,
    sql: &str,
    params: &[Value],
) -> Result<TabularResult> {
    let conn = registry.get(conn_name)?;
    let mut conn = lock(&conn);
    run(&mut conn, sql, params)
}
