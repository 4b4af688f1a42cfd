//! Temporal Clause Rewriter
//!
//! Rewrites a "current" query into a point-in-time query against a
//! system-versioned table by splicing a temporal clause after the first
//! `FROM <table>` it finds.

use regex::Regex;
use std::sync::OnceLock;

use crate::exec;
use crate::registry::Registry;
use crate::value::TabularResult;
use crate::{Error, Result};

/// Temporal keyword for MariaDB-style system versioning; override per dialect
pub const DEFAULT_TEMPORAL_KEYWORD: &str = "FOR SYSTEM_TIME AS OF TIMESTAMP";

/// `FROM <table>`, accepting bare, quoted, and schema-qualified identifiers
fn from_table_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)FROM\s+([`"']?[\w.]+[`"']?)"#).expect("valid regex"))
}

fn bare_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"))
}

/// Normalize an as-of instant: a bare calendar date becomes midnight
pub fn normalize_as_of(as_of: &str) -> String {
    let trimmed = as_of.trim();
    if bare_date_regex().is_match(trimmed) {
        format!("{} 00:00:00", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Rewrite `base_sql` into a point-in-time query at `as_of`
///
/// The temporal keyword is spliced directly after the first `FROM <table>`
/// match, together with a server-side one-second bump of the as-of instant
/// (`ADD(MICROSECOND, 1000000, …)` against the keyword) so the upper bound
/// is inclusive. Fails with `Error::Rewrite` when no `FROM <table>` clause
/// can be located; write full temporal SQL yourself in that case.
///
/// The rewrite is purely lexical and replaces the first textual occurrence
/// of the matched table token. Queries that mention the same token earlier
/// (say, as a column name) must be rewritten by the caller instead.
pub fn rewrite(base_sql: &str, as_of: &str, temporal_keyword: Option<&str>) -> Result<String> {
    let keyword = temporal_keyword.unwrap_or(DEFAULT_TEMPORAL_KEYWORD);

    let caps = from_table_regex()
        .captures(base_sql)
        .ok_or_else(|| Error::Rewrite(format!("please write full temporal SQL: {}", base_sql)))?;
    let table_token = &caps[1];

    let clause = format!(
        "{} {}ADD(MICROSECOND, 1000000, '{}')",
        table_token,
        keyword,
        normalize_as_of(as_of)
    );
    Ok(base_sql.replacen(table_token, &clause, 1))
}

/// Rewrite and execute a point-in-time query on a registered connection
pub fn temporal_query(
    registry: &Registry,
    conn_name: &str,
    base_sql: &str,
    as_of: &str,
    temporal_keyword: Option<&str>,
) -> Result<TabularResult> {
    let sql = rewrite(base_sql, as_of, temporal_keyword)?;
    tracing::debug!("Rewritten temporal query: {}", sql);
    exec::execute_sql(registry, conn_name, &sql, &[])
}
