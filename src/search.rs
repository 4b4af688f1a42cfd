//! Tiered Vector Search Engine
//!
//! Given a text query, produces a ranked list of nearest rows. The server
//! tier asks the database to compute vector distances; when that is
//! unavailable or fails, the client tier fetches every stored vector as
//! portable text and scores cosine similarity locally. The fallback is a
//! visible branch: each tier yields a typed outcome, and only the failure of
//! both tiers reaches the caller.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::exec;
use crate::registry::{lock, NamedConnection, Registry};
use crate::value::{TabularResult, Value};
use crate::vectors;
use crate::{Error, Result};

/// Typed options for one search call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    pub embed_column: String,
    pub id_column: String,
    pub top_k: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { embed_column: "embedding".to_string(), id_column: "id".to_string(), top_k: 10 }
    }
}

impl SearchOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// One ranked row: identifier plus similarity score (larger = more similar)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub id: Value,
    pub score: f32,
}

/// Outcome of a search
///
/// `Unscored` is the client tier's answer when rows came back but none
/// carried a parseable vector; it is never disguised as a ranked result.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// Rows ordered by strictly descending similarity, at most top-k of them
    Ranked(Vec<RankedMatch>),
    /// The raw fallback fetch; no row could be scored
    Unscored(TabularResult),
}

/// Embed `query_text` and search `table` for its nearest rows
pub fn search(
    conn: &mut NamedConnection,
    provider: &EmbeddingProvider,
    table: &str,
    query_text: &str,
    opts: &SearchOptions,
) -> Result<SearchOutcome> {
    let query_vector = provider.embed_one(query_text)?;
    search_with_vector(conn, table, &query_vector, opts)
}

/// Search with an already-computed query vector
///
/// Server tier first; its failure is recoverable and only logged. The
/// client tier's failure on top of it is fatal and carries both causes.
pub fn search_with_vector(
    conn: &mut NamedConnection,
    table: &str,
    query_vector: &[f32],
    opts: &SearchOptions,
) -> Result<SearchOutcome> {
    match server_tier(conn, table, query_vector, opts) {
        Ok(matches) => Ok(SearchOutcome::Ranked(matches)),
        Err(server_err) => {
            tracing::warn!(
                "Server-side vector search failed; falling back to client-side: {:#}",
                server_err
            );
            match client_tier(conn, table, query_vector, opts) {
                Ok(outcome) => Ok(outcome),
                Err(client_err) => Err(Error::VectorSearch {
                    server: format!("{:#}", server_err),
                    client: format!("{:#}", client_err),
                }),
            }
        }
    }
}

/// Search on the connection registered under `conn_name`
pub fn vector_search(
    registry: &Registry,
    provider: &EmbeddingProvider,
    conn_name: &str,
    table: &str,
    query_text: &str,
    opts: &SearchOptions,
) -> Result<SearchOutcome> {
    let conn = registry.get(conn_name)?;
    let mut conn = lock(&conn);
    search(&mut conn, provider, table, query_text, opts)
}

/// Ask the server to compute the distance ordering
///
/// The reported distance is assumed to be exactly `1 - cosine similarity`
/// (0 = identical); scores are `1 - distance`, re-sorted descending so the
/// ordering invariant does not depend on how the server reports ties.
fn server_tier(
    conn: &mut NamedConnection,
    table: &str,
    query_vector: &[f32],
    opts: &SearchOptions,
) -> anyhow::Result<Vec<RankedMatch>> {
    let sql = format!(
        "SELECT {id} AS id, VEC_DISTANCE_COSINE(VEC_FromText(?1), {emb}) AS distance \
         FROM {table} ORDER BY distance ASC LIMIT ?2",
        id = opts.id_column,
        emb = opts.embed_column,
        table = table,
    );
    let params = [
        Value::Text(vectors::to_json_text(query_vector)),
        Value::Integer(opts.top_k as i64),
    ];
    let result = exec::run(conn, &sql, &params)?;

    let id_idx = result.column_index("id").context("server result lacks an id column")?;
    let dist_idx = result
        .column_index("distance")
        .context("server result lacks a distance column")?;

    let mut matches = Vec::with_capacity(result.rows.len());
    for row in &result.rows {
        let distance = row[dist_idx]
            .as_f64()
            .with_context(|| format!("non-numeric distance for id={}", row[id_idx]))?;
        matches.push(RankedMatch { id: row[id_idx].clone(), score: 1.0 - distance as f32 });
    }

    sort_descending(&mut matches);
    Ok(matches)
}

/// Fetch every stored vector as portable text and score locally
fn client_tier(
    conn: &mut NamedConnection,
    table: &str,
    query_vector: &[f32],
    opts: &SearchOptions,
) -> anyhow::Result<SearchOutcome> {
    let sql = format!(
        "SELECT {id} AS id, VEC_ToText({emb}) AS emb_text FROM {table}",
        id = opts.id_column,
        emb = opts.embed_column,
        table = table,
    );
    let fetched = exec::run(conn, &sql, &[])?;
    if fetched.is_empty() {
        return Ok(SearchOutcome::Ranked(Vec::new()));
    }

    let id_idx = fetched.column_index("id").context("fetch lacks an id column")?;
    let emb_idx = fetched.column_index("emb_text").context("fetch lacks an emb_text column")?;

    // Parse what we can; malformed rows are skipped, not fatal
    let mut parsed: Vec<(Value, Vec<f32>)> = Vec::with_capacity(fetched.rows.len());
    for row in &fetched.rows {
        let text = match row[emb_idx].as_text() {
            Some(text) => text,
            None => {
                tracing::warn!("Skipping id={}: embedding is not text", row[id_idx]);
                continue;
            }
        };
        match vectors::parse_text(&text) {
            Some(vector) => parsed.push((row[id_idx].clone(), vector)),
            None => {
                tracing::warn!("Skipping id={}: unparseable embedding text", row[id_idx]);
            }
        }
    }

    if parsed.is_empty() {
        // Nothing to score; hand the raw fetch back as-is
        return Ok(SearchOutcome::Unscored(fetched));
    }

    let query_normed = vectors::l2_normalize(query_vector);
    let mut matches: Vec<RankedMatch> = parsed
        .into_iter()
        .map(|(id, vector)| {
            let score = vectors::cosine_similarity(&query_normed, &vectors::l2_normalize(&vector));
            RankedMatch { id, score }
        })
        .collect();

    sort_descending(&mut matches);
    matches.truncate(opts.top_k);
    Ok(SearchOutcome::Ranked(matches))
}

/// Stable descending sort by score (ties keep fetch order)
fn sort_descending(matches: &mut [RankedMatch]) {
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectParams;
    use crate::registry::Registry;

    /// Seed a table of JSON-text vectors on a fresh "default" connection
    fn seeded_registry(vector_functions: bool) -> Registry {
        let registry = Registry::new();
        registry
            .connect(
                "default",
                &ConnectParams::in_memory().with_vector_functions(vector_functions),
            )
            .unwrap();
        exec::execute_sql(
            &registry,
            "default",
            "CREATE TABLE docs (id INTEGER, embedding TEXT)",
            &[],
        )
        .unwrap();
        registry
    }

    fn insert_doc(registry: &Registry, id: i64, embedding: &str) {
        exec::execute_sql(
            registry,
            "default",
            "INSERT INTO docs VALUES (?1, ?2)",
            &[Value::Integer(id), Value::Text(embedding.to_string())],
        )
        .unwrap();
    }

    fn run_search(registry: &Registry, opts: &SearchOptions, query: &[f32]) -> Result<SearchOutcome> {
        let conn = registry.get("default").unwrap();
        let mut conn = lock(&conn);
        search_with_vector(&mut conn, "docs", query, opts)
    }

    fn ranked(outcome: SearchOutcome) -> Vec<RankedMatch> {
        match outcome {
            SearchOutcome::Ranked(matches) => matches,
            SearchOutcome::Unscored(result) => panic!("expected ranked outcome, got {:?}", result),
        }
    }

    #[test]
    fn test_client_tier_orders_by_similarity() {
        let registry = seeded_registry(false);
        insert_doc(&registry, 1, "[0.0, 1.0]"); // orthogonal
        insert_doc(&registry, 2, "[1.0, 0.0]"); // identical direction
        insert_doc(&registry, 3, "[1.0, 1.0]"); // in between

        let matches = ranked(run_search(&registry, &SearchOptions::default(), &[1.0, 0.0]).unwrap());
        let ids: Vec<_> = matches.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![Value::Integer(2), Value::Integer(3), Value::Integer(1)]);
        assert!(matches[0].score > matches[1].score);
        assert!(matches[1].score > matches[2].score);
    }

    #[test]
    fn test_server_tier_ranks_and_converts_distance() {
        let registry = seeded_registry(true);
        insert_doc(&registry, 1, "[0.0, 1.0]");
        insert_doc(&registry, 2, "[1.0, 0.0]");
        insert_doc(&registry, 3, "[1.0, 1.0]");

        let matches = ranked(run_search(&registry, &SearchOptions::default(), &[1.0, 0.0]).unwrap());
        let ids: Vec<_> = matches.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![Value::Integer(2), Value::Integer(3), Value::Integer(1)]);
        assert!((matches[0].score - 1.0).abs() < 1e-6); // distance 0 -> score 1
    }

    #[test]
    fn test_fallback_when_server_functions_missing() {
        // No VEC_DISTANCE_COSINE registered: server tier fails, client
        // tier still produces a ranked answer.
        let registry = seeded_registry(false);
        insert_doc(&registry, 1, "[1.0, 0.0]");

        let matches = ranked(run_search(&registry, &SearchOptions::default(), &[1.0, 0.0]).unwrap());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, Value::Integer(1));
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let registry = seeded_registry(false);
        insert_doc(&registry, 1, "[1.0, 0.0]");
        insert_doc(&registry, 2, "not a vector");
        insert_doc(&registry, 3, "0.5, 0.5");

        let matches = ranked(run_search(&registry, &SearchOptions::default(), &[1.0, 0.0]).unwrap());
        let ids: Vec<_> = matches.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![Value::Integer(1), Value::Integer(3)]);
    }

    #[test]
    fn test_nothing_parseable_returns_unscored_fetch() {
        let registry = seeded_registry(false);
        insert_doc(&registry, 1, "garbage");
        insert_doc(&registry, 2, "more garbage");

        match run_search(&registry, &SearchOptions::default(), &[1.0, 0.0]).unwrap() {
            SearchOutcome::Unscored(result) => assert_eq!(result.rows.len(), 2),
            SearchOutcome::Ranked(matches) => panic!("expected unscored outcome, got {:?}", matches),
        }
    }

    #[test]
    fn test_empty_table_both_tiers() {
        for vector_functions in [false, true] {
            let registry = seeded_registry(vector_functions);
            let matches =
                ranked(run_search(&registry, &SearchOptions::default(), &[1.0, 0.0]).unwrap());
            assert!(matches.is_empty());
        }
    }

    #[test]
    fn test_top_k_truncation_and_overshoot() {
        let registry = seeded_registry(false);
        for id in 0..5 {
            insert_doc(&registry, id, &format!("[1.0, {}.0]", id));
        }

        let opts = SearchOptions::default().with_top_k(3);
        assert_eq!(ranked(run_search(&registry, &opts, &[1.0, 0.0]).unwrap()).len(), 3);

        let opts = SearchOptions::default().with_top_k(50);
        assert_eq!(ranked(run_search(&registry, &opts, &[1.0, 0.0]).unwrap()).len(), 5);
    }

    #[test]
    fn test_both_tiers_failing_is_fatal() {
        let registry = seeded_registry(false);
        let conn = registry.get("default").unwrap();
        let mut conn = lock(&conn);

        let err = search_with_vector(
            &mut conn,
            "missing_table",
            &[1.0, 0.0],
            &SearchOptions::default(),
        )
        .unwrap_err();
        match err {
            Error::VectorSearch { server, client } => {
                assert!(!server.is_empty());
                assert!(!client.is_empty());
            }
            other => panic!("expected VectorSearch, got {}", other),
        }
    }

    #[test]
    fn test_blob_stored_vectors_rank_via_vec_to_text() {
        // Vectors stored as packed little-endian f32 blobs
        let registry = seeded_registry(false);
        exec::execute_sql(&registry, "default", "CREATE TABLE bdocs (id INTEGER, embedding BLOB)", &[])
            .unwrap();
        for (id, v) in [(1i64, [0.0f32, 1.0]), (2, [1.0, 0.0])] {
            exec::execute_sql(
                &registry,
                "default",
                "INSERT INTO bdocs VALUES (?1, ?2)",
                &[Value::Integer(id), Value::Blob(vectors::encode_blob(&v))],
            )
            .unwrap();
        }

        let conn = registry.get("default").unwrap();
        let mut conn = lock(&conn);
        let matches = ranked(
            search_with_vector(&mut conn, "bdocs", &[1.0, 0.0], &SearchOptions::default()).unwrap(),
        );
        assert_eq!(matches[0].id, Value::Integer(2));
    }
}
