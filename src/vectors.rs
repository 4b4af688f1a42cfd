//! Portable vector encodings and similarity math
//!
//! Stored vectors travel in two shapes: a binary blob of little-endian f32
//! values (how the sqlite driver persists them) and portable text (a JSON
//! array, or a bare comma-separated list as a fallback).

/// Encode a vector as a blob of little-endian f32 values
pub fn encode_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a little-endian f32 blob; trailing partial chunks are dropped
pub fn decode_blob(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Render a vector as a JSON array string
pub fn to_json_text(vector: &[f32]) -> String {
    serde_json::to_string(vector).unwrap_or_else(|_| "[]".to_string())
}

/// Parse portable vector text: JSON array first, comma-separated fallback
pub fn parse_text(text: &str) -> Option<Vec<f32>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = serde_json::from_str::<Vec<f32>>(trimmed) {
        return Some(parsed);
    }
    trimmed
        .split(',')
        .map(|part| part.trim().parse::<f32>().ok())
        .collect()
}

/// Scale a vector to unit length; zero vectors are returned unchanged
pub fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector.to_vec()
    } else {
        vector.iter().map(|x| x / norm).collect()
    }
}

/// Compute cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
