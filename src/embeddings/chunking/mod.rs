#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fixed character-to-token ratio used for budgeting. Deliberately a rough
/// estimate: chunk boundaries only need to be stable and deterministic, not
/// tokenizer-exact.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum estimated tokens per chunk before a new chunk is started.
    pub max_chunk_tokens: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_tokens: 6000,
        }
    }
}

/// Estimate the token cost of a piece of text.
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    text.len() / CHARS_PER_TOKEN
}

/// Split source text into line-aligned chunks under an approximate token
/// budget.
///
/// Whole lines are accumulated greedily; when adding a line would push the
/// current chunk past `max_tokens` and the chunk already holds at least one
/// line, the chunk is flushed and the line starts a new one. A single line
/// larger than the budget becomes a chunk by itself.
///
/// Joining the returned chunks with `"\n"` reproduces the input exactly.
/// Empty input yields no chunks.
#[inline]
pub fn split_into_chunks(text: &str, max_tokens: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0;
    let mut current_has_lines = false;

    for line in text.split('\n') {
        let line_tokens = estimate_token_count(line);

        if current_has_lines && current_tokens + line_tokens > max_tokens {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;
            current_has_lines = false;
        }

        if current_has_lines {
            current.push('\n');
        }
        current.push_str(line);
        current_tokens += line_tokens;
        current_has_lines = true;
    }

    chunks.push(current);

    debug!(
        "Split {} bytes into {} chunks (budget {} tokens)",
        text.len(),
        chunks.len(),
        max_tokens
    );

    chunks
}
