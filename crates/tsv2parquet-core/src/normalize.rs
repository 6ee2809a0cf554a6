// Row normalization
//
// Upstream extracts wrap some string values in a redundant pair of double
// quotes that survive CSV unquoting. Exactly one wrapping pair is removed.

use crate::types::RowChunk;

/// Strip one matching pair of wrapping double quotes, if present.
pub fn strip_outer_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn strip_in_place(value: &mut String) {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value.pop();
        value.remove(0);
    }
}

/// Normalize every raw cell of a chunk. Runs before any type coercion.
pub fn normalize_chunk(chunk: &mut RowChunk) {
    for row in chunk.rows_mut() {
        for value in row.iter_mut() {
            strip_in_place(value);
        }
    }
}
