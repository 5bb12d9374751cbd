use crate::error::{CensusError, Result};
use crate::table::ResultTable;

/// Columns per request. The server caps a request at 50 variables and the
/// geography column takes one of them.
pub const COLUMN_LIMIT: usize = 49;

/// Consecutive chunks of at most [`COLUMN_LIMIT`] columns; the last may be smaller.
pub fn chunk_columns(columns: &[String]) -> Vec<&[String]> {
    columns.chunks(COLUMN_LIMIT).collect()
}

/// Runs `fetch` once per chunk, in order, and merges the results column-wise,
/// skipping names already present. The first failure aborts the whole query.
pub fn query_chunked<F>(columns: &[String], mut fetch: F) -> Result<ResultTable>
where
    F: FnMut(&[String]) -> Result<ResultTable>,
{
    if columns.len() <= COLUMN_LIMIT {
        return fetch(columns);
    }

    let chunks = chunk_columns(columns);
    let total = chunks.len();
    tracing::debug!(columns = columns.len(), chunks = total, "splitting column list");

    let mut result = ResultTable::new();
    for (i, chunk) in chunks.into_iter().enumerate() {
        let context = format!("column chunk {}/{}", i + 1, total);
        let part = fetch(chunk).map_err(|e| CensusError::partial(&context, e))?;
        result
            .merge_columns(part)
            .map_err(|e| CensusError::partial(&context, e))?;
    }
    Ok(result)
}
