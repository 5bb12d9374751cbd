use reqwest::StatusCode;

use crate::util::first_line;

/// Errors returned by every fallible operation in this crate.
#[derive(Debug, thiserror::Error)]
pub enum CensusError {
    /// Malformed input to the query builder.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The server answered 204: no records matched.
    #[error("no records matched your query (HTTP 204): {url}")]
    EmptyResult { url: String },

    /// The server rejected the query. `message` is the server's own text.
    #[error("HTTP {status}: {message}\nrequest: {url}")]
    MalformedQuery {
        status: u16,
        message: String,
        url: String,
    },

    /// No unique geography hierarchy could be determined for a wildcard query.
    #[error("geography hierarchy resolution failed: {0}")]
    HierarchyResolution(String),

    /// One sub-query of a chunked or hierarchical query failed.
    #[error("sub-query failed ({context}): {source}")]
    PartialQuery {
        context: String,
        #[source]
        source: Box<CensusError>,
    },

    #[error("unknown dataset identifier: {0}")]
    UnknownDataset(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Tables that should line up (chunks, hierarchy branches) do not.
    #[error("inconsistent result tables: {0}")]
    Schema(String),

    #[error(transparent)]
    Config(#[from] anyhow::Error),
}

pub type Result<T, E = CensusError> = std::result::Result<T, E>;

impl CensusError {
    pub(crate) fn partial(context: impl Into<String>, source: CensusError) -> Self {
        CensusError::PartialQuery {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn decode(url: &str, message: impl std::fmt::Display) -> Self {
        CensusError::Decode {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

// Some endpoints answer with {"error": ...}, others with {"message": ..., "detail": ...}.
#[derive(Debug, serde::Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Maps a non-success reply to [`CensusError::MalformedQuery`].
pub(crate) fn server_error(status: StatusCode, url: &str, body: &str) -> CensusError {
    let from_json = serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|e| e.error.or(e.message).or(e.detail));

    let message = match from_json {
        Some(m) if !m.trim().is_empty() => m.trim().to_string(),
        _ => match first_line(body) {
            Some(line) => line.to_string(),
            None => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        },
    };

    CensusError::MalformedQuery {
        status: status.as_u16(),
        message,
        url: url.to_string(),
    }
}
