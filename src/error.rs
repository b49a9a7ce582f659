use std::path::PathBuf;

use thiserror::Error;

use crate::edgar::report::StatementKind;

/// Outcome of an outbound request. Transient failures are retried inside the
/// client; only `Permanent` escapes it.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },
    #[error("permanent failure fetching {url}: {reason}")]
    Permanent { url: String, reason: String },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// One statement kind could not be matched against a filing's report set.
/// Scoped to a single (filing, kind) pair; recorded in the manifest entry.
#[derive(Debug, Error)]
#[error("{kind}: {reason}")]
pub struct ClassificationError {
    pub kind: StatementKind,
    pub reason: String,
}

impl ClassificationError {
    pub fn no_match(kind: StatementKind) -> Self {
        ClassificationError {
            kind,
            reason: "no matching report".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no usable statement table (header-only or no table found)")]
    EmptyTable,
    #[error("malformed table: {0}")]
    MalformedTable(String),
}

/// Fatal: aborts the whole run. A computed output path escaping the
/// configured root means an identifier was not sanitized, never a
/// data-quality issue.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("path {path:?} escapes output root {root:?}")]
    PathEscape { root: PathBuf, path: PathBuf },
}
