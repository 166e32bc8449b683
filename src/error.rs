//! Error types for the streaming sheet reader.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Errors surfaced by the streaming reader.
///
/// Per-cell parse failures (`FormatSyntaxError`, `ValueParseFailure`) are
/// recovered locally and never bubble out of [`crate::SheetStreamer`] — they
/// are part of this enum only so the recovery path itself is testable and
/// so callers instrumenting with `log` can see what degraded.
#[derive(Debug, Error)]
pub enum ExcelError {
    /// A required container part is missing, or the zip stream could not be read.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// The requested sheet name has no match, including through `dynamic_sheets` aliasing.
    #[error("unknown sheet: {0}")]
    UnknownSheet(String),

    /// A cell or dimension reference failed the `[A-Z]+[1-9][0-9]*` grammar.
    #[error("invalid cell reference: {0}")]
    InvalidReference(String),

    /// `<dimension ref=...>` was required but missing or unparseable.
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),

    /// A number-format string could not be classified; recovered by falling back to General.
    #[error("format syntax error: {0}")]
    FormatSyntaxError(String),

    /// A typed cell value (`t="d"`, numeric `<v>`) failed to parse; recovered by keeping the raw string.
    #[error("value parse failure: {0}")]
    ValueParseFailure(String),

    /// Propagated from the underlying ZIP/container layer (external collaborator).
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
}
