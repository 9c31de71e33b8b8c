//! Error types for the minifier and resource collection.
//!
//! Minifier errors propagate atomically (the caller gets `Err`, the partial
//! output is never handed back). Resource collection errors are local: a
//! rejected `add()` never aborts the rest of a batch, so `AddRejected` is
//! deliberately a small, non-propagating value rather than a `thiserror`
//! chain.

use thiserror::Error;

/// Why the minifier aborted.
///
/// Every variant carries the byte offset in the input where the scan
/// failed, for developer diagnostics. The offset is not part of any
/// stability contract beyond "somewhere near here".
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MinifyError {
    #[error("unterminated block comment starting at byte {0}")]
    UnterminatedComment(usize),
    #[error("unterminated string literal starting at byte {0}")]
    UnterminatedString(usize),
    #[error("unterminated regular expression literal starting at byte {0}")]
    UnterminatedRegex(usize),
    #[error("regular expression literal interrupted by a raw newline at byte {0}")]
    RegexInterruptedByNewline(usize),
}

/// Why `ResourceCollection::add` rejected a resource.
///
/// Deliberately not a `thiserror` chain: the spec treats a rejected add as
/// a local, boolean-ish outcome, not something that propagates. Callers
/// that only want the boolean can match `.is_ok()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddRejected {
    /// The collection is frozen; no further mutation is possible.
    Frozen,
    /// The resource's URL is empty.
    EmptyUrl,
    /// A resource with the same canonical URL is already present.
    Duplicate,
    /// The resource's status code is not positive.
    InvalidStatus,
    /// The configured `ResourceFilter` rejected the resource.
    FilteredOut,
}

impl std::fmt::Display for AddRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            AddRejected::Frozen => "collection is frozen",
            AddRejected::EmptyUrl => "resource URL is empty",
            AddRejected::Duplicate => "duplicate canonical URL",
            AddRejected::InvalidStatus => "non-positive status code",
            AddRejected::FilteredOut => "rejected by filter",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for AddRejected {}

/// Why an image-conversion collaborator call failed.
///
/// Per spec.md §9's "error-via-longjmp" design note: the underlying codecs
/// (`image`, `webp`) report their own failures as ordinary `Result`s, so
/// there is no FFI `longjmp` to wrap here — this enum exists purely to give
/// decode/encode failures a crate-local type instead of leaking the codec
/// crates' error types through this module's public API.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
}
