//! Unified error types for reflow_reader
//!
//! Provides a top-level `ReaderError` that wraps the module-specific errors,
//! plus `From` impls so `?` works across module boundaries.
//!
//! None of these errors is fatal to a reading session: the navigation layer
//! turns measurement and content failures into placeholder pages, store
//! failures into "absent"/no-op, and out-of-range requests into clamping.

use std::fmt;

/// Top-level error type for reflow_reader operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ReaderError {
    /// Pagination constraints or measurements were degenerate
    Measurement(MeasurementError),
    /// Chapter or document content could not be fetched or parsed
    ContentLoad(ContentLoadError),
    /// A persistence backend could not be used
    Store(StoreError),
    /// Navigation target outside valid bounds
    OutOfRange {
        /// Requested index.
        requested: i64,
        /// Number of valid targets.
        total: usize,
    },
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::Measurement(err) => write!(f, "Measurement error: {}", err),
            ReaderError::ContentLoad(err) => write!(f, "Content load error: {}", err),
            ReaderError::Store(err) => write!(f, "Store error: {}", err),
            ReaderError::OutOfRange { requested, total } => write!(
                f,
                "Navigation target {} out of range (valid targets: {})",
                requested, total
            ),
        }
    }
}

impl std::error::Error for ReaderError {}

/// Pagination failures.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MeasurementError {
    /// Page width/height is zero, negative, or not finite
    DegenerateConstraints {
        /// Requested page width.
        width: f32,
        /// Requested page height.
        height: f32,
    },
    /// The viewport reported a negative or non-finite paragraph height
    InvalidHeight {
        /// Index of the offending paragraph in the chapter.
        paragraph: usize,
        /// Height reported by the viewport.
        height: f32,
    },
}

impl fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementError::DegenerateConstraints { width, height } => write!(
                f,
                "page size {}x{} has no measurable area",
                width, height
            ),
            MeasurementError::InvalidHeight { paragraph, height } => write!(
                f,
                "paragraph {} measured to invalid height {}",
                paragraph, height
            ),
        }
    }
}

impl std::error::Error for MeasurementError {}

/// Content source failures.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentLoadError {
    /// Requested chapter does not exist in the source
    ChapterOutOfBounds {
        /// Requested chapter index.
        index: usize,
        /// Total number of chapters available.
        chapter_count: usize,
    },
    /// Fetch failed (network, I/O)
    Fetch(String),
    /// Content arrived but could not be interpreted
    Parse(String),
}

impl fmt::Display for ContentLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentLoadError::ChapterOutOfBounds {
                index,
                chapter_count,
            } => write!(
                f,
                "chapter index {} out of bounds (chapter count: {})",
                index, chapter_count
            ),
            ContentLoadError::Fetch(msg) => write!(f, "fetch failed: {}", msg),
            ContentLoadError::Parse(msg) => write!(f, "parse failed: {}", msg),
        }
    }
}

impl std::error::Error for ContentLoadError {}

/// Key-value backend failures.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// Backend cannot be reached or is disabled
    Unavailable {
        /// Backend name, for logs.
        backend: String,
        /// Human-readable reason.
        reason: String,
    },
    /// Backend reached but the operation failed (quota, disk, permissions)
    Io {
        /// Backend name, for logs.
        backend: String,
        /// Error description.
        message: String,
    },
    /// Stored payload could not be decoded
    Corrupt(String),
}

impl StoreError {
    /// Shorthand for an `Unavailable` error.
    pub fn unavailable(backend: &str, reason: impl Into<String>) -> Self {
        StoreError::Unavailable {
            backend: backend.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an `Io` error.
    pub fn io(backend: &str, message: impl fmt::Display) -> Self {
        StoreError::Io {
            backend: backend.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable { backend, reason } => {
                write!(f, "backend '{}' unavailable: {}", backend, reason)
            }
            StoreError::Io { backend, message } => {
                write!(f, "backend '{}' failed: {}", backend, message)
            }
            StoreError::Corrupt(msg) => write!(f, "corrupt record: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<MeasurementError> for ReaderError {
    fn from(err: MeasurementError) -> Self {
        ReaderError::Measurement(err)
    }
}

impl From<ContentLoadError> for ReaderError {
    fn from(err: ContentLoadError) -> Self {
        ReaderError::ContentLoad(err)
    }
}

impl From<StoreError> for ReaderError {
    fn from(err: StoreError) -> Self {
        ReaderError::Store(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_error_display() {
        let err = ReaderError::from(ContentLoadError::Fetch("timed out".into()));
        assert_eq!(
            format!("{}", err),
            "Content load error: fetch failed: timed out"
        );
    }

    #[test]
    fn test_degenerate_constraints_display() {
        let err = MeasurementError::DegenerateConstraints {
            width: 320.0,
            height: 0.0,
        };
        assert!(format!("{}", err).contains("320x0"));
    }

    #[test]
    fn test_store_error_wraps_into_reader_error() {
        let err: ReaderError = StoreError::unavailable("cloud", "offline").into();
        assert!(matches!(err, ReaderError::Store(StoreError::Unavailable { .. })));
        assert!(format!("{}", err).contains("cloud"));
    }
}
