//! reflow_reader -- Reflow pagination and position persistence for reading clients
//!
//! Splits chapter text into viewport-sized pages by measuring rendered
//! height, keeps the reader's last location durable across a remote and a
//! local key-value store, and drives page/chapter navigation from touch,
//! keyboard and button input without ever running two transitions at once.
//!
//! # Features
//!
//! - `cli` -- the `reflow-reader` terminal reader binary
//!
//! # Layers
//!
//! - [`viewport`]: measurement surface supplied by the host
//! - [`paginate`]: greedy measuring paginator and page cache
//! - [`store`]: key-value backends and the precedence policy
//! - [`input`]: gesture, key and button interpretation
//! - [`navigation`]: reflow reading session state machine
//! - [`document`]: the same session model over a self-paginating document

#![warn(missing_docs)]
#![deny(clippy::large_enum_variant, clippy::redundant_clone)]
#![warn(
    clippy::box_collection,
    clippy::needless_collect,
    clippy::map_clone,
    clippy::implicit_clone,
    clippy::inefficient_to_string
)]

pub mod content;
pub mod document;
pub mod error;
pub mod input;
pub mod model;
pub mod navigation;
pub mod paginate;
pub mod store;
pub mod viewport;

// Re-export key types for convenience
pub use content::{Chapter, ContentSource, StaticContentSource};
pub use document::{DocumentController, DocumentSurface, TocEntry};
pub use error::{ContentLoadError, MeasurementError, ReaderError, StoreError};
pub use input::{
    Axis, Button, GestureConfig, GestureInterpreter, InputEvent, Key, NavIntent, PageStep, Swipe,
};
pub use model::{
    Location, PersistenceRecord, Settings, Theme, FONT_SCALE_DEFAULT, FONT_SCALE_MAX,
    FONT_SCALE_MIN,
};
pub use navigation::{
    ChapterLoad, ChapterRequest, LoadedChapter, NavOutcome, NavigationController, PageTurn,
    PageView, Placeholder, PlaceholderText, ReaderBuilder, ReaderOptions,
};
pub use paginate::{
    split_paragraphs, MeasuringPaginator, Page, PageCache, PageConstraints, PaginationProfile,
};
pub use store::{
    FileBackend, KvBackend, MemoryBackend, PositionStore, RecordSource, RemoteWrite,
    RemoteWrites, SaveOutcome, UnavailableBackend,
};
pub use viewport::{FixedMetricsViewport, FontConfig, FontMetrics, ViewportAdapter, ViewportSize};
