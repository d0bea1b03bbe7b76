//! Document-native reading mode.
//!
//! Some content (flowing EPUB/PDF rendered by the host) paginates itself and
//! only reports opaque location tokens. [`DocumentController`] drives such a
//! [`DocumentSurface`] with the same input handling and persistence as the
//! reflow controller, storing a [`Location::Token`].
//!
//! Every transition method takes `&mut self` and runs to completion, so two
//! document transitions can never overlap.

use async_trait::async_trait;

use crate::error::ContentLoadError;
use crate::input::{GestureInterpreter, InputEvent, NavIntent, PageStep};
use crate::model::{Location, PersistenceRecord, Settings};
use crate::navigation::{NavOutcome, ReaderOptions};
use crate::store::{PositionStore, RemoteWrites};

/// Table-of-contents entry supplied by the document surface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TocEntry {
    /// Display label.
    pub label: String,
    /// Jump target accepted by [`DocumentSurface::display`].
    pub href: String,
    /// Nested entries.
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    /// Create a leaf entry.
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }

    /// Attach nested entries.
    pub fn with_children(mut self, children: Vec<TocEntry>) -> Self {
        self.children = children;
        self
    }

    /// Entries in reading order, depth-first, paired with their depth.
    pub fn flatten(entries: &[TocEntry]) -> Vec<(usize, &TocEntry)> {
        fn walk<'a>(entries: &'a [TocEntry], depth: usize, out: &mut Vec<(usize, &'a TocEntry)>) {
            for entry in entries {
                out.push((depth, entry));
                walk(&entry.children, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(entries, 0, &mut out);
        out
    }
}

/// Host rendering surface for self-paginating documents.
#[async_trait]
pub trait DocumentSurface: Send {
    /// Show the document at `target` (a location token or TOC href), or at
    /// its beginning when `None`. Returns the token now displayed.
    async fn display(&mut self, target: Option<&str>) -> Result<String, ContentLoadError>;

    /// Advance one screen. `Ok(None)` at the end of the document.
    async fn next(&mut self) -> Result<Option<String>, ContentLoadError>;

    /// Go back one screen. `Ok(None)` at the beginning.
    async fn prev(&mut self) -> Result<Option<String>, ContentLoadError>;

    /// Table of contents.
    async fn toc(&self) -> Result<Vec<TocEntry>, ContentLoadError>;
}

/// Navigation and persistence over a [`DocumentSurface`].
pub struct DocumentController<S> {
    surface: S,
    store: PositionStore,
    options: ReaderOptions,
    gestures: GestureInterpreter,
    settings: Settings,
    token: Option<String>,
    remote_writes: RemoteWrites,
}

impl<S: DocumentSurface> DocumentController<S> {
    /// Create a controller. Call [`start`](Self::start) before reading.
    pub fn new(surface: S, store: PositionStore, options: ReaderOptions) -> Self {
        Self {
            surface,
            store,
            gestures: GestureInterpreter::new(options.gesture),
            settings: options.default_settings.normalized(),
            options,
            token: None,
            remote_writes: RemoteWrites::default(),
        }
    }

    /// Restore the stored token and display it.
    ///
    /// A token the surface rejects falls back to the beginning of the
    /// document. Returns `None` if the document cannot be displayed at all.
    pub async fn start(&mut self) -> Option<Location> {
        let key = self.options.position_key();
        let restored = match self.store.load(&key).await {
            Some(record) => {
                if let Some(settings) = record.settings {
                    self.settings = settings.normalized();
                }
                match record.location {
                    Location::Token { token } => Some(token),
                    Location::Page { chapter, page } => {
                        log::warn!(
                            "stored position chapter {} page {} is not a document token, opening at the beginning",
                            chapter + 1,
                            page + 1
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let shown = match self.surface.display(restored.as_deref()).await {
            Ok(token) => Some(token),
            Err(err) if restored.is_some() => {
                log::warn!("stored document position rejected ({}), opening at the beginning", err);
                self.display_start().await
            }
            Err(err) => {
                log::warn!("document could not be displayed: {}", err);
                None
            }
        };
        self.token = shown;
        if let Some(token) = &self.token {
            log::info!("document '{}' opened at '{}'", self.options.book_id, token);
        }
        self.location()
    }

    /// Current location, once something is displayed.
    pub fn location(&self) -> Option<Location> {
        self.token.as_ref().map(|token| Location::Token {
            token: token.clone(),
        })
    }

    /// Current location token.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Text to show while nothing could be displayed.
    pub fn placeholder(&self) -> Option<&str> {
        match self.token {
            Some(_) => None,
            None => Some(&self.options.placeholders.load_failed),
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The rendering surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Advance one screen.
    pub async fn next(&mut self) -> NavOutcome {
        self.step(PageStep::Forward).await
    }

    /// Go back one screen.
    pub async fn prev(&mut self) -> NavOutcome {
        self.step(PageStep::Backward).await
    }

    /// Jump to a TOC href or location token.
    pub async fn go_to(&mut self, target: &str) -> NavOutcome {
        match self.surface.display(Some(target)).await {
            Ok(token) => self.relocated(token).await,
            Err(err) => {
                log::warn!("jump to '{}' failed: {}", target, err);
                NavOutcome::Unchanged
            }
        }
    }

    /// Record a location reported by the surface and persist it.
    pub async fn relocated(&mut self, token: impl Into<String>) -> NavOutcome {
        let token = token.into();
        if self.token.as_deref() == Some(token.as_str()) {
            return NavOutcome::Unchanged;
        }
        self.token = Some(token);
        self.persist().await;
        match self.location() {
            Some(location) => NavOutcome::Moved(location),
            None => NavOutcome::Unchanged,
        }
    }

    /// Interpret a host input event.
    ///
    /// Page and chapter intents both move one screen; the surface owns the
    /// document's structure. "Last page" has no meaning for a flowing
    /// document and is ignored.
    pub async fn handle_input(&mut self, event: InputEvent) -> NavOutcome {
        match self.gestures.interpret(event) {
            Some(NavIntent::Page(step)) | Some(NavIntent::Chapter(step)) => self.step(step).await,
            Some(NavIntent::FirstPage) => match self.display_start().await {
                Some(token) => self.relocated(token).await,
                None => NavOutcome::Unchanged,
            },
            Some(NavIntent::LastPage) | None => NavOutcome::Ignored,
        }
    }

    /// Record the start of a touch.
    pub fn touch_start(&mut self, x: f32, y: f32, at_ms: Option<u64>) {
        self.gestures.touch_start(x, y, at_ms);
    }

    /// Finish a touch and move if it was a swipe.
    pub async fn touch_end(&mut self, x: f32, y: f32, at_ms: Option<u64>) -> NavOutcome {
        match self.gestures.touch_end(x, y, at_ms) {
            Some(step) => self.step(step).await,
            None => NavOutcome::Ignored,
        }
    }

    /// Table of contents; empty when the surface cannot supply one.
    pub async fn toc(&self) -> Vec<TocEntry> {
        self.surface.toc().await.unwrap_or_else(|err| {
            log::warn!("table of contents unavailable: {}", err);
            Vec::new()
        })
    }

    /// Replace settings and persist them with the current token.
    pub async fn apply_settings(&mut self, settings: Settings) -> NavOutcome {
        let settings = settings.normalized();
        if settings == self.settings {
            return NavOutcome::Unchanged;
        }
        self.settings = settings;
        self.persist().await;
        match self.location() {
            Some(location) => NavOutcome::Moved(location),
            None => NavOutcome::Unchanged,
        }
    }

    /// Wait for detached remote writes; returns how many succeeded.
    pub async fn flush_remote_writes(&mut self) -> usize {
        self.remote_writes.flush().await
    }

    async fn step(&mut self, step: PageStep) -> NavOutcome {
        if self.token.is_none() {
            return NavOutcome::Unchanged;
        }
        let moved = match step {
            PageStep::Forward => self.surface.next().await,
            PageStep::Backward => self.surface.prev().await,
        };
        match moved {
            Ok(Some(token)) => {
                self.settings.hint_shown = true;
                self.relocated(token).await
            }
            Ok(None) => NavOutcome::Unchanged,
            Err(err) => {
                log::warn!("document step failed: {}", err);
                NavOutcome::Unchanged
            }
        }
    }

    async fn display_start(&mut self) -> Option<String> {
        match self.surface.display(None).await {
            Ok(token) => Some(token),
            Err(err) => {
                log::warn!("document could not be displayed: {}", err);
                None
            }
        }
    }

    async fn persist(&mut self) {
        let Some(location) = self.location() else {
            return;
        };
        let record = PersistenceRecord::new(location, self.settings);
        let outcome = self
            .store
            .save(&self.options.position_key(), &record)
            .await;
        self.remote_writes.track(outcome);
    }
}
