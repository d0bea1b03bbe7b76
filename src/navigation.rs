//! Reading session for reflowed text.
//!
//! [`NavigationController`] owns all session state: current chapter and
//! page, settings, cached chapter text and page sets, and the transition
//! phase. One controller is built per reading session.
//!
//! # Phases
//!
//! - **Idle**: ready for any request.
//! - **Turning**: a page turn was started with
//!   [`begin_page_turn`](NavigationController::begin_page_turn) and not yet
//!   finished (the host is animating). Every other request is dropped.
//! - **Loading**: a chapter load was requested. Page turns are dropped; a
//!   newer chapter request supersedes the pending one, and the superseded
//!   result is discarded when it arrives. Dropping the pending load (for
//!   example a `go_to_chapter` future cancelled by a timeout) returns the
//!   controller to Idle.
//!
//! Every completed transition saves the new [`Location`] through the
//! [`PositionStore`].

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::content::{Chapter, ContentSource};
use crate::error::{ContentLoadError, ReaderError};
use crate::input::{GestureConfig, GestureInterpreter, InputEvent, NavIntent, PageStep};
use crate::model::{Location, PersistenceRecord, Settings, Theme};
use crate::paginate::{MeasuringPaginator, Page, PageCache};
use crate::store::{PositionStore, RemoteWrites};
use crate::viewport::{FontConfig, ViewportAdapter};

/// Texts shown instead of a page when there is nothing to paginate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaceholderText {
    /// Chapter could not be fetched.
    pub load_failed: String,
    /// Chapter has no text.
    pub no_content: String,
    /// Chapter could not be measured at the current size.
    pub measurement_failed: String,
}

impl Default for PlaceholderText {
    fn default() -> Self {
        Self {
            load_failed: "This chapter could not be loaded.".to_string(),
            no_content: "No content.".to_string(),
            measurement_failed: "This page cannot be displayed at the current size.".to_string(),
        }
    }
}

/// Session configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ReaderOptions {
    /// Book identifier; namespaces the storage key.
    pub book_id: String,
    /// Swipe thresholds.
    pub gesture: GestureConfig,
    /// Settings used when nothing was persisted.
    pub default_settings: Settings,
    /// Placeholder texts.
    pub placeholders: PlaceholderText,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            book_id: "book".to_string(),
            gesture: GestureConfig::default(),
            default_settings: Settings::default(),
            placeholders: PlaceholderText::default(),
        }
    }
}

impl ReaderOptions {
    /// Storage key for this book's reading position.
    pub fn position_key(&self) -> String {
        format!("reader:{}:position", self.book_id)
    }
}

/// Builder for ergonomic session setup.
#[derive(Clone, Debug, Default)]
pub struct ReaderBuilder {
    options: ReaderOptions,
}

impl ReaderBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the book identifier.
    pub fn book_id(mut self, book_id: impl Into<String>) -> Self {
        self.options.book_id = book_id.into();
        self
    }

    /// Set swipe thresholds.
    pub fn gesture(mut self, gesture: GestureConfig) -> Self {
        self.options.gesture = gesture;
        self
    }

    /// Set the settings used when nothing was persisted.
    pub fn default_settings(mut self, settings: Settings) -> Self {
        self.options.default_settings = settings;
        self
    }

    /// Set placeholder texts.
    pub fn placeholders(mut self, placeholders: PlaceholderText) -> Self {
        self.options.placeholders = placeholders;
        self
    }

    /// Finished options.
    pub fn options(self) -> ReaderOptions {
        self.options
    }

    /// Build a controller.
    pub fn build<V, C>(
        self,
        viewport: V,
        content: C,
        store: PositionStore,
    ) -> NavigationController<V, C>
    where
        V: ViewportAdapter,
        C: ContentSource,
    {
        NavigationController::new(viewport, content, store, self.options)
    }
}

/// Why a placeholder is shown instead of a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    /// Chapter has no paragraphs.
    NoContent,
    /// Chapter fetch failed.
    LoadFailed,
    /// Chapter could not be paginated.
    MeasurementFailed,
}

/// What the host should display.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PageView<'a> {
    /// A page of text.
    Content(&'a Page),
    /// Explanatory text in place of a page.
    Placeholder {
        /// Reason.
        kind: Placeholder,
        /// Text to display.
        text: &'a str,
    },
}

/// Result of a navigation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavOutcome {
    /// Transition completed; carries the new location.
    Moved(Location),
    /// Request was valid but changes nothing (boundary, same chapter).
    Unchanged,
    /// Another transition is in flight.
    Dropped,
    /// Input did not map to any navigation (e.g. a short swipe).
    Ignored,
    /// Chapter result arrived after a newer request superseded it.
    Stale,
}

/// Page turn in progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageTurn {
    /// Page shown before the turn.
    pub from: usize,
    /// Page shown after the turn.
    pub to: usize,
}

/// Identity of one chapter load request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChapterRequest {
    seq: u64,
    chapter: usize,
    target_page: usize,
    persist: bool,
}

impl ChapterRequest {
    /// Requested chapter index.
    pub fn chapter(&self) -> usize {
        self.chapter
    }
}

/// Pending chapter load, detached from the controller so the fetch can run
/// while newer requests are made.
///
/// Dropping the load (or the [`LoadedChapter`] it produces) before
/// [`finish_chapter`](NavigationController::finish_chapter) abandons the
/// request and the controller returns to idle.
pub struct ChapterLoad<C> {
    request: ChapterRequest,
    source: Arc<C>,
    cached: Option<Arc<Chapter>>,
    alive: Arc<()>,
}

impl<C: ContentSource> ChapterLoad<C> {
    /// The request this load answers.
    pub fn request(&self) -> ChapterRequest {
        self.request
    }

    /// Fetch the chapter (or reuse the session's cached copy).
    pub async fn fetch(self) -> LoadedChapter {
        let result = match self.cached {
            Some(chapter) => Ok(chapter),
            None => self
                .source
                .chapter(self.request.chapter)
                .await
                .map(Arc::new),
        };
        LoadedChapter {
            request: self.request,
            result,
            _alive: self.alive,
        }
    }
}

/// Fetched chapter waiting to be applied with
/// [`finish_chapter`](NavigationController::finish_chapter).
#[derive(Debug)]
pub struct LoadedChapter {
    request: ChapterRequest,
    result: Result<Arc<Chapter>, ContentLoadError>,
    _alive: Arc<()>,
}

impl LoadedChapter {
    /// The request this result answers.
    pub fn request(&self) -> ChapterRequest {
        self.request
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Turning(PageTurn),
    Loading(ChapterRequest),
}

#[derive(Clone, Debug)]
enum ChapterPages {
    Pages(Arc<[Page]>),
    Placeholder(Placeholder),
}

/// Page/chapter state machine for one reading session.
pub struct NavigationController<V, C> {
    paginator: MeasuringPaginator<V>,
    content: Arc<C>,
    store: PositionStore,
    options: ReaderOptions,
    gestures: GestureInterpreter,
    settings: Settings,
    chapters: HashMap<usize, Arc<Chapter>>,
    page_sets: PageCache,
    chapter_index: usize,
    page_index: usize,
    current: ChapterPages,
    phase: Phase,
    load_alive: Weak<()>,
    next_seq: u64,
    remote_writes: RemoteWrites,
}

impl<V, C> NavigationController<V, C>
where
    V: ViewportAdapter,
    C: ContentSource,
{
    /// Create a controller. Call [`start`](Self::start) before displaying.
    pub fn new(viewport: V, content: C, store: PositionStore, options: ReaderOptions) -> Self {
        Self {
            paginator: MeasuringPaginator::new(viewport),
            content: Arc::new(content),
            store,
            gestures: GestureInterpreter::new(options.gesture),
            settings: options.default_settings.normalized(),
            options,
            chapters: HashMap::new(),
            page_sets: PageCache::new(),
            chapter_index: 0,
            page_index: 0,
            current: ChapterPages::Placeholder(Placeholder::NoContent),
            phase: Phase::Idle,
            load_alive: Weak::new(),
            next_seq: 0,
            remote_writes: RemoteWrites::default(),
        }
    }

    /// Restore the persisted location and settings, load and paginate that
    /// chapter, and clamp the page into range.
    ///
    /// Returns the location actually shown.
    pub async fn start(&mut self) -> Location {
        let key = self.options.position_key();
        let (chapter, page) = match self.store.load(&key).await {
            Some(record) => {
                if let Some(settings) = record.settings {
                    self.settings = settings.normalized();
                }
                match record.location {
                    Location::Page { chapter, page } => (chapter, page),
                    Location::Token { token } => {
                        log::warn!(
                            "stored position '{}' is a document token, starting at the beginning",
                            token
                        );
                        (0, 0)
                    }
                }
            }
            None => (0, 0),
        };

        let count = self.chapter_count();
        if count == 0 {
            log::info!("book '{}' has no chapters", self.options.book_id);
            self.phase = Phase::Idle;
            self.chapter_index = 0;
            self.page_index = 0;
            self.current = ChapterPages::Placeholder(Placeholder::NoContent);
            return self.location();
        }

        let load = self.issue_request(chapter.min(count - 1), page, false);
        let loaded = load.fetch().await;
        if self.finish_chapter(loaded).await == NavOutcome::Stale {
            log::warn!("startup load of chapter {} was superseded", chapter + 1);
        }
        log::info!(
            "session for '{}' started at chapter {} page {}/{} (stored page {})",
            self.options.book_id,
            self.chapter_index + 1,
            self.page_index + 1,
            self.total_pages(),
            page + 1
        );
        self.location()
    }

    /// Current location.
    pub fn location(&self) -> Location {
        Location::Page {
            chapter: self.chapter_index,
            page: self.page_index,
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Session options.
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Current chapter index.
    pub fn chapter_index(&self) -> usize {
        self.chapter_index
    }

    /// Current page index within the chapter.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Number of chapters in the content source.
    pub fn chapter_count(&self) -> usize {
        self.content.chapter_count()
    }

    /// Pages in the current chapter; a placeholder counts as one page.
    pub fn total_pages(&self) -> usize {
        match &self.current {
            ChapterPages::Pages(pages) => pages.len().max(1),
            ChapterPages::Placeholder(_) => 1,
        }
    }

    /// `(page number, total pages)`, 1-based, for a page indicator.
    pub fn page_indicator(&self) -> (usize, usize) {
        (self.page_index + 1, self.total_pages())
    }

    /// Whole-book progress ratio in `[0.0, 1.0]`.
    pub fn book_progress(&self) -> f32 {
        let count = self.chapter_count();
        if count == 0 {
            return 0.0;
        }
        let in_chapter = (self.page_index + 1) as f32 / self.total_pages() as f32;
        ((self.chapter_index as f32 + in_chapter) / count as f32).clamp(0.0, 1.0)
    }

    /// Title of the current chapter, when the source provides one.
    pub fn chapter_title(&self) -> Option<&str> {
        self.chapters
            .get(&self.chapter_index)
            .and_then(|chapter| chapter.title.as_deref())
    }

    /// Content to display right now.
    pub fn current_view(&self) -> PageView<'_> {
        let placeholder = |kind: Placeholder| PageView::Placeholder {
            kind,
            text: self.placeholder_text(kind),
        };
        match &self.current {
            ChapterPages::Pages(pages) => match pages.get(self.page_index) {
                Some(page) if !page.is_empty() => PageView::Content(page),
                _ => placeholder(Placeholder::NoContent),
            },
            ChapterPages::Placeholder(kind) => placeholder(*kind),
        }
    }

    /// No transition in flight.
    pub fn is_idle(&self) -> bool {
        self.phase() == Phase::Idle
    }

    /// Page turn in progress, if any.
    pub fn pending_turn(&self) -> Option<PageTurn> {
        match self.phase() {
            Phase::Turning(turn) => Some(turn),
            _ => None,
        }
    }

    /// Chapter load in progress, if any.
    pub fn pending_chapter(&self) -> Option<ChapterRequest> {
        match self.phase() {
            Phase::Loading(request) => Some(request),
            _ => None,
        }
    }

    /// The measurement surface (e.g. to resize it before
    /// [`refresh_viewport`](Self::refresh_viewport)).
    pub fn viewport_mut(&mut self) -> &mut V {
        self.paginator.viewport_mut()
    }

    /// The measurement surface.
    pub fn viewport(&self) -> &V {
        self.paginator.viewport()
    }

    /// Position store used by this session.
    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    /// Start a page turn of `delta` pages.
    ///
    /// The target is clamped into the chapter. Returns `None` when the
    /// request is dropped (not idle) or would not move (boundary).
    pub fn begin_page_turn(&mut self, delta: i64) -> Option<PageTurn> {
        if !self.is_idle() {
            log::debug!("page turn {:+} dropped: transition in flight", delta);
            return None;
        }
        if let Phase::Loading(abandoned) = self.phase {
            log::debug!(
                "chapter {} load was abandoned before it finished",
                abandoned.chapter + 1
            );
            self.phase = Phase::Idle;
        }
        let last = self.total_pages() as i64 - 1;
        let target = (self.page_index as i64).saturating_add(delta).clamp(0, last) as usize;
        if target == self.page_index {
            return None;
        }
        let turn = PageTurn {
            from: self.page_index,
            to: target,
        };
        self.phase = Phase::Turning(turn);
        Some(turn)
    }

    /// Complete the page turn started by
    /// [`begin_page_turn`](Self::begin_page_turn) and persist it.
    pub async fn finish_page_turn(&mut self) -> NavOutcome {
        let Phase::Turning(turn) = self.phase else {
            return NavOutcome::Unchanged;
        };
        self.phase = Phase::Idle;
        self.page_index = turn.to.min(self.total_pages() - 1);
        self.settings.hint_shown = true;
        self.persist().await;
        NavOutcome::Moved(self.location())
    }

    /// Move `delta` pages within the current chapter, saturating at the
    /// first and last page.
    pub async fn go_to_page(&mut self, delta: i64) -> NavOutcome {
        if !self.is_idle() {
            log::debug!("page move {:+} dropped: transition in flight", delta);
            return NavOutcome::Dropped;
        }
        match self.begin_page_turn(delta) {
            Some(_) => self.finish_page_turn().await,
            None => NavOutcome::Unchanged,
        }
    }

    /// Request chapter `index` without waiting for it.
    ///
    /// The index is clamped into the book. Returns `None` when the request
    /// is dropped (page turn in flight), names the chapter already shown,
    /// or the book is empty. A pending request for another chapter is
    /// superseded.
    pub fn request_chapter(&mut self, index: usize) -> Option<ChapterLoad<C>> {
        match self.chapter_request_block(index) {
            Some(_) => None,
            None => {
                let index = index.min(self.chapter_count() - 1);
                Some(self.issue_request(index, 0, true))
            }
        }
    }

    /// Apply a fetched chapter if it answers the newest request.
    ///
    /// Superseded results are discarded and reported as
    /// [`NavOutcome::Stale`]. A failed fetch shows a placeholder page.
    pub async fn finish_chapter(&mut self, loaded: LoadedChapter) -> NavOutcome {
        let LoadedChapter { request, result, .. } = loaded;
        if self.phase != Phase::Loading(request) {
            log::debug!(
                "discarding stale load of chapter {} (request #{})",
                request.chapter + 1,
                request.seq
            );
            return NavOutcome::Stale;
        }

        let loaded_ok = match result {
            Ok(chapter) => {
                self.chapters.insert(request.chapter, chapter);
                self.current = self.layout_chapter(request.chapter);
                true
            }
            Err(err) => {
                log::warn!("chapter {} failed to load: {}", request.chapter + 1, err);
                self.current = ChapterPages::Placeholder(Placeholder::LoadFailed);
                false
            }
        };
        self.chapter_index = request.chapter;
        self.page_index = request.target_page.min(self.total_pages() - 1);
        self.phase = Phase::Idle;

        if request.persist && loaded_ok {
            self.persist().await;
        }
        NavOutcome::Moved(self.location())
    }

    /// Load and show chapter `index` at its first page.
    pub async fn go_to_chapter(&mut self, index: usize) -> NavOutcome {
        if let Some(outcome) = self.chapter_request_block(index) {
            return outcome;
        }
        let index = index.min(self.chapter_count() - 1);
        let load = self.issue_request(index, 0, true);
        let loaded = load.fetch().await;
        self.finish_chapter(loaded).await
    }

    /// Like [`go_to_chapter`](Self::go_to_chapter), but an index past the
    /// last chapter and a failed fetch are reported instead of absorbed.
    ///
    /// A failed fetch still leaves the placeholder page displayed.
    pub async fn try_go_to_chapter(&mut self, index: usize) -> Result<NavOutcome, ReaderError> {
        let count = self.chapter_count();
        if index >= count {
            return Err(ReaderError::OutOfRange {
                requested: index as i64,
                total: count,
            });
        }
        if let Some(outcome) = self.chapter_request_block(index) {
            return Ok(outcome);
        }
        let load = self.issue_request(index, 0, true);
        let loaded = load.fetch().await;
        let failure = loaded.result.as_ref().err().cloned();
        let outcome = self.finish_chapter(loaded).await;
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(outcome),
        }
    }

    /// Like [`go_to_page`](Self::go_to_page), but a target outside the
    /// chapter is reported instead of clamped.
    pub async fn try_go_to_page(&mut self, delta: i64) -> Result<NavOutcome, ReaderError> {
        let total = self.total_pages();
        let target = (self.page_index as i64).saturating_add(delta);
        if target < 0 || target >= total as i64 {
            return Err(ReaderError::OutOfRange {
                requested: target,
                total,
            });
        }
        Ok(self.go_to_page(delta).await)
    }

    /// Step one chapter, saturating at the first and last chapter.
    pub async fn step_chapter(&mut self, step: PageStep) -> NavOutcome {
        let target = self.chapter_index as i64 + step.delta();
        if target < 0 || target >= self.chapter_count() as i64 {
            return NavOutcome::Unchanged;
        }
        self.go_to_chapter(target as usize).await
    }

    /// Interpret a host input event and navigate accordingly.
    pub async fn handle_input(&mut self, event: InputEvent) -> NavOutcome {
        let Some(intent) = self.gestures.interpret(event) else {
            return NavOutcome::Ignored;
        };
        self.apply_intent(intent).await
    }

    /// Record the start of a touch.
    pub fn touch_start(&mut self, x: f32, y: f32, at_ms: Option<u64>) {
        self.gestures.touch_start(x, y, at_ms);
    }

    /// Finish a touch and turn the page if it was a swipe.
    pub async fn touch_end(&mut self, x: f32, y: f32, at_ms: Option<u64>) -> NavOutcome {
        match self.gestures.touch_end(x, y, at_ms) {
            Some(step) => self.go_to_page(step.delta()).await,
            None => NavOutcome::Ignored,
        }
    }

    /// Replace the settings; re-paginates and clamps when layout changes.
    pub async fn apply_settings(&mut self, settings: Settings) -> NavOutcome {
        let settings = settings.normalized();
        if settings == self.settings {
            return NavOutcome::Unchanged;
        }
        let relayout = self.settings.affects_layout(&settings);
        self.settings = settings;
        if relayout {
            self.page_sets.invalidate_all();
            self.relayout_current();
        }
        self.persist().await;
        NavOutcome::Moved(self.location())
    }

    /// Change the font scale (clamped into range).
    pub async fn set_font_scale(&mut self, percent: u16) -> NavOutcome {
        self.apply_settings(self.settings.with_font_scale(percent)).await
    }

    /// Change the theme.
    pub async fn set_theme(&mut self, theme: Theme) -> NavOutcome {
        self.apply_settings(self.settings.with_theme(theme)).await
    }

    /// Collapse or expand the info panel.
    ///
    /// The page box is re-read from the viewport, so the host resizes the
    /// viewport for the new panel state before calling this.
    pub async fn set_panel_collapsed(&mut self, collapsed: bool) -> NavOutcome {
        self.apply_settings(self.settings.with_panel_collapsed(collapsed))
            .await
    }

    /// Re-read the viewport size and re-paginate if it changed.
    pub async fn refresh_viewport(&mut self) -> NavOutcome {
        let before = self.page_index;
        self.relayout_current();
        if self.page_index == before {
            return NavOutcome::Unchanged;
        }
        self.persist().await;
        NavOutcome::Moved(self.location())
    }

    /// Wait for detached remote writes; returns how many succeeded.
    pub async fn flush_remote_writes(&mut self) -> usize {
        self.remote_writes.flush().await
    }

    async fn apply_intent(&mut self, intent: NavIntent) -> NavOutcome {
        match intent {
            NavIntent::Page(step) => self.go_to_page(step.delta()).await,
            NavIntent::Chapter(step) => self.step_chapter(step).await,
            NavIntent::FirstPage => self.go_to_page(-(self.page_index as i64)).await,
            NavIntent::LastPage => self.go_to_page(self.total_pages() as i64).await,
        }
    }

    fn chapter_request_block(&self, index: usize) -> Option<NavOutcome> {
        if matches!(self.phase, Phase::Turning(_)) {
            log::debug!("chapter request {} dropped: page turn in flight", index + 1);
            return Some(NavOutcome::Dropped);
        }
        let count = self.chapter_count();
        if count == 0 {
            return Some(NavOutcome::Unchanged);
        }
        let index = index.min(count - 1);
        let showing = self.is_idle()
            && index == self.chapter_index
            && !matches!(self.current, ChapterPages::Placeholder(Placeholder::LoadFailed))
            && self.chapters.contains_key(&index);
        if showing {
            return Some(NavOutcome::Unchanged);
        }
        None
    }

    fn issue_request(&mut self, chapter: usize, target_page: usize, persist: bool) -> ChapterLoad<C> {
        self.next_seq += 1;
        let request = ChapterRequest {
            seq: self.next_seq,
            chapter,
            target_page,
            persist,
        };
        if let Phase::Loading(previous) = self.phase() {
            log::debug!(
                "chapter {} request supersedes pending chapter {}",
                chapter + 1,
                previous.chapter + 1
            );
        }
        let alive = Arc::new(());
        self.load_alive = Arc::downgrade(&alive);
        self.phase = Phase::Loading(request);
        ChapterLoad {
            request,
            source: Arc::clone(&self.content),
            cached: self.chapters.get(&chapter).cloned(),
            alive,
        }
    }

    /// Effective phase: a load whose [`ChapterLoad`] and [`LoadedChapter`]
    /// were both dropped no longer holds the controller.
    fn phase(&self) -> Phase {
        match self.phase {
            Phase::Loading(_) if self.load_alive.strong_count() == 0 => Phase::Idle,
            phase => phase,
        }
    }

    fn relayout_current(&mut self) {
        if matches!(self.current, ChapterPages::Placeholder(Placeholder::LoadFailed)) {
            return;
        }
        self.current = self.layout_chapter(self.chapter_index);
        self.page_index = self.page_index.min(self.total_pages() - 1);
    }

    fn layout_chapter(&mut self, chapter: usize) -> ChapterPages {
        let Some(text) = self.chapters.get(&chapter).cloned() else {
            return ChapterPages::Placeholder(Placeholder::LoadFailed);
        };
        let constraints = self
            .paginator
            .current_constraints(FontConfig::from_settings(&self.settings));
        match self.page_sets.get_or_paginate(
            &mut self.paginator,
            chapter,
            &text.paragraphs,
            &constraints,
        ) {
            Ok((pages, hit)) => {
                if hit {
                    log::debug!("chapter {} pages served from cache", chapter + 1);
                }
                ChapterPages::Pages(pages)
            }
            Err(err) => {
                log::warn!("chapter {} could not be paginated: {}", chapter + 1, err);
                ChapterPages::Placeholder(Placeholder::MeasurementFailed)
            }
        }
    }

    fn placeholder_text(&self, kind: Placeholder) -> &str {
        let texts = &self.options.placeholders;
        match kind {
            Placeholder::NoContent => &texts.no_content,
            Placeholder::LoadFailed => &texts.load_failed,
            Placeholder::MeasurementFailed => &texts.measurement_failed,
        }
    }

    async fn persist(&mut self) {
        if matches!(self.current, ChapterPages::Placeholder(Placeholder::LoadFailed)) {
            log::debug!("not saving position inside an unloaded chapter");
            return;
        }
        let record = PersistenceRecord::new(self.location(), self.settings);
        let outcome = self
            .store
            .save(&self.options.position_key(), &record)
            .await;
        self.remote_writes.track(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StaticContentSource;
    use crate::viewport::FixedMetricsViewport;

    fn book(chapters: usize, paragraphs: usize) -> StaticContentSource {
        let chapters = (0..chapters)
            .map(|c| {
                let text: Vec<String> = (0..paragraphs)
                    .map(|p| format!("Chapter {} paragraph {} has a few words.", c, p))
                    .collect();
                Chapter::from_text(c, &text.join("\n\n"))
            })
            .collect();
        StaticContentSource::new(chapters)
    }

    fn controller(
        source: StaticContentSource,
    ) -> NavigationController<FixedMetricsViewport, StaticContentSource> {
        // One 34px line per paragraph at 100%: two paragraphs per 100px page.
        ReaderBuilder::new().book_id("t").build(
            FixedMetricsViewport::new(600.0, 100.0),
            source,
            PositionStore::in_memory(),
        )
    }

    #[tokio::test]
    async fn test_start_without_record_opens_first_page() {
        let mut ctl = controller(book(2, 5));
        assert_eq!(ctl.start().await, Location::start());
        assert!(ctl.is_idle());
        assert!(matches!(ctl.current_view(), PageView::Content(_)));
    }

    #[tokio::test]
    async fn test_turn_in_flight_drops_other_requests() {
        let mut ctl = controller(book(2, 10));
        ctl.start().await;
        let turn = ctl.begin_page_turn(1).expect("turn starts");
        assert_eq!(turn, PageTurn { from: 0, to: 1 });

        assert_eq!(ctl.go_to_page(1).await, NavOutcome::Dropped);
        assert_eq!(ctl.go_to_chapter(1).await, NavOutcome::Dropped);
        assert!(ctl.request_chapter(1).is_none());

        assert_eq!(
            ctl.finish_page_turn().await,
            NavOutcome::Moved(Location::Page {
                chapter: 0,
                page: 1
            })
        );
        assert!(ctl.settings().hint_shown);
    }

    #[tokio::test]
    async fn test_same_chapter_is_unchanged() {
        let mut ctl = controller(book(2, 3));
        ctl.start().await;
        assert_eq!(ctl.go_to_chapter(0).await, NavOutcome::Unchanged);
        assert_eq!(ctl.step_chapter(PageStep::Backward).await, NavOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_empty_book_shows_no_content() {
        let mut ctl = controller(StaticContentSource::default());
        assert_eq!(ctl.start().await, Location::start());
        assert_eq!(ctl.total_pages(), 1);
        assert!(matches!(
            ctl.current_view(),
            PageView::Placeholder {
                kind: Placeholder::NoContent,
                ..
            }
        ));
        assert_eq!(ctl.go_to_chapter(3).await, NavOutcome::Unchanged);
        assert_eq!(ctl.book_progress(), 0.0);
    }
}
