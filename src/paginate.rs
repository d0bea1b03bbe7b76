//! Measuring paginator
//!
//! Splits a chapter's paragraphs into viewport-sized pages by asking a
//! [`ViewportAdapter`] for each paragraph's rendered height. Pagination is a
//! pure function of `(paragraphs, constraints)`: identical inputs always give
//! identical page boundaries, which is what makes [`PageCache`] sound.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::MeasurementError;
use crate::viewport::{FontConfig, MeasurementScope, ViewportAdapter, ViewportSize};

/// One viewport's worth of paragraphs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    /// Paragraphs on this page, in reading order.
    pub paragraphs: Vec<String>,
}

impl Page {
    /// Create a page from paragraphs.
    pub fn new(paragraphs: Vec<String>) -> Self {
        Self { paragraphs }
    }

    /// Check if page has no paragraphs
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Number of paragraphs on the page
    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    /// Paragraphs joined by blank lines.
    pub fn text(&self) -> String {
        self.paragraphs.join("\n\n")
    }
}

/// Page box a chapter is paginated into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageConstraints {
    /// Page width in pixels
    pub width: f32,
    /// Page height in pixels
    pub height: f32,
    /// Font configuration for measurement
    pub font: FontConfig,
}

impl PageConstraints {
    /// Constraints for a container size and font.
    pub fn new(size: ViewportSize, font: FontConfig) -> Self {
        Self {
            width: size.width,
            height: size.height,
            font,
        }
    }

    /// Reject boxes with no measurable area.
    pub fn validate(&self) -> Result<(), MeasurementError> {
        let usable = |v: f32| v.is_finite() && v > 0.0;
        if usable(self.width) && usable(self.height) {
            Ok(())
        } else {
            Err(MeasurementError::DegenerateConstraints {
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Stable fingerprint for everything that affects page boundaries.
    pub fn profile(&self) -> PaginationProfile {
        let payload = format!(
            "{:08x}|{:08x}|{:?}",
            self.width.to_bits(),
            self.height.to_bits(),
            self.font
        );
        PaginationProfile::from_bytes(payload.as_bytes())
    }
}

/// Deterministic fingerprint of pagination-affecting configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PaginationProfile(pub u64);

impl PaginationProfile {
    /// FNV-1a over arbitrary payload bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hash = 0xcbf29ce484222325u64;
        for b in bytes {
            hash ^= *b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        Self(hash)
    }
}

/// Split raw chapter text into paragraphs.
///
/// Paragraphs are separated by blank lines. Runs of whitespace inside a
/// paragraph collapse to one space and empty paragraphs are dropped.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            flush_paragraph(&mut current, &mut out);
        } else {
            current.extend(line.split_whitespace());
        }
    }
    flush_paragraph(&mut current, &mut out);
    out
}

fn flush_paragraph(words: &mut Vec<&str>, out: &mut Vec<String>) {
    if !words.is_empty() {
        out.push(words.join(" "));
        words.clear();
    }
}

/// Greedy paragraph paginator over a measurement surface.
#[derive(Debug)]
pub struct MeasuringPaginator<V> {
    viewport: V,
}

impl<V: ViewportAdapter> MeasuringPaginator<V> {
    /// Create a paginator measuring through `viewport`.
    pub fn new(viewport: V) -> Self {
        Self { viewport }
    }

    /// Shared access to the measurement surface.
    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    /// Mutable access to the measurement surface (e.g. to resize it).
    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    /// Give back the measurement surface.
    pub fn into_inner(self) -> V {
        self.viewport
    }

    /// Constraints for the viewport's current size.
    pub fn current_constraints(&self, font: FontConfig) -> PageConstraints {
        PageConstraints::new(self.viewport.current_size(), font)
    }

    /// Paginate paragraphs into pages that each fit `constraints.height`.
    ///
    /// A paragraph taller than the page gets a page of its own. An empty
    /// input yields exactly one empty page.
    pub fn paginate<S: AsRef<str>>(
        &mut self,
        paragraphs: &[S],
        constraints: &PageConstraints,
    ) -> Result<Vec<Page>, MeasurementError> {
        constraints.validate()?;
        if paragraphs.is_empty() {
            return Ok(vec![Page::default()]);
        }

        let font = constraints.font;
        let mut scope = MeasurementScope::open(&mut self.viewport, constraints.width, &font);
        let mut pages = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut used = 0.0f32;

        for (index, paragraph) in paragraphs.iter().enumerate() {
            let paragraph = paragraph.as_ref();
            let height = scope.measure(paragraph, &font);
            if !height.is_finite() || height < 0.0 {
                return Err(MeasurementError::InvalidHeight {
                    paragraph: index,
                    height,
                });
            }

            if used + height > constraints.height && !current.is_empty() {
                pages.push(Page::new(core::mem::take(&mut current)));
                used = 0.0;
            }
            current.push(paragraph.to_string());
            used += height;
        }
        if !current.is_empty() {
            pages.push(Page::new(current));
        }
        drop(scope);

        log::debug!(
            "paginated {} paragraphs into {} pages ({}x{} @ {}%)",
            paragraphs.len(),
            pages.len(),
            constraints.width,
            constraints.height,
            font.scale_percent
        );
        Ok(pages)
    }
}

#[derive(Clone, Debug)]
struct CachedPages {
    profile: PaginationProfile,
    pages: Arc<[Page]>,
}

/// One current page set per chapter, tagged with the profile it was made for.
#[derive(Clone, Debug, Default)]
pub struct PageCache {
    entries: HashMap<usize, CachedPages>,
}

impl PageCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pages for `chapter` if they were produced under `profile`.
    pub fn get(&self, chapter: usize, profile: PaginationProfile) -> Option<Arc<[Page]>> {
        self.entries
            .get(&chapter)
            .filter(|entry| entry.profile == profile)
            .map(|entry| Arc::clone(&entry.pages))
    }

    /// Make `pages` the current set for `chapter`, replacing any other.
    pub fn insert(
        &mut self,
        chapter: usize,
        profile: PaginationProfile,
        pages: Vec<Page>,
    ) -> Arc<[Page]> {
        let pages: Arc<[Page]> = pages.into();
        self.entries.insert(
            chapter,
            CachedPages {
                profile,
                pages: Arc::clone(&pages),
            },
        );
        pages
    }

    /// Return cached pages or paginate and cache them.
    ///
    /// The flag is `true` on a cache hit.
    pub fn get_or_paginate<V: ViewportAdapter, S: AsRef<str>>(
        &mut self,
        paginator: &mut MeasuringPaginator<V>,
        chapter: usize,
        paragraphs: &[S],
        constraints: &PageConstraints,
    ) -> Result<(Arc<[Page]>, bool), MeasurementError> {
        let profile = constraints.profile();
        if let Some(pages) = self.get(chapter, profile) {
            return Ok((pages, true));
        }
        let pages = paginator.paginate(paragraphs, constraints)?;
        Ok((self.insert(chapter, profile, pages), false))
    }

    /// Drop every cached page set.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Number of chapters with a current page set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::FixedMetricsViewport;

    struct LengthViewport {
        opened: usize,
        closed: usize,
    }

    impl ViewportAdapter for LengthViewport {
        fn current_size(&self) -> ViewportSize {
            ViewportSize::new(100.0, 100.0)
        }

        fn begin_measurement(&mut self, _width: f32, _font: &FontConfig) {
            self.opened += 1;
        }

        fn measure(&mut self, content: &str, _font: &FontConfig) -> f32 {
            if content == "nan" {
                return f32::NAN;
            }
            content.len() as f32
        }

        fn end_measurement(&mut self) {
            self.closed += 1;
        }
    }

    fn length_paginator() -> MeasuringPaginator<LengthViewport> {
        MeasuringPaginator::new(LengthViewport {
            opened: 0,
            closed: 0,
        })
    }

    fn constraints(height: f32) -> PageConstraints {
        PageConstraints {
            width: 100.0,
            height,
            font: FontConfig::default(),
        }
    }

    #[test]
    fn test_split_paragraphs_collapses_whitespace() {
        let text = "  First   line\ncontinues here.\n\n\n   \nSecond\tparagraph.  \n";
        assert_eq!(
            split_paragraphs(text),
            vec![
                "First line continues here.".to_string(),
                "Second paragraph.".to_string()
            ]
        );
        assert!(split_paragraphs("\n \n\t\n").is_empty());
    }

    #[test]
    fn test_exact_fit_stays_on_page() {
        let mut paginator = length_paginator();
        let paragraphs = ["aaaaa", "bbbbb", "c"];
        let pages = paginator
            .paginate(&paragraphs, &constraints(10.0))
            .expect("paginate");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].paragraphs, vec!["aaaaa", "bbbbb"]);
        assert_eq!(pages[1].paragraphs, vec!["c"]);
    }

    #[test]
    fn test_empty_input_yields_single_empty_page() {
        let mut paginator = length_paginator();
        let none: [&str; 0] = [];
        let pages = paginator
            .paginate(&none, &constraints(10.0))
            .expect("paginate");
        assert_eq!(pages, vec![Page::default()]);
    }

    #[test]
    fn test_degenerate_constraints_are_rejected() {
        let mut paginator = length_paginator();
        for (width, height) in [(0.0, 10.0), (10.0, -1.0), (f32::INFINITY, 10.0)] {
            let c = PageConstraints {
                width,
                height,
                font: FontConfig::default(),
            };
            assert!(matches!(
                paginator.paginate(&["a"], &c),
                Err(MeasurementError::DegenerateConstraints { .. })
            ));
        }
        assert_eq!(paginator.viewport().opened, 0);
    }

    #[test]
    fn test_invalid_height_releases_surface() {
        let mut paginator = length_paginator();
        let err = paginator
            .paginate(&["ok", "nan", "ok"], &constraints(10.0))
            .expect_err("nan height should fail");
        assert!(matches!(
            err,
            MeasurementError::InvalidHeight { paragraph: 1, .. }
        ));
        assert_eq!(paginator.viewport().opened, 1);
        assert_eq!(paginator.viewport().closed, 1);
    }

    #[test]
    fn test_profile_tracks_size_and_font() {
        let base = constraints(10.0);
        assert_eq!(base.profile(), constraints(10.0).profile());
        assert_ne!(base.profile(), constraints(11.0).profile());
        let bigger_font = PageConstraints {
            font: FontConfig::scaled(120),
            ..base
        };
        assert_ne!(base.profile(), bigger_font.profile());
    }

    #[test]
    fn test_cache_hit_skips_measurement() {
        let mut paginator = MeasuringPaginator::new(FixedMetricsViewport::new(240.0, 120.0));
        let mut cache = PageCache::new();
        let paragraphs = split_paragraphs("One two three.\n\nFour five six.\n\nSeven.");
        let c = paginator.current_constraints(FontConfig::default());

        let (first, hit) = cache
            .get_or_paginate(&mut paginator, 0, &paragraphs, &c)
            .expect("paginate");
        assert!(!hit);
        let measured = paginator.viewport().measurement_count();

        let (second, hit) = cache
            .get_or_paginate(&mut paginator, 0, &paragraphs, &c)
            .expect("paginate");
        assert!(hit);
        assert_eq!(first, second);
        assert_eq!(paginator.viewport().measurement_count(), measured);
    }

    #[test]
    fn test_cache_keeps_one_set_per_chapter() {
        let mut cache = PageCache::new();
        let a = constraints(10.0).profile();
        let b = constraints(20.0).profile();
        cache.insert(3, a, vec![Page::new(vec!["x".into()])]);
        cache.insert(3, b, vec![Page::new(vec!["y".into()])]);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(3, a).is_none());
        assert!(cache.get(3, b).is_some());
        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}
