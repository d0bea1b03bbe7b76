use std::collections::HashMap;

use reflow_reader::{
    split_paragraphs, FixedMetricsViewport, FontConfig, MeasurementError, MeasuringPaginator,
    Page, PageCache, PageConstraints, ViewportAdapter, ViewportSize,
};

/// Viewport returning preset heights per paragraph text.
struct TableViewport {
    heights: HashMap<&'static str, f32>,
    size: ViewportSize,
}

impl TableViewport {
    fn new(heights: &[(&'static str, f32)], height: f32) -> Self {
        Self {
            heights: heights.iter().copied().collect(),
            size: ViewportSize::new(320.0, height),
        }
    }
}

impl ViewportAdapter for TableViewport {
    fn current_size(&self) -> ViewportSize {
        self.size
    }

    fn measure(&mut self, content: &str, _font: &FontConfig) -> f32 {
        self.heights.get(content).copied().unwrap_or(0.0)
    }
}

fn texts(pages: &[Page]) -> Vec<Vec<&str>> {
    pages
        .iter()
        .map(|p| p.paragraphs.iter().map(String::as_str).collect())
        .collect()
}

fn sample_chapter(paragraphs: usize) -> Vec<String> {
    (0..paragraphs)
        .map(|i| {
            let words = 4 + (i * 7) % 23;
            (0..words)
                .map(|w| format!("word{}", (i + w) % 13))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

#[test]
fn test_overflowing_paragraph_starts_next_page() {
    let mut paginator = MeasuringPaginator::new(TableViewport::new(
        &[("P1", 30.0), ("P2", 30.0), ("P3", 50.0)],
        60.0,
    ));
    let constraints = paginator.current_constraints(FontConfig::default());
    let pages = paginator
        .paginate(&["P1", "P2", "P3"], &constraints)
        .expect("paginate");
    assert_eq!(texts(&pages), vec![vec!["P1", "P2"], vec!["P3"]]);

    // 30 + 40 overflows 60, so P2 starts the second page.
    let mut paginator = MeasuringPaginator::new(TableViewport::new(
        &[("P1", 30.0), ("P2", 40.0), ("P3", 50.0)],
        60.0,
    ));
    let pages = paginator
        .paginate(&["P1", "P2", "P3"], &constraints)
        .expect("paginate");
    assert_eq!(texts(&pages), vec![vec!["P1"], vec!["P2"], vec!["P3"]]);
}

#[test]
fn test_oversized_paragraph_gets_its_own_page() {
    let mut paginator = MeasuringPaginator::new(TableViewport::new(
        &[("small", 20.0), ("huge", 500.0), ("tail", 20.0)],
        100.0,
    ));
    let constraints = paginator.current_constraints(FontConfig::default());
    let pages = paginator
        .paginate(&["small", "huge", "tail"], &constraints)
        .expect("paginate");
    assert_eq!(
        texts(&pages),
        vec![vec!["small"], vec!["huge"], vec!["tail"]]
    );

    let pages = paginator
        .paginate(&["huge"], &constraints)
        .expect("paginate");
    assert_eq!(texts(&pages), vec![vec!["huge"]]);
}

#[test]
fn test_pages_reproduce_paragraph_sequence() {
    let chapter = sample_chapter(120);
    let mut paginator = MeasuringPaginator::new(FixedMetricsViewport::new(360.0, 480.0));
    for scale in [90, 100, 150] {
        let constraints = paginator.current_constraints(FontConfig::scaled(scale));
        let pages = paginator.paginate(&chapter, &constraints).expect("paginate");
        assert!(pages.iter().all(|p| !p.is_empty()));
        let rejoined: Vec<String> = pages.into_iter().flat_map(|p| p.paragraphs).collect();
        assert_eq!(rejoined, chapter);
    }
    assert_eq!(paginator.viewport().open_scopes(), 0);
}

#[test]
fn test_pagination_is_deterministic() {
    let chapter = sample_chapter(60);
    let constraints = PageConstraints::new(
        ViewportSize::new(400.0, 300.0),
        FontConfig::scaled(120),
    );
    let mut a = MeasuringPaginator::new(FixedMetricsViewport::new(400.0, 300.0));
    let mut b = MeasuringPaginator::new(FixedMetricsViewport::new(400.0, 300.0));
    let first = a.paginate(&chapter, &constraints).expect("paginate");
    assert_eq!(first, a.paginate(&chapter, &constraints).expect("paginate"));
    assert_eq!(first, b.paginate(&chapter, &constraints).expect("paginate"));
}

#[test]
fn test_larger_font_never_yields_fewer_pages() {
    let chapter = sample_chapter(80);
    let mut paginator = MeasuringPaginator::new(FixedMetricsViewport::new(360.0, 480.0));
    let count = |paginator: &mut MeasuringPaginator<FixedMetricsViewport>, scale| {
        let constraints = paginator.current_constraints(FontConfig::scaled(scale));
        paginator
            .paginate(&chapter, &constraints)
            .expect("paginate")
            .len()
    };
    let small = count(&mut paginator, 90);
    let large = count(&mut paginator, 150);
    assert!(large > small, "{} pages at 150% vs {} at 90%", large, small);
}

#[test]
fn test_empty_chapter_is_one_empty_page() {
    let mut paginator = MeasuringPaginator::new(FixedMetricsViewport::new(360.0, 480.0));
    let constraints = paginator.current_constraints(FontConfig::default());
    let paragraphs = split_paragraphs("  \n\n \t \n");
    let pages = paginator
        .paginate(&paragraphs, &constraints)
        .expect("paginate");
    assert_eq!(pages.len(), 1);
    assert!(pages[0].is_empty());
}

#[test]
fn test_zero_size_viewport_is_a_measurement_error() {
    let mut paginator = MeasuringPaginator::new(FixedMetricsViewport::new(0.0, 0.0));
    let constraints = paginator.current_constraints(FontConfig::default());
    let err = paginator
        .paginate(&["text"], &constraints)
        .expect_err("degenerate size");
    assert_eq!(
        err,
        MeasurementError::DegenerateConstraints {
            width: 0.0,
            height: 0.0
        }
    );
}

#[test]
fn test_cache_misses_after_resize() {
    let chapter = sample_chapter(40);
    let mut paginator = MeasuringPaginator::new(FixedMetricsViewport::new(360.0, 480.0));
    let mut cache = PageCache::new();

    let constraints = paginator.current_constraints(FontConfig::default());
    let (tall, hit) = cache
        .get_or_paginate(&mut paginator, 0, &chapter, &constraints)
        .expect("paginate");
    assert!(!hit);

    paginator.viewport_mut().resize(360.0, 240.0);
    let constraints = paginator.current_constraints(FontConfig::default());
    let (short, hit) = cache
        .get_or_paginate(&mut paginator, 0, &chapter, &constraints)
        .expect("paginate");
    assert!(!hit);
    assert!(short.len() > tall.len());
    assert_eq!(cache.len(), 1);
}
