//! Measurement surface used by the paginator.
//!
//! The host view implements [`ViewportAdapter`] so pagination never depends
//! on a particular rendering technology. [`FixedMetricsViewport`] is a
//! ready-made adapter with fixed per-character advances, used by the CLI,
//! tests and benches.

use crate::model::{Settings, Theme, FONT_SCALE_DEFAULT};

/// Visible container size in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportSize {
    /// Container width.
    pub width: f32,
    /// Container height.
    pub height: f32,
}

impl ViewportSize {
    /// Create a size.
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Font configuration that changes measured heights.
///
/// The theme is carried because a host may pair each theme with its own
/// font face; adapters that render every theme with one face ignore it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FontConfig {
    /// Font scale in percent.
    pub scale_percent: u16,
    /// Active theme.
    pub theme: Theme,
}

impl FontConfig {
    /// Default theme at `scale_percent`.
    pub const fn scaled(scale_percent: u16) -> Self {
        Self {
            scale_percent,
            theme: Theme::Light,
        }
    }

    /// Font configuration derived from reader settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            scale_percent: settings.font_scale,
            theme: settings.theme,
        }
    }

    /// Scale as a multiplier (`1.0` at 100%).
    pub fn scale(self) -> f32 {
        f32::from(self.scale_percent) / 100.0
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self::scaled(FONT_SCALE_DEFAULT)
    }
}

/// Host-supplied measurement surface.
///
/// `measure` must not touch the visible surface and must be cheap enough to
/// call once per paragraph in a tight loop. The paginator brackets every run
/// with `begin_measurement` / `end_measurement`; `end_measurement` is called
/// on every exit path, so any temporary off-screen state can be released
/// there.
pub trait ViewportAdapter {
    /// Current visible container size.
    fn current_size(&self) -> ViewportSize;

    /// Prepare an off-screen surface of the given width.
    fn begin_measurement(&mut self, _width: f32, _font: &FontConfig) {}

    /// Rendered height of `content` at the prepared width.
    fn measure(&mut self, content: &str, font: &FontConfig) -> f32;

    /// Release whatever `begin_measurement` set up.
    fn end_measurement(&mut self) {}
}

impl<T: ViewportAdapter + ?Sized> ViewportAdapter for &mut T {
    fn current_size(&self) -> ViewportSize {
        (**self).current_size()
    }

    fn begin_measurement(&mut self, width: f32, font: &FontConfig) {
        (**self).begin_measurement(width, font)
    }

    fn measure(&mut self, content: &str, font: &FontConfig) -> f32 {
        (**self).measure(content, font)
    }

    fn end_measurement(&mut self) {
        (**self).end_measurement()
    }
}

impl<T: ViewportAdapter + ?Sized> ViewportAdapter for Box<T> {
    fn current_size(&self) -> ViewportSize {
        (**self).current_size()
    }

    fn begin_measurement(&mut self, width: f32, font: &FontConfig) {
        (**self).begin_measurement(width, font)
    }

    fn measure(&mut self, content: &str, font: &FontConfig) -> f32 {
        (**self).measure(content, font)
    }

    fn end_measurement(&mut self) {
        (**self).end_measurement()
    }
}

/// Open measurement surface; released on drop.
pub(crate) struct MeasurementScope<'a, V: ViewportAdapter + ?Sized> {
    viewport: &'a mut V,
}

impl<'a, V: ViewportAdapter + ?Sized> MeasurementScope<'a, V> {
    pub(crate) fn open(viewport: &'a mut V, width: f32, font: &FontConfig) -> Self {
        viewport.begin_measurement(width, font);
        Self { viewport }
    }

    pub(crate) fn measure(&mut self, content: &str, font: &FontConfig) -> f32 {
        self.viewport.measure(content, font)
    }
}

impl<V: ViewportAdapter + ?Sized> Drop for MeasurementScope<'_, V> {
    fn drop(&mut self) {
        self.viewport.end_measurement();
    }
}

/// Font metrics for fixed-advance measurement, at 100% scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FontMetrics {
    /// Advance width of every character in pixels
    pub char_width: f32,
    /// Line box height in pixels
    pub line_height: f32,
    /// Vertical gap after each paragraph in pixels
    pub paragraph_gap: f32,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            char_width: 10.0,
            line_height: 26.0,
            paragraph_gap: 8.0,
        }
    }
}

/// Viewport that measures by greedy word wrapping with fixed advances.
#[derive(Clone, Debug)]
pub struct FixedMetricsViewport {
    size: ViewportSize,
    metrics: FontMetrics,
    padding: f32,
    surface_width: Option<f32>,
    open_scopes: usize,
    measurements: usize,
}

impl FixedMetricsViewport {
    /// Default horizontal padding inside the page container
    pub const DEFAULT_PADDING: f32 = 20.0;

    /// Create a viewport with the given container size and default metrics.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            size: ViewportSize::new(width, height),
            metrics: FontMetrics::default(),
            padding: Self::DEFAULT_PADDING,
            surface_width: None,
            open_scopes: 0,
            measurements: 0,
        }
    }

    /// Set font metrics
    pub fn with_metrics(mut self, metrics: FontMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set horizontal padding (applied on both sides)
    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding.max(0.0);
        self
    }

    /// Change the container size, as a host resize would.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.size = ViewportSize::new(width, height);
    }

    /// Number of measurement surfaces currently open.
    pub fn open_scopes(&self) -> usize {
        self.open_scopes
    }

    /// Total `measure` calls so far.
    pub fn measurement_count(&self) -> usize {
        self.measurements
    }

    /// Number of wrapped lines `text` occupies at `width`.
    pub fn line_count(&self, text: &str, width: f32, font: &FontConfig) -> usize {
        let advance = (self.metrics.char_width * font.scale()).max(f32::EPSILON);
        let usable = (width - self.padding * 2.0).max(advance);
        let per_line = ((usable / advance).floor() as usize).max(1);

        let mut lines = 0usize;
        let mut current = 0usize;
        for word in text.split_whitespace() {
            let len = word.chars().count();
            let needed = if current == 0 { len } else { current + 1 + len };
            if needed <= per_line {
                current = needed;
                continue;
            }
            if current > 0 {
                lines += 1;
            }
            // Words wider than a line are broken at the line width.
            let full = len / per_line;
            let rest = len % per_line;
            if rest == 0 {
                lines += full - 1;
                current = per_line;
            } else {
                lines += full;
                current = rest;
            }
        }
        if current > 0 {
            lines += 1;
        }
        lines
    }
}

impl ViewportAdapter for FixedMetricsViewport {
    fn current_size(&self) -> ViewportSize {
        self.size
    }

    fn begin_measurement(&mut self, width: f32, _font: &FontConfig) {
        self.surface_width = Some(width);
        self.open_scopes += 1;
    }

    fn measure(&mut self, content: &str, font: &FontConfig) -> f32 {
        self.measurements += 1;
        let width = self.surface_width.unwrap_or(self.size.width);
        let lines = self.line_count(content, width, font);
        if lines == 0 {
            return 0.0;
        }
        let scale = font.scale();
        lines as f32 * self.metrics.line_height * scale + self.metrics.paragraph_gap * scale
    }

    fn end_measurement(&mut self) {
        self.surface_width = None;
        self.open_scopes = self.open_scopes.saturating_sub(1);
    }
}
