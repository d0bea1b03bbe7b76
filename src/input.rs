//! Input abstraction layer.
//!
//! Host events (touch, keyboard, buttons) are reduced to platform-neutral
//! [`InputEvent`]s and then to navigation intents. Swipe detection lives in
//! one place, [`GestureInterpreter`], with a configurable threshold and
//! maximum duration.

/// Axis along which swipes turn pages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Axis {
    /// Swipe left for next, right for previous.
    #[default]
    Horizontal,
    /// Swipe up for next, down for previous.
    Vertical,
}

/// Swipe recognition thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureConfig {
    /// Minimum displacement (exclusive) along the axis, in pixels.
    pub threshold_px: f32,
    /// Longest gesture still treated as a swipe; `None` disables the check.
    pub max_duration_ms: Option<u64>,
    /// Page-turn axis.
    pub axis: Axis,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            threshold_px: 50.0,
            max_duration_ms: Some(500),
            axis: Axis::Horizontal,
        }
    }
}

/// Direction of a page step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageStep {
    /// Towards the end of the book.
    Forward,
    /// Towards the start of the book.
    Backward,
}

impl PageStep {
    /// Signed page delta.
    pub fn delta(self) -> i64 {
        match self {
            PageStep::Forward => 1,
            PageStep::Backward => -1,
        }
    }
}

/// Finished pointer gesture: displacement from start to end.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Swipe {
    /// Horizontal displacement (end - start); negative is leftwards.
    pub dx: f32,
    /// Vertical displacement (end - start); negative is upwards.
    pub dy: f32,
    /// Gesture duration, when the host tracks time.
    pub duration_ms: Option<u64>,
}

/// Keyboard keys the reader reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Key {
    /// Left arrow.
    ArrowLeft,
    /// Right arrow.
    ArrowRight,
    /// Up arrow.
    ArrowUp,
    /// Down arrow.
    ArrowDown,
    /// Page up.
    PageUp,
    /// Page down.
    PageDown,
    /// Space bar.
    Space,
    /// Home.
    Home,
    /// End.
    End,
    /// Anything else.
    Other,
}

/// On-screen buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    /// "Next page".
    NextPage,
    /// "Previous page".
    PrevPage,
    /// "Next chapter".
    NextChapter,
    /// "Previous chapter".
    PrevChapter,
}

/// Logical input consumed by the controllers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    /// Completed swipe.
    Swipe(Swipe),
    /// Key press.
    Key(Key),
    /// Button press.
    Button(Button),
}

/// What an input asks the navigation layer to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavIntent {
    /// Move one page.
    Page(PageStep),
    /// Move one chapter.
    Chapter(PageStep),
    /// Jump to the first page of the chapter.
    FirstPage,
    /// Jump to the last page of the chapter.
    LastPage,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct TouchOrigin {
    x: f32,
    y: f32,
    at_ms: Option<u64>,
}

/// Turns swipes, keys and buttons into navigation intents.
#[derive(Clone, Debug, Default)]
pub struct GestureInterpreter {
    config: GestureConfig,
    origin: Option<TouchOrigin>,
}

impl GestureInterpreter {
    /// Create an interpreter with the given thresholds.
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            origin: None,
        }
    }

    /// Active thresholds.
    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Interpret a swipe along the configured axis.
    ///
    /// Displacements at or below the threshold, and gestures slower than the
    /// maximum duration, are scrolling rather than page turns.
    pub fn swipe(&self, swipe: Swipe) -> Option<PageStep> {
        let magnitude = match self.config.axis {
            Axis::Horizontal => swipe.dx,
            Axis::Vertical => swipe.dy,
        };
        self.gesture(magnitude, swipe.duration_ms)
    }

    /// Interpret a signed displacement along the configured axis.
    ///
    /// Negative (left/up) is forward, positive (right/down) is backward.
    pub fn gesture(&self, displacement: f32, duration_ms: Option<u64>) -> Option<PageStep> {
        if !displacement.is_finite() || displacement.abs() <= self.config.threshold_px {
            return None;
        }
        if let (Some(max), Some(took)) = (self.config.max_duration_ms, duration_ms) {
            if took > max {
                log::debug!("swipe took {}ms (max {}ms), ignored", took, max);
                return None;
            }
        }
        if displacement < 0.0 {
            Some(PageStep::Forward)
        } else {
            Some(PageStep::Backward)
        }
    }

    /// Record where a touch began.
    pub fn touch_start(&mut self, x: f32, y: f32, at_ms: Option<u64>) {
        self.origin = Some(TouchOrigin { x, y, at_ms });
    }

    /// Finish a touch started with [`touch_start`](Self::touch_start).
    ///
    /// Returns `None` when no touch was in progress.
    pub fn touch_end(&mut self, x: f32, y: f32, at_ms: Option<u64>) -> Option<PageStep> {
        let origin = self.origin.take()?;
        let duration_ms = match (origin.at_ms, at_ms) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        };
        self.swipe(Swipe {
            dx: x - origin.x,
            dy: y - origin.y,
            duration_ms,
        })
    }

    /// Forget a touch in progress.
    pub fn touch_cancel(&mut self) {
        self.origin = None;
    }

    /// Map any input event to an intent.
    pub fn interpret(&self, event: InputEvent) -> Option<NavIntent> {
        match event {
            InputEvent::Swipe(swipe) => self.swipe(swipe).map(NavIntent::Page),
            InputEvent::Key(key) => key_intent(key),
            InputEvent::Button(button) => Some(match button {
                Button::NextPage => NavIntent::Page(PageStep::Forward),
                Button::PrevPage => NavIntent::Page(PageStep::Backward),
                Button::NextChapter => NavIntent::Chapter(PageStep::Forward),
                Button::PrevChapter => NavIntent::Chapter(PageStep::Backward),
            }),
        }
    }
}

fn key_intent(key: Key) -> Option<NavIntent> {
    match key {
        Key::ArrowRight | Key::ArrowDown | Key::PageDown | Key::Space => {
            Some(NavIntent::Page(PageStep::Forward))
        }
        Key::ArrowLeft | Key::ArrowUp | Key::PageUp => Some(NavIntent::Page(PageStep::Backward)),
        Key::Home => Some(NavIntent::FirstPage),
        Key::End => Some(NavIntent::LastPage),
        Key::Other => None,
    }
}
