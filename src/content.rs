//! Chapter content sources.

use async_trait::async_trait;

use crate::error::ContentLoadError;
use crate::paginate::split_paragraphs;

/// One chapter of reflowable text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Chapter {
    /// 0-based chapter index.
    pub index: usize,
    /// Optional display title.
    pub title: Option<String>,
    /// Paragraphs in reading order.
    pub paragraphs: Vec<String>,
}

impl Chapter {
    /// Build a chapter from raw text, splitting paragraphs on blank lines.
    pub fn from_text(index: usize, text: &str) -> Self {
        Self {
            index,
            title: None,
            paragraphs: split_paragraphs(text),
        }
    }

    /// Set the display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Supplier of chapter text (network, disk, bundled).
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Number of chapters.
    fn chapter_count(&self) -> usize;

    /// Fetch one chapter.
    async fn chapter(&self, index: usize) -> Result<Chapter, ContentLoadError>;
}

/// Chapters held in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticContentSource {
    chapters: Vec<Chapter>,
}

impl StaticContentSource {
    /// Line that separates chapters in a plain-text book.
    pub const CHAPTER_SEPARATOR: &'static str = "***";

    /// Source over prepared chapters; indexes are renumbered in order.
    pub fn new(chapters: Vec<Chapter>) -> Self {
        let chapters = chapters
            .into_iter()
            .enumerate()
            .map(|(index, chapter)| Chapter { index, ..chapter })
            .collect();
        Self { chapters }
    }

    /// Split a plain-text book into chapters.
    ///
    /// Chapters are separated by a form feed or by a line holding only
    /// `***`. Chapters without any paragraph are dropped.
    pub fn from_book_text(text: &str) -> Self {
        let mut raw_chapters = Vec::new();
        let mut current = String::new();
        for line in text.lines() {
            if line.trim() == Self::CHAPTER_SEPARATOR {
                raw_chapters.push(core::mem::take(&mut current));
                continue;
            }
            for (i, part) in line.split('\u{000C}').enumerate() {
                if i > 0 {
                    raw_chapters.push(core::mem::take(&mut current));
                }
                current.push_str(part);
            }
            current.push('\n');
        }
        raw_chapters.push(current);

        let chapters = raw_chapters
            .iter()
            .map(|raw| Chapter::from_text(0, raw))
            .filter(|chapter| !chapter.paragraphs.is_empty())
            .collect();
        Self::new(chapters)
    }

    /// All chapters.
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }
}

#[async_trait]
impl ContentSource for StaticContentSource {
    fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    async fn chapter(&self, index: usize) -> Result<Chapter, ContentLoadError> {
        self.chapters
            .get(index)
            .cloned()
            .ok_or(ContentLoadError::ChapterOutOfBounds {
                index,
                chapter_count: self.chapters.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_book_text_splits_on_separators() {
        let text = "Opening words.\n\nSecond paragraph.\n***\nChapter two.\n\u{000C}Chapter three.\n";
        let source = StaticContentSource::from_book_text(text);
        assert_eq!(source.chapter_count(), 3);
        assert_eq!(
            source.chapters()[0].paragraphs,
            vec!["Opening words.", "Second paragraph."]
        );
        assert_eq!(source.chapters()[1].paragraphs, vec!["Chapter two."]);
        assert_eq!(source.chapters()[2].index, 2);
        assert_eq!(source.chapters()[2].paragraphs, vec!["Chapter three."]);
    }

    #[test]
    fn test_blank_chapters_are_dropped() {
        let source = StaticContentSource::from_book_text("***\n\n***\nOnly one.\n***\n");
        assert_eq!(source.chapter_count(), 1);
    }

    #[tokio::test]
    async fn test_out_of_bounds_chapter() {
        let source = StaticContentSource::new(vec![Chapter::from_text(7, "Hello.")]);
        assert_eq!(source.chapter(0).await.expect("chapter").index, 0);
        assert!(matches!(
            source.chapter(1).await,
            Err(ContentLoadError::ChapterOutOfBounds {
                index: 1,
                chapter_count: 1
            })
        ));
    }
}
