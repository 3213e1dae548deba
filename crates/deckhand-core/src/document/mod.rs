//! In-memory slide deck model.
//!
//! This module contains:
//! - `Document`, `Slide`, `SlideLayout`: the deck data
//! - `edit`: proposed mutations (`PendingEdit`) and the per-session queue
//! - `commit`: the engine that drains a queue into a document
//!
//! The structural accessors here never renumber `Slide::index`. Renumbering
//! is a post-condition of a commit and is owned by `commit`.

pub mod commit;
pub mod edit;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque key/value styling bag (colors, fonts, ...).
pub type Theme = Map<String, Value>;

/// Closed set of slide layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideLayout {
    #[default]
    Blank,
    Title,
    TitleContent,
    TwoColumn,
    SectionHeader,
    ImageFull,
}

impl SlideLayout {
    /// Returns the wire name for this layout.
    pub fn as_str(self) -> &'static str {
        match self {
            SlideLayout::Blank => "blank",
            SlideLayout::Title => "title",
            SlideLayout::TitleContent => "title_content",
            SlideLayout::TwoColumn => "two_column",
            SlideLayout::SectionHeader => "section_header",
            SlideLayout::ImageFull => "image_full",
        }
    }

    pub fn all() -> &'static [SlideLayout] {
        &[
            SlideLayout::Blank,
            SlideLayout::Title,
            SlideLayout::TitleContent,
            SlideLayout::TwoColumn,
            SlideLayout::SectionHeader,
            SlideLayout::ImageFull,
        ]
    }

    /// Parses a layout name, falling back to `Blank` for anything unknown.
    pub fn parse_or_blank(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for SlideLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlideLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        SlideLayout::all()
            .iter()
            .copied()
            .find(|layout| layout.as_str() == normalized)
            .ok_or_else(|| format!("unknown slide layout '{s}'"))
    }
}

/// A single slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    /// 0-based position. Dense across the document after every commit.
    pub index: usize,
    /// Opaque markup payload.
    pub content: String,
    #[serde(default)]
    pub layout: SlideLayout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Slide {
    pub fn new(index: usize, content: impl Into<String>, layout: SlideLayout) -> Self {
        Self {
            index,
            content: content.into(),
            layout,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// A slide deck, owned by exactly one session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    #[serde(default)]
    pub slides: Vec<Slide>,
    #[serde(default)]
    pub theme: Theme,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            slides: Vec::new(),
            theme: Theme::new(),
        }
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn slide_mut(&mut self, index: usize) -> Option<&mut Slide> {
        self.slides.get_mut(index)
    }

    /// Inserts at `index`, appending when `index >= slide_count()`.
    /// Returns the position the slide landed at.
    pub fn insert_at(&mut self, index: usize, slide: Slide) -> usize {
        if index >= self.slides.len() {
            self.slides.push(slide);
            self.slides.len() - 1
        } else {
            self.slides.insert(index, slide);
            index
        }
    }

    /// Removes the slide at `index`, or returns `None` if out of range.
    pub fn remove_at(&mut self, index: usize) -> Option<Slide> {
        (index < self.slides.len()).then(|| self.slides.remove(index))
    }

    /// Moves the slide at `from` to `to`.
    ///
    /// `to` is interpreted against the sequence after removal and clamped to
    /// its end. Returns the final position, or `None` if `from` is out of range.
    pub fn move_slide(&mut self, from: usize, to: usize) -> Option<usize> {
        let slide = self.remove_at(from)?;
        Some(self.insert_at(to, slide))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck(contents: &[&str]) -> Document {
        let mut doc = Document::new("Deck");
        for (i, content) in contents.iter().enumerate() {
            doc.slides.push(Slide::new(i, *content, SlideLayout::Blank));
        }
        doc
    }

    fn contents(doc: &Document) -> Vec<&str> {
        doc.slides.iter().map(|s| s.content.as_str()).collect()
    }

    #[test]
    fn test_layout_parse_falls_back_to_blank() {
        assert_eq!(SlideLayout::parse_or_blank(Some("title")), SlideLayout::Title);
        assert_eq!(
            SlideLayout::parse_or_blank(Some("Two_Column")),
            SlideLayout::TwoColumn
        );
        assert_eq!(
            SlideLayout::parse_or_blank(Some("hexagonal")),
            SlideLayout::Blank
        );
        assert_eq!(SlideLayout::parse_or_blank(None), SlideLayout::Blank);
    }

    #[test]
    fn test_layout_serializes_snake_case() {
        let json = serde_json::to_string(&SlideLayout::TitleContent).unwrap();
        assert_eq!(json, r#""title_content""#);
    }

    #[test]
    fn test_insert_past_end_appends() {
        let mut doc = deck(&["A", "B"]);
        let at = doc.insert_at(10, Slide::new(0, "C", SlideLayout::Blank));
        assert_eq!(at, 2);
        assert_eq!(contents(&doc), ["A", "B", "C"]);
    }

    #[test]
    fn test_structural_changes_do_not_renumber() {
        let mut doc = deck(&["A", "B"]);
        doc.insert_at(0, Slide::new(7, "Z", SlideLayout::Blank));
        let indices: Vec<_> = doc.slides.iter().map(|s| s.index).collect();
        assert_eq!(indices, [7, 0, 1]);
    }

    #[test]
    fn test_move_slide_clamps_destination() {
        let mut doc = deck(&["A", "B", "C"]);
        assert_eq!(doc.move_slide(0, 99), Some(2));
        assert_eq!(contents(&doc), ["B", "C", "A"]);
        assert_eq!(doc.move_slide(5, 0), None);
    }

    #[test]
    fn test_remove_out_of_range_is_none() {
        let mut doc = deck(&["A"]);
        assert!(doc.remove_at(1).is_none());
        assert_eq!(doc.remove_at(0).map(|s| s.content), Some("A".to_string()));
        assert_eq!(doc.slide_count(), 0);
    }
}
