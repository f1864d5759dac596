//! Comment threads and the bidirectional markup/comment selection.

use std::sync::LazyLock;

use regex::Regex;

use crate::markup::{Comment, CommentId, StrokeId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub markup: Option<StrokeId>,
    pub comment: Option<CommentId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.markup.is_none() && self.comment.is_none()
    }
}

/// Comments of one image plus the current selection.
#[derive(Debug, Default)]
pub struct CommentLinker {
    comments: Vec<Comment>,
    selection: Selection,
}

impl CommentLinker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn get(&self, id: &CommentId) -> Option<&Comment> {
        self.comments.iter().find(|comment| &comment.id == id)
    }

    pub fn for_stroke<'a>(&'a self, stroke: &'a StrokeId) -> impl Iterator<Item = &'a Comment> + 'a {
        self.comments
            .iter()
            .filter(move |comment| &comment.markup_id == stroke)
    }

    pub fn first_for(&self, stroke: &StrokeId) -> Option<&Comment> {
        self.comments
            .iter()
            .find(|comment| &comment.markup_id == stroke)
    }

    pub fn count_for(&self, stroke: &StrokeId) -> usize {
        self.for_stroke(stroke).count()
    }

    /// Replaces all comments with a snapshot ordered by creation time.
    /// A selected comment that disappeared is deselected.
    pub fn replace(&mut self, snapshot: Vec<Comment>) {
        self.comments = snapshot;
        if let Some(selected) = &self.selection.comment {
            if self.get(selected).is_none() {
                tracing::debug!(comment = %selected, "selected comment no longer exists");
                self.selection.comment = None;
            }
        }
    }

    /// Selects a markup and its first comment, if any.
    ///
    /// Returns the comment the host should scroll into view. A selected
    /// comment of another markup is deselected.
    pub fn select_stroke(&mut self, stroke: &StrokeId) -> Option<CommentId> {
        let first = self.first_for(stroke).map(|comment| comment.id.clone());
        self.selection = Selection {
            markup: Some(stroke.clone()),
            comment: first.clone(),
        };
        first
    }

    /// Selects a comment together with the markup it is attached to.
    pub fn select_comment(&mut self, id: &CommentId) -> bool {
        let Some(markup) = self.get(id).map(|comment| comment.markup_id.clone()) else {
            return false;
        };
        self.selection = Selection {
            markup: Some(markup),
            comment: Some(id.clone()),
        };
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::default();
    }

    pub fn deselect_comment(&mut self) {
        self.selection.comment = None;
    }

    /// Drops a selected markup that no longer exists, along with its comment.
    pub fn prune_markup(&mut self, exists: impl Fn(&StrokeId) -> bool) {
        let Some(markup) = &self.selection.markup else {
            return;
        };
        if !exists(markup) {
            tracing::debug!(markup = %markup, "selected markup no longer exists");
            self.clear_selection();
        }
    }
}

/// A run of comment text, either plain or a clickable URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSegment<'a> {
    Plain(&'a str),
    Link(&'a str),
}

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://\S+").expect("valid regex"));

/// Splits comment text into plain runs and `http(s)://` links.
pub fn link_segments(text: &str) -> Vec<TextSegment<'_>> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    for found in URL_RE.find_iter(text) {
        if found.start() > cursor {
            segments.push(TextSegment::Plain(&text[cursor..found.start()]));
        }
        segments.push(TextSegment::Link(found.as_str()));
        cursor = found.end();
    }
    if cursor < text.len() {
        segments.push(TextSegment::Plain(&text[cursor..]));
    }
    segments
}
