//! Stroke and comment records shared with the document store.
//!
//! Field names serialize in camelCase so records line up with the documents
//! other clients read and write (`markupId`, `createdAt`, `refImageUrl`, ...).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{BoundingBox, Color, ImagePoint};

/// Minimum number of sampled points for a gesture to become a stroke.
pub const MIN_STROKE_POINTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrokeId(String);

impl StrokeId {
    /// Client-side id so the optimistic copy and the persisted record share identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StrokeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for StrokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(String);

impl CommentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The image being annotated. Dimensions are immutable for a viewer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub source: String,
}

impl ImageRef {
    pub fn new(id: impl Into<String>, width: u32, height: u32, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            source: source.into(),
        }
    }

    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// A freehand markup. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeRecord {
    pub id: StrokeId,
    pub color: Color,
    pub size: u32,
    pub path: Vec<ImagePoint>,
    pub bbox: BoundingBox,
    pub created_at: DateTime<Utc>,
}

impl StrokeRecord {
    /// Builds a stroke from a finished gesture; `None` when the path is too short.
    pub fn from_path(
        id: StrokeId,
        color: Color,
        size: u32,
        path: Vec<ImagePoint>,
        created_at: DateTime<Utc>,
    ) -> Option<Self> {
        if path.len() < MIN_STROKE_POINTS {
            return None;
        }
        let bbox = BoundingBox::enclosing(&path)?;
        Some(Self {
            id,
            color,
            size: size.max(1),
            path,
            bbox,
            created_at,
        })
    }
}

/// A note attached to exactly one stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub markup_id: StrokeId,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub ref_image_url: Option<String>,
    #[serde(default)]
    pub ref_image_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Reference image already uploaded to the media host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub url: String,
    pub public_id: String,
}

/// Contents of the comment composer before submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentDraft {
    pub text: String,
    pub link: String,
    pub reference: Option<ReferenceImage>,
}

impl CommentDraft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.link.trim().is_empty() && self.reference.is_none()
    }

    /// Turns the draft into a record for `markup_id`; `None` for an empty draft.
    pub fn into_comment(
        self,
        id: CommentId,
        markup_id: StrokeId,
        created_at: DateTime<Utc>,
    ) -> Option<Comment> {
        if self.is_empty() {
            return None;
        }
        let (ref_image_url, ref_image_id) = match self.reference {
            Some(reference) => (Some(reference.url), Some(reference.public_id)),
            None => (None, None),
        };
        Some(Comment {
            id,
            markup_id,
            text: non_empty_trimmed(&self.text),
            link: non_empty_trimmed(&self.link),
            ref_image_url,
            ref_image_id,
            created_at,
            updated_at: None,
        })
    }
}

/// Editable comment fields; blank values clear the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    pub text: Option<String>,
    pub link: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CommentPatch {
    pub fn new(text: &str, link: &str, updated_at: DateTime<Utc>) -> Self {
        Self {
            text: non_empty_trimmed(text),
            link: non_empty_trimmed(link),
            updated_at,
        }
    }

    pub fn apply_to(&self, comment: &mut Comment) {
        comment.text = self.text.clone();
        comment.link = self.link.clone();
        comment.updated_at = Some(self.updated_at);
    }
}

fn non_empty_trimmed(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
