//! Document persistence boundary and the optimistic stroke view built on it.

mod memory;
mod reconcile;

use std::fmt;

use thiserror::Error;

use crate::markup::{Comment, CommentId, CommentPatch, ImageRef, StrokeId, StrokeRecord};

pub use memory::{MemoryStore, SubscriptionId};
pub use reconcile::{merge_strokes, StrokeStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{collection} record {id} does not exist")]
    NotFound {
        collection: &'static str,
        id: String,
    },
    #[error("store rejected the write: {0}")]
    Rejected(String),
    #[error("store is unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    CreateStroke,
    DeleteStroke,
    CreateComment,
    UpdateComment,
    DeleteComment,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateStroke => "create stroke",
            Self::DeleteStroke => "delete stroke",
            Self::CreateComment => "create comment",
            Self::UpdateComment => "update comment",
            Self::DeleteComment => "delete comment",
        };
        f.write_str(name)
    }
}

/// Per-image stroke and comment collections.
///
/// Stroke ids are chosen by the client, so creating an id that already exists
/// overwrites it and a retried create is harmless.
pub trait DocumentStore {
    fn create_stroke(&mut self, image: &ImageRef, stroke: &StrokeRecord) -> StoreResult<StrokeId>;
    fn delete_stroke(&mut self, image: &ImageRef, id: &StrokeId) -> StoreResult<()>;
    fn create_comment(&mut self, image: &ImageRef, comment: &Comment) -> StoreResult<CommentId>;
    fn update_comment(
        &mut self,
        image: &ImageRef,
        id: &CommentId,
        patch: &CommentPatch,
    ) -> StoreResult<()>;
    fn delete_comment(&mut self, image: &ImageRef, id: &CommentId) -> StoreResult<()>;
}

/// A write queued by a session for the host to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCommand {
    CreateStroke(StrokeRecord),
    DeleteStroke(StrokeId),
    CreateComment(Comment),
    UpdateComment { id: CommentId, patch: CommentPatch },
    DeleteComment(CommentId),
}

impl StoreCommand {
    pub fn operation(&self) -> StoreOperation {
        match self {
            Self::CreateStroke(_) => StoreOperation::CreateStroke,
            Self::DeleteStroke(_) => StoreOperation::DeleteStroke,
            Self::CreateComment(_) => StoreOperation::CreateComment,
            Self::UpdateComment { .. } => StoreOperation::UpdateComment,
            Self::DeleteComment(_) => StoreOperation::DeleteComment,
        }
    }

    /// Id of the record the command writes.
    pub fn target(&self) -> &str {
        match self {
            Self::CreateStroke(stroke) => stroke.id.as_str(),
            Self::DeleteStroke(id) => id.as_str(),
            Self::CreateComment(comment) => comment.id.as_str(),
            Self::UpdateComment { id, .. } | Self::DeleteComment(id) => id.as_str(),
        }
    }

    pub fn apply<S: DocumentStore + ?Sized>(&self, store: &mut S, image: &ImageRef) -> StoreResult<()> {
        match self {
            Self::CreateStroke(stroke) => store.create_stroke(image, stroke).map(|_| ()),
            Self::DeleteStroke(id) => store.delete_stroke(image, id),
            Self::CreateComment(comment) => store.create_comment(image, comment).map(|_| ()),
            Self::UpdateComment { id, patch } => store.update_comment(image, id, patch),
            Self::DeleteComment(id) => store.delete_comment(image, id),
        }
    }
}
