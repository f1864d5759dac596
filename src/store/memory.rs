use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use super::{DocumentStore, StoreError, StoreOperation, StoreResult};
use crate::markup::{Comment, CommentId, CommentPatch, ImageRef, StrokeId, StrokeRecord};

type Listener<T> = Box<dyn FnMut(Vec<T>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Default)]
struct ImageCollections {
    strokes: Vec<StrokeRecord>,
    comments: Vec<Comment>,
}

struct Subscription<T> {
    id: SubscriptionId,
    image_id: String,
    listener: Listener<T>,
}

/// In-process document store with ordered per-image collections.
///
/// Records get a server timestamp on creation; listeners receive the full
/// ordered collection after every change and once on subscribe.
#[derive(Default)]
pub struct MemoryStore {
    images: HashMap<String, ImageCollections>,
    last_timestamp: Option<DateTime<Utc>>,
    next_subscription: u64,
    stroke_listeners: Vec<Subscription<StrokeRecord>>,
    comment_listeners: Vec<Subscription<Comment>>,
    injected_failures: Vec<(StoreOperation, StoreError)>,
    offline: bool,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("images", &self.images.len())
            .field("stroke_listeners", &self.stroke_listeners.len())
            .field("comment_listeners", &self.comment_listeners.len())
            .field("offline", &self.offline)
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strokes(&self, image_id: &str) -> Vec<StrokeRecord> {
        self.images
            .get(image_id)
            .map(|image| image.strokes.clone())
            .unwrap_or_default()
    }

    pub fn comments(&self, image_id: &str) -> Vec<Comment> {
        self.images
            .get(image_id)
            .map(|image| image.comments.clone())
            .unwrap_or_default()
    }

    pub fn subscribe_strokes(
        &mut self,
        image_id: &str,
        mut listener: impl FnMut(Vec<StrokeRecord>) + 'static,
    ) -> SubscriptionId {
        let id = self.allocate_subscription();
        listener(self.strokes(image_id));
        self.stroke_listeners.push(Subscription {
            id,
            image_id: image_id.to_string(),
            listener: Box::new(listener),
        });
        id
    }

    pub fn subscribe_comments(
        &mut self,
        image_id: &str,
        mut listener: impl FnMut(Vec<Comment>) + 'static,
    ) -> SubscriptionId {
        let id = self.allocate_subscription();
        listener(self.comments(image_id));
        self.comment_listeners.push(Subscription {
            id,
            image_id: image_id.to_string(),
            listener: Box::new(listener),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.stroke_listeners.len() + self.comment_listeners.len();
        self.stroke_listeners.retain(|sub| sub.id != id);
        self.comment_listeners.retain(|sub| sub.id != id);
        before != self.stroke_listeners.len() + self.comment_listeners.len()
    }

    /// Makes the next call of `operation` fail with `error`.
    pub fn fail_next(&mut self, operation: StoreOperation, error: StoreError) {
        self.injected_failures.push((operation, error));
    }

    /// While offline every operation fails with `StoreError::Unavailable`.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    fn allocate_subscription(&mut self) -> SubscriptionId {
        self.next_subscription += 1;
        SubscriptionId(self.next_subscription)
    }

    fn check(&mut self, operation: StoreOperation) -> StoreResult<()> {
        if self.offline {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        if let Some(index) = self
            .injected_failures
            .iter()
            .position(|(op, _)| *op == operation)
        {
            let (_, error) = self.injected_failures.remove(index);
            return Err(error);
        }
        Ok(())
    }

    /// Strictly increasing server clock so creation order is total.
    fn server_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(stamp);
        stamp
    }

    fn collections(&mut self, image_id: &str) -> &mut ImageCollections {
        self.images.entry(image_id.to_string()).or_default()
    }

    fn notify_strokes(&mut self, image_id: &str) {
        let snapshot = self.strokes(image_id);
        for sub in self
            .stroke_listeners
            .iter_mut()
            .filter(|sub| sub.image_id == image_id)
        {
            (sub.listener)(snapshot.clone());
        }
    }

    fn notify_comments(&mut self, image_id: &str) {
        let snapshot = self.comments(image_id);
        for sub in self
            .comment_listeners
            .iter_mut()
            .filter(|sub| sub.image_id == image_id)
        {
            (sub.listener)(snapshot.clone());
        }
    }
}

impl DocumentStore for MemoryStore {
    fn create_stroke(&mut self, image: &ImageRef, stroke: &StrokeRecord) -> StoreResult<StrokeId> {
        self.check(StoreOperation::CreateStroke)?;
        let created_at = self.server_timestamp();
        let strokes = &mut self.collections(&image.id).strokes;
        match strokes.iter_mut().find(|existing| existing.id == stroke.id) {
            Some(existing) => {
                *existing = StrokeRecord {
                    created_at: existing.created_at,
                    ..stroke.clone()
                }
            }
            None => strokes.push(StrokeRecord {
                created_at,
                ..stroke.clone()
            }),
        }
        self.notify_strokes(&image.id);
        Ok(stroke.id.clone())
    }

    fn delete_stroke(&mut self, image: &ImageRef, id: &StrokeId) -> StoreResult<()> {
        self.check(StoreOperation::DeleteStroke)?;
        let strokes = &mut self.collections(&image.id).strokes;
        let before = strokes.len();
        strokes.retain(|stroke| &stroke.id != id);
        if strokes.len() != before {
            self.notify_strokes(&image.id);
        }
        Ok(())
    }

    fn create_comment(&mut self, image: &ImageRef, comment: &Comment) -> StoreResult<CommentId> {
        self.check(StoreOperation::CreateComment)?;
        let created_at = self.server_timestamp();
        let comments = &mut self.collections(&image.id).comments;
        match comments.iter_mut().find(|existing| existing.id == comment.id) {
            Some(existing) => {
                *existing = Comment {
                    created_at: existing.created_at,
                    ..comment.clone()
                }
            }
            None => comments.push(Comment {
                created_at,
                ..comment.clone()
            }),
        }
        self.notify_comments(&image.id);
        Ok(comment.id.clone())
    }

    fn update_comment(
        &mut self,
        image: &ImageRef,
        id: &CommentId,
        patch: &CommentPatch,
    ) -> StoreResult<()> {
        self.check(StoreOperation::UpdateComment)?;
        let comment = self
            .collections(&image.id)
            .comments
            .iter_mut()
            .find(|comment| &comment.id == id)
            .ok_or_else(|| StoreError::NotFound {
                collection: "comments",
                id: id.to_string(),
            })?;
        patch.apply_to(comment);
        self.notify_comments(&image.id);
        Ok(())
    }

    fn delete_comment(&mut self, image: &ImageRef, id: &CommentId) -> StoreResult<()> {
        self.check(StoreOperation::DeleteComment)?;
        let comments = &mut self.collections(&image.id).comments;
        let before = comments.len();
        comments.retain(|comment| &comment.id != id);
        if comments.len() != before {
            self.notify_comments(&image.id);
        }
        Ok(())
    }
}
