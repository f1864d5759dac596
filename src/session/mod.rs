//! One annotation session per open image.
//!
//! The session owns the viewport, tool state, the optimistic stroke view,
//! comments, selection and the outbox of store writes. Every input is
//! handled synchronously; persistence happens wherever the host runs the
//! queued commands.

mod ops;

use ab_glyph::FontArc;
use chrono::Utc;
use image::RgbaImage;

use crate::comments::{CommentLinker, Selection};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::geometry::{Color, ImagePoint, ScreenPoint};
use crate::hit_test::hit_test;
use crate::input::{resolve_shortcut, InputContext, Modifiers, PointerTarget, ShortcutAction, ShortcutKey};
use crate::markup::{
    Comment, CommentDraft, CommentId, CommentPatch, ImageRef, StrokeId, StrokeRecord,
};
use crate::render::{build_scene, rasterize, InProgressStroke, RenderStyle, Scene, SceneInput};
use crate::state::{CursorHint, GestureOutcome, InteractionMachine, ToolMode, ToolOptions};
use crate::store::{DocumentStore, StoreCommand, StoreOperation, StoreResult, StrokeStore};
use crate::viewport::{Viewport, ViewportSize};

use ops::{CascadeStep, OperationTracker};
pub use ops::{OperationId, OperationStatus, PendingOp, QueuedCommand};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A finished gesture became a stroke and was queued for saving.
    StrokeCommitted(StrokeId),
    StrokeSaved(StrokeId),
    StrokeDeleted(StrokeId),
    CommentSaved(CommentId),
    CommentUpdated(CommentId),
    CommentDeleted(CommentId),
    /// The comments pane should bring this comment into view.
    ScrollToComment(CommentId),
    Failure(EngineError),
}

/// Entry for the markup picker next to the comment composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupOption {
    pub id: StrokeId,
    pub label: String,
}

#[derive(Debug)]
pub struct AnnotationSession {
    config: EngineConfig,
    style: RenderStyle,
    image: ImageRef,
    viewport: Viewport,
    fit_pending: bool,
    machine: InteractionMachine,
    tools: ToolOptions,
    strokes: StrokeStore,
    comments: CommentLinker,
    ops: OperationTracker,
    events: Vec<SessionEvent>,
    needs_redraw: bool,
}

impl AnnotationSession {
    pub fn new(image: ImageRef, config: EngineConfig) -> Self {
        let config = config.normalized();
        tracing::info!(image = %image.id, width = image.width, height = image.height, "opening annotation session");
        Self {
            style: RenderStyle::from_config(&config),
            viewport: Viewport::from_config(&config),
            tools: ToolOptions::from_config(&config),
            fit_pending: true,
            machine: InteractionMachine::new(),
            strokes: StrokeStore::new(),
            comments: CommentLinker::new(),
            ops: OperationTracker::default(),
            events: Vec::new(),
            needs_redraw: true,
            image,
            config,
        }
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn mode(&self) -> ToolMode {
        self.machine.mode()
    }

    pub fn tool_options(&self) -> &ToolOptions {
        &self.tools
    }

    /// Strokes in display order: confirmed first, then this session's unsaved ones.
    pub fn strokes(&self) -> &[StrokeRecord] {
        self.strokes.strokes()
    }

    pub fn comments(&self) -> &[Comment] {
        self.comments.comments()
    }

    pub fn selection(&self) -> &Selection {
        self.comments.selection()
    }

    pub fn cursor_hint(&self) -> CursorHint {
        CursorHint::for_mode(self.machine.mode(), self.machine.is_panning())
    }

    /// Records the measured viewport; the first measurement fits the image.
    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.viewport.set_size(ViewportSize::new(width, height));
        self.fit_if_pending();
    }

    /// Image metadata that arrives after the session was opened.
    ///
    /// Only fits when no fit has happened yet for this image.
    pub fn set_image_dimensions(&mut self, width: u32, height: u32) {
        if self.image.width == width && self.image.height == height {
            return;
        }
        self.image.width = width;
        self.image.height = height;
        self.needs_redraw = true;
        self.fit_if_pending();
    }

    fn fit_if_pending(&mut self) {
        let Some(size) = self.viewport.size() else {
            return;
        };
        if !self.fit_pending || !self.image.has_dimensions() || !size.is_measured() {
            return;
        }
        self.viewport.fit_to_viewport(
            f64::from(self.image.width),
            f64::from(self.image.height),
            size.width,
            size.height,
        );
        self.fit_pending = false;
        tracing::debug!(zoom = self.viewport.zoom(), "fitted image to viewport");
    }

    /// Zoom slider: absolute zoom around the viewport center.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.viewport.zoom_at(zoom, None);
    }

    /// Returns true when the wheel event was consumed as a zoom.
    pub fn wheel(&mut self, delta_y: f64, pointer: ScreenPoint, modifiers: Modifiers) -> bool {
        if !modifiers.zoom_modifier_held() {
            return false;
        }
        self.viewport
            .wheel_zoom(delta_y, pointer, self.config.wheel_zoom_sensitivity);
        true
    }

    pub fn pointer_down(&mut self, target: PointerTarget, screen: ScreenPoint) {
        let outcome = self.machine.pointer_down(target, screen, &self.viewport);
        self.apply_outcome(outcome);
        if self.machine.in_progress_path().is_some() {
            self.needs_redraw = true;
        }
    }

    pub fn pointer_move(&mut self, screen: ScreenPoint) {
        let outcome = self.machine.pointer_move(screen, &self.viewport);
        self.apply_outcome(outcome);
    }

    pub fn pointer_up(&mut self, target: PointerTarget, screen: ScreenPoint) {
        let outcome = self.machine.pointer_up(target, screen, &self.viewport);
        self.apply_outcome(outcome);
    }

    /// Pointer capture was lost mid-gesture.
    pub fn pointer_cancel(&mut self) {
        let outcome = self.machine.cancel();
        self.apply_outcome(outcome);
    }

    pub fn set_mode(&mut self, mode: ToolMode) {
        let outcome = self.machine.set_mode(mode);
        self.apply_outcome(outcome);
    }

    /// Resolves and performs a keyboard shortcut.
    pub fn handle_key(
        &mut self,
        key: ShortcutKey,
        modifiers: Modifiers,
        context: InputContext,
    ) -> Option<ShortcutAction> {
        let action = resolve_shortcut(key, modifiers, context)?;
        match action {
            ShortcutAction::EnterSelect => self.set_mode(ToolMode::Select),
            ShortcutAction::EnterPan => self.set_mode(ToolMode::Pan),
            ShortcutAction::EnterDraw => self.set_mode(ToolMode::Draw),
            ShortcutAction::ToggleToolPalette => {
                self.toggle_tool_palette();
            }
            ShortcutAction::DeleteSelection => {
                self.delete_selection();
            }
        }
        Some(action)
    }

    fn apply_outcome(&mut self, outcome: GestureOutcome) {
        match outcome {
            GestureOutcome::None => {}
            GestureOutcome::Click(point) => self.click(point),
            GestureOutcome::PanTo(offset) => self.viewport.set_offset(offset),
            GestureOutcome::PathExtended | GestureOutcome::StrokeDiscarded => {
                self.needs_redraw = true;
            }
            GestureOutcome::StrokeFinished(path) => self.commit_stroke(path),
        }
    }

    fn click(&mut self, point: ImagePoint) {
        if let Some(id) = hit_test(point, self.strokes.strokes(), self.config.hit_padding) {
            self.select_stroke(&id);
        }
    }

    fn commit_stroke(&mut self, path: Vec<ImagePoint>) {
        self.needs_redraw = true;
        let Some(stroke) = StrokeRecord::from_path(
            StrokeId::generate(),
            self.tools.color(),
            self.tools.brush_size(),
            path,
            Utc::now(),
        ) else {
            return;
        };
        let id = stroke.id.clone();
        tracing::info!(stroke = %id, points = stroke.path.len(), color = %stroke.color, "stroke committed");
        self.strokes.add_local(stroke.clone());
        self.select_stroke(&id);
        self.ops.submit(StoreCommand::CreateStroke(stroke));
        self.events.push(SessionEvent::StrokeCommitted(id));
    }

    pub fn set_color(&mut self, color: Color) {
        if self.tools.set_color(color) {
            self.needs_redraw = true;
        }
    }

    pub fn set_brush_size(&mut self, size: u32) {
        if self.tools.set_brush_size(size) {
            self.needs_redraw = true;
        }
    }

    pub fn toggle_tool_palette(&mut self) -> bool {
        self.tools.toggle_palette()
    }

    /// Selects a markup; hidden or unknown ids are ignored.
    pub fn select_stroke(&mut self, id: &StrokeId) -> bool {
        if !self.strokes.contains(id) {
            return false;
        }
        if let Some(comment) = self.comments.select_stroke(id) {
            self.events.push(SessionEvent::ScrollToComment(comment));
        }
        self.needs_redraw = true;
        true
    }

    pub fn select_comment(&mut self, id: &CommentId) -> bool {
        let selected = self.comments.select_comment(id);
        if selected {
            self.needs_redraw = true;
        }
        selected
    }

    pub fn clear_selection(&mut self) {
        if !self.comments.selection().is_empty() {
            self.comments.clear_selection();
            self.needs_redraw = true;
        }
    }

    /// 1-based position of a stroke in display order.
    pub fn stroke_ordinal(&self, id: &StrokeId) -> Option<usize> {
        self.strokes.position(id).map(|index| index + 1)
    }

    /// `#N` label for "linked to markup" captions; `#?` once the stroke is gone.
    pub fn stroke_label(&self, id: &StrokeId) -> String {
        match self.stroke_ordinal(id) {
            Some(ordinal) => format!("#{ordinal}"),
            None => "#?".to_string(),
        }
    }

    pub fn markup_options(&self) -> Vec<MarkupOption> {
        self.strokes
            .strokes()
            .iter()
            .enumerate()
            .map(|(index, stroke)| MarkupOption {
                id: stroke.id.clone(),
                label: format!("#{} — {} — {}px", index + 1, stroke.color, stroke.size),
            })
            .collect()
    }

    pub fn on_strokes_snapshot(&mut self, snapshot: Vec<StrokeRecord>) {
        self.strokes.replace_server(snapshot);
        let strokes = &self.strokes;
        self.ops
            .drop_confirmed_creates(|id| strokes.is_confirmed(id));
        self.comments.prune_markup(|id| strokes.contains(id));
        self.needs_redraw = true;
    }

    pub fn on_comments_snapshot(&mut self, snapshot: Vec<Comment>) {
        self.comments.replace(snapshot);
        self.needs_redraw = true;
    }

    /// Queues a comment on the selected markup. Empty drafts are dropped.
    pub fn add_comment(&mut self, draft: CommentDraft) -> EngineResult<Option<CommentId>> {
        let markup = self
            .comments
            .selection()
            .markup
            .clone()
            .filter(|id| self.strokes.contains(id))
            .ok_or(EngineError::NoStrokeSelected)?;
        let Some(comment) = draft.into_comment(CommentId::generate(), markup, Utc::now()) else {
            return Ok(None);
        };
        let id = comment.id.clone();
        tracing::info!(comment = %id, markup = %comment.markup_id, "comment submitted");
        self.ops.submit(StoreCommand::CreateComment(comment));
        Ok(Some(id))
    }

    pub fn update_comment(&mut self, id: &CommentId, text: &str, link: &str) -> OperationId {
        let patch = CommentPatch::new(text, link, Utc::now());
        self.ops.submit(StoreCommand::UpdateComment {
            id: id.clone(),
            patch,
        })
    }

    /// Deletes a comment, or its whole markup thread when `also_markup` is set.
    pub fn delete_comment(&mut self, id: &CommentId, also_markup: bool) {
        if also_markup {
            if let Some(markup) = self.comments.get(id).map(|comment| comment.markup_id.clone()) {
                self.delete_stroke(&markup);
                return;
            }
        }
        if self.comments.selection().comment.as_ref() == Some(id) {
            self.comments.deselect_comment();
            self.needs_redraw = true;
        }
        self.ops.submit(StoreCommand::DeleteComment(id.clone()));
    }

    /// Deletes the selected comment, or the selected markup if no comment is selected.
    pub fn delete_selection(&mut self) -> bool {
        let selection = self.comments.selection().clone();
        if let Some(comment) = selection.comment {
            self.delete_comment(&comment, false);
            return true;
        }
        match selection.markup {
            Some(markup) => self.delete_stroke(&markup),
            None => false,
        }
    }

    /// Removes a stroke from view at once and deletes it with its comments.
    pub fn delete_stroke(&mut self, id: &StrokeId) -> bool {
        if !self.strokes.contains(id) {
            return false;
        }
        if self.comments.selection().markup.as_ref() == Some(id) {
            self.comments.clear_selection();
        }
        self.needs_redraw = true;

        // the stroke never reached the server, but its comments may have
        if self.ops.failed_create_of(id).is_some() {
            self.discard_unsaved_stroke(id);
            return true;
        }

        self.strokes.hide(id);
        let comments = self
            .comments
            .for_stroke(id)
            .map(|comment| comment.id.clone())
            .collect::<Vec<_>>();
        tracing::info!(stroke = %id, comments = comments.len(), "deleting stroke");
        self.ops.begin_cascade(id.clone(), comments);
        true
    }

    /// Drops a stroke whose create failed, along with every comment written for it.
    fn discard_unsaved_stroke(&mut self, id: &StrokeId) {
        self.ops.cancel_creates_for(id);
        self.strokes.remove_local(id);
        let comments = self
            .comments
            .for_stroke(id)
            .map(|comment| comment.id.clone())
            .collect::<Vec<_>>();
        for comment in &comments {
            self.ops.submit(StoreCommand::DeleteComment(comment.clone()));
        }
        let strokes = &self.strokes;
        self.comments.prune_markup(|markup| strokes.contains(markup));
        self.needs_redraw = true;
        tracing::info!(stroke = %id, comments = comments.len(), "unsaved stroke discarded");
        self.events.push(SessionEvent::StrokeDeleted(id.clone()));
    }

    /// Deletes a comment whose stroke was deleted while the comment was being saved.
    fn sweep_orphan_comment(&mut self, comment: &Comment) {
        if self.strokes.contains(&comment.markup_id) {
            return;
        }
        tracing::info!(comment = %comment.id, markup = %comment.markup_id, "deleting comment saved for a deleted stroke");
        if !self.ops.join_cascade(&comment.markup_id, comment.id.clone()) {
            self.ops.submit(StoreCommand::DeleteComment(comment.id.clone()));
        }
    }

    /// Drains the outbox. Each command must be reported back via [`Self::complete`].
    pub fn take_commands(&mut self) -> Vec<QueuedCommand> {
        self.ops.take_queued()
    }

    pub fn complete(&mut self, op: OperationId, result: StoreResult<()>) -> EngineResult<()> {
        let pending = self
            .ops
            .get(op)
            .cloned()
            .ok_or(EngineError::UnknownOperation(op))?;

        if let Some(stroke) = pending.cascade() {
            self.ops.remove(op);
            match self.ops.advance_cascade(stroke, op, result) {
                CascadeStep::Waiting => {}
                CascadeStep::Finished(stroke_id) => {
                    self.strokes.forget(&stroke_id);
                    self.ops.cancel_creates_for(&stroke_id);
                    tracing::info!(stroke = %stroke_id, "stroke deleted");
                    self.events.push(SessionEvent::StrokeDeleted(stroke_id));
                }
                CascadeStep::Failed {
                    stroke_id,
                    failures,
                } => {
                    tracing::warn!(stroke = %stroke_id, failures = failures.len(), "stroke delete failed; restoring");
                    self.strokes.unhide(&stroke_id);
                    self.needs_redraw = true;
                    self.events
                        .push(SessionEvent::Failure(EngineError::CascadeDelete {
                            stroke_id,
                            failures,
                        }));
                }
            }
            return Ok(());
        }

        match result {
            Ok(()) => {
                self.ops.remove(op);
                let event = match pending.command {
                    StoreCommand::CreateStroke(stroke) => {
                        // deleted while the create was in flight
                        if !self.strokes.contains(&stroke.id) && !self.ops.in_cascade(&stroke.id) {
                            tracing::info!(stroke = %stroke.id, "deleting stroke saved after its removal");
                            self.ops.submit(StoreCommand::DeleteStroke(stroke.id.clone()));
                        }
                        SessionEvent::StrokeSaved(stroke.id)
                    }
                    StoreCommand::DeleteStroke(id) => {
                        self.strokes.forget(&id);
                        SessionEvent::StrokeDeleted(id)
                    }
                    StoreCommand::CreateComment(comment) => {
                        self.sweep_orphan_comment(&comment);
                        SessionEvent::CommentSaved(comment.id)
                    }
                    StoreCommand::UpdateComment { id, .. } => SessionEvent::CommentUpdated(id),
                    StoreCommand::DeleteComment(id) => SessionEvent::CommentDeleted(id),
                };
                self.events.push(event);
            }
            Err(_) if self.targets_deleted_stroke(&pending.command) => {
                tracing::debug!(%op, "dropping failed write for a deleted stroke");
                self.ops.remove(op);
            }
            Err(source) => {
                let operation = pending.command.operation();
                let target = pending.command.target().to_string();
                tracing::warn!(%op, %operation, %target, error = %source, "store write failed");
                self.ops.mark_failed(op, source.clone());
                if operation == StoreOperation::CreateStroke {
                    self.needs_redraw = true;
                }
                self.events
                    .push(SessionEvent::Failure(EngineError::Persistence {
                        operation,
                        target,
                        source,
                    }));
            }
        }
        Ok(())
    }

    /// True for creates whose stroke is gone and not waiting on its own delete.
    fn targets_deleted_stroke(&self, command: &StoreCommand) -> bool {
        let stroke = match command {
            StoreCommand::CreateStroke(stroke) => &stroke.id,
            StoreCommand::CreateComment(comment) => &comment.markup_id,
            _ => return false,
        };
        !self.strokes.contains(stroke) && !self.ops.in_cascade(stroke)
    }

    /// Runs every queued command against `store` until the outbox is empty.
    pub fn flush<S: DocumentStore + ?Sized>(&mut self, store: &mut S) -> usize {
        let mut executed = 0;
        loop {
            let batch = self.take_commands();
            if batch.is_empty() {
                break;
            }
            for queued in batch {
                let result = queued.command.apply(store, &self.image);
                executed += 1;
                if let Err(err) = self.complete(queued.id, result) {
                    tracing::warn!(error = %err, "dropping result of untracked operation");
                }
            }
        }
        executed
    }

    /// Submits a failed operation again with the same record and id.
    pub fn retry(&mut self, op: OperationId) -> EngineResult<()> {
        if self.ops.get(op).is_none() {
            return Err(EngineError::UnknownOperation(op));
        }
        if self.ops.requeue(op) {
            tracing::info!(%op, "retrying store write");
        }
        Ok(())
    }

    /// Gives up on a failed operation. An unsaved stroke disappears from view.
    pub fn discard_failed(&mut self, op: OperationId) -> EngineResult<bool> {
        let failed = self
            .ops
            .get(op)
            .ok_or(EngineError::UnknownOperation(op))?
            .is_failed();
        if !failed {
            return Ok(false);
        }
        let Some(pending) = self.ops.remove(op) else {
            return Ok(false);
        };
        if let StoreCommand::CreateStroke(stroke) = pending.command {
            if self.strokes.is_local(&stroke.id) && !self.ops.in_cascade(&stroke.id) {
                self.discard_unsaved_stroke(&stroke.id);
            }
        }
        tracing::info!(%op, "discarded failed store write");
        Ok(true)
    }

    pub fn failed_operations(&self) -> Vec<&PendingOp> {
        self.ops.all().filter(|op| op.is_failed()).collect()
    }

    pub fn pending_operations(&self) -> Vec<&PendingOp> {
        self.ops.all().collect()
    }

    /// True while the stroke's only copy is local because saving it failed.
    pub fn is_stroke_unsaved(&self, id: &StrokeId) -> bool {
        self.ops.failed_create_of(id).is_some()
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Returns true once after anything visible on the overlay changed.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::replace(&mut self.needs_redraw, false)
    }

    pub fn scene(&self) -> Scene {
        let in_progress = self.machine.in_progress_path().map(|path| InProgressStroke {
            path,
            color: self.tools.color(),
            size: self.tools.brush_size(),
        });
        build_scene(
            SceneInput {
                width: self.image.width,
                height: self.image.height,
                strokes: self.strokes.strokes(),
                comments: &self.comments,
                selected: self.comments.selection().markup.as_ref(),
                in_progress,
            },
            &self.style,
        )
    }

    pub fn render(&self, font: Option<&FontArc>) -> EngineResult<RgbaImage> {
        Ok(rasterize(&self.scene(), font)?)
    }
}
