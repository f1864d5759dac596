use std::cell::RefCell;
use std::rc::Rc;

use markup_canvas::config::EngineConfig;
use markup_canvas::geometry::{BoundingBox, ScreenPoint};
use markup_canvas::input::{InputContext, Modifiers, PointerTarget, ShortcutKey};
use markup_canvas::markup::{Comment, CommentDraft, ImageRef, StrokeRecord};
use markup_canvas::state::ToolMode;
use markup_canvas::store::{MemoryStore, StoreError, StoreOperation};
use markup_canvas::{AnnotationSession, EngineError, SessionEvent};

/// Subscription deliveries queued by the store and replayed into the session.
#[derive(Default)]
struct Inbox {
    strokes: Vec<Vec<StrokeRecord>>,
    comments: Vec<Vec<Comment>>,
}

struct Harness {
    session: AnnotationSession,
    store: MemoryStore,
    inbox: Rc<RefCell<Inbox>>,
}

impl Harness {
    fn new() -> Self {
        let image = ImageRef::new("photo-1", 1000, 500, "https://media.example/photo-1.jpg");
        let mut store = MemoryStore::new();
        let inbox: Rc<RefCell<Inbox>> = Rc::default();

        let sink = Rc::clone(&inbox);
        store.subscribe_strokes(&image.id, move |snapshot| {
            sink.borrow_mut().strokes.push(snapshot);
        });
        let sink = Rc::clone(&inbox);
        store.subscribe_comments(&image.id, move |snapshot| {
            sink.borrow_mut().comments.push(snapshot);
        });

        let mut session = AnnotationSession::new(image, EngineConfig::default());
        session.set_viewport_size(1000.0, 500.0);
        let mut harness = Self {
            session,
            store,
            inbox,
        };
        harness.deliver();
        harness
    }

    fn deliver(&mut self) {
        let inbox = std::mem::take(&mut *self.inbox.borrow_mut());
        for snapshot in inbox.strokes {
            self.session.on_strokes_snapshot(snapshot);
        }
        for snapshot in inbox.comments {
            self.session.on_comments_snapshot(snapshot);
        }
    }

    fn sync(&mut self) {
        self.session.flush(&mut self.store);
        self.deliver();
    }

    fn draw(&mut self, points: &[(f64, f64)]) {
        self.session.set_mode(ToolMode::Draw);
        let (first, rest) = points.split_first().expect("at least one point");
        self.session
            .pointer_down(PointerTarget::Canvas, ScreenPoint::new(first.0, first.1));
        for &(x, y) in rest {
            self.session.pointer_move(ScreenPoint::new(x, y));
        }
        let last = points.last().expect("at least one point");
        self.session
            .pointer_up(PointerTarget::Canvas, ScreenPoint::new(last.0, last.1));
    }
}

#[test]
fn stroke_round_trips_through_the_store_without_duplicates() {
    let mut harness = Harness::new();
    harness.draw(&[(10.0, 10.0), (20.0, 10.0), (20.0, 20.0)]);
    assert_eq!(harness.session.strokes().len(), 1);
    assert_eq!(
        harness.session.strokes()[0].bbox,
        BoundingBox::new(10.0, 10.0, 10.0, 10.0)
    );

    harness.sync();
    assert_eq!(harness.session.strokes().len(), 1);
    assert_eq!(harness.store.strokes("photo-1").len(), 1);
    assert!(harness.session.failed_operations().is_empty());
}

#[test]
fn selecting_comments_moves_markup_selection() {
    let mut harness = Harness::new();
    harness.draw(&[(0.0, 0.0), (50.0, 50.0)]);
    harness
        .session
        .add_comment(CommentDraft::text("comment on A"))
        .expect("stroke A is selected");
    harness.draw(&[(100.0, 100.0), (150.0, 150.0)]);
    let b_comment = harness
        .session
        .add_comment(CommentDraft::text("comment on B"))
        .expect("stroke B is selected")
        .expect("draft has text");
    harness.sync();

    let a = harness.session.strokes()[0].id.clone();
    let b = harness.session.strokes()[1].id.clone();
    harness.session.select_stroke(&a);
    assert!(harness.session.select_comment(&b_comment));
    assert_eq!(harness.session.selection().markup, Some(b));
    assert_eq!(harness.session.selection().comment, Some(b_comment));
}

#[test]
fn clicking_a_commented_stroke_scrolls_to_its_first_comment() {
    let mut harness = Harness::new();
    harness.draw(&[(0.0, 0.0), (40.0, 40.0)]);
    let first = harness
        .session
        .add_comment(CommentDraft::text("first"))
        .expect("stroke is selected")
        .expect("draft has text");
    harness
        .session
        .add_comment(CommentDraft::text("second"))
        .expect("stroke is selected");
    harness.sync();
    harness.session.clear_selection();
    harness.session.take_events();

    harness
        .session
        .handle_key(ShortcutKey::Character('v'), Modifiers::default(), InputContext::default());
    harness
        .session
        .pointer_down(PointerTarget::Canvas, ScreenPoint::new(20.0, 20.0));
    harness
        .session
        .pointer_up(PointerTarget::Canvas, ScreenPoint::new(20.0, 20.0));

    assert_eq!(harness.session.selection().comment, Some(first.clone()));
    assert!(harness
        .session
        .take_events()
        .contains(&SessionEvent::ScrollToComment(first)));
}

#[test]
fn deleting_a_stroke_cascades_to_its_comments() {
    let mut harness = Harness::new();
    harness.draw(&[(0.0, 0.0), (40.0, 40.0)]);
    harness
        .session
        .add_comment(CommentDraft::text("one"))
        .expect("stroke is selected");
    harness
        .session
        .add_comment(CommentDraft::text("two"))
        .expect("stroke is selected");
    harness.draw(&[(200.0, 200.0), (240.0, 240.0)]);
    harness
        .session
        .add_comment(CommentDraft::text("other stroke"))
        .expect("stroke is selected");
    harness.sync();
    harness.session.take_events();

    let doomed = harness.session.strokes()[0].id.clone();
    assert!(harness.session.delete_stroke(&doomed));
    assert_eq!(harness.session.strokes().len(), 1);

    harness.sync();
    assert_eq!(harness.store.strokes("photo-1").len(), 1);
    let remaining = harness.store.comments("photo-1");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].text.as_deref(), Some("other stroke"));
    assert!(harness
        .session
        .take_events()
        .contains(&SessionEvent::StrokeDeleted(doomed)));
}

#[test]
fn failed_cascade_restores_the_stroke_and_reports_once() {
    let mut harness = Harness::new();
    harness.draw(&[(0.0, 0.0), (40.0, 40.0)]);
    harness
        .session
        .add_comment(CommentDraft::text("keep me"))
        .expect("stroke is selected");
    harness.sync();
    harness.session.take_events();

    harness.store.fail_next(
        StoreOperation::DeleteComment,
        StoreError::Unavailable("network down".into()),
    );
    let stroke = harness.session.strokes()[0].id.clone();
    harness.session.delete_stroke(&stroke);
    assert!(harness.session.strokes().is_empty());

    harness.sync();
    assert_eq!(harness.session.strokes().len(), 1);
    assert_eq!(harness.store.strokes("photo-1").len(), 1);
    assert_eq!(harness.store.comments("photo-1").len(), 1);

    let failures: Vec<_> = harness
        .session
        .take_events()
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::Failure(error) => Some(error),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0],
        EngineError::CascadeDelete { stroke_id, failures } if *stroke_id == stroke && failures.len() == 1
    ));
}

#[test]
fn snapshot_mid_gesture_does_not_disturb_drawing() {
    let mut harness = Harness::new();
    harness.draw(&[(0.0, 0.0), (10.0, 10.0)]);
    harness.session.flush(&mut harness.store);

    harness.session.set_mode(ToolMode::Draw);
    harness
        .session
        .pointer_down(PointerTarget::Canvas, ScreenPoint::new(300.0, 300.0));
    harness.session.pointer_move(ScreenPoint::new(310.0, 300.0));
    harness.deliver();
    harness.session.pointer_move(ScreenPoint::new(320.0, 310.0));
    harness
        .session
        .pointer_up(PointerTarget::Canvas, ScreenPoint::new(320.0, 310.0));

    assert_eq!(harness.session.strokes().len(), 2);
    assert_eq!(harness.session.strokes()[1].path.len(), 3);
}

#[test]
fn deleted_elsewhere_selection_clears_on_next_snapshot() {
    let mut harness = Harness::new();
    harness.draw(&[(0.0, 0.0), (10.0, 10.0)]);
    harness.sync();
    let id = harness.session.strokes()[0].id.clone();
    assert_eq!(harness.session.selection().markup, Some(id));

    harness.session.on_strokes_snapshot(Vec::new());
    assert!(harness.session.strokes().is_empty());
    assert!(harness.session.selection().is_empty());
}

#[test]
fn deleting_an_unsaved_stroke_removes_comments_saved_for_it() {
    let mut harness = Harness::new();
    harness.store.fail_next(
        StoreOperation::CreateStroke,
        StoreError::Unavailable("network down".into()),
    );
    harness.draw(&[(0.0, 0.0), (40.0, 40.0)]);
    harness.sync();
    let stroke = harness.session.strokes()[0].id.clone();
    assert!(harness.session.is_stroke_unsaved(&stroke));

    harness
        .session
        .add_comment(CommentDraft::text("written before the save failed"))
        .expect("stroke is selected");
    harness.sync();
    assert_eq!(harness.store.comments("photo-1").len(), 1);
    assert_eq!(harness.session.comments().len(), 1);

    assert!(harness.session.delete_stroke(&stroke));
    harness.sync();
    assert!(harness.store.strokes("photo-1").is_empty());
    assert!(harness.store.comments("photo-1").is_empty());
    assert!(harness.session.comments().is_empty());
    assert!(harness.session.pending_operations().is_empty());
}

#[test]
fn discarding_a_failed_create_removes_its_comments() {
    let mut harness = Harness::new();
    harness.store.fail_next(
        StoreOperation::CreateStroke,
        StoreError::Unavailable("network down".into()),
    );
    harness.draw(&[(0.0, 0.0), (40.0, 40.0)]);
    harness.sync();
    harness
        .session
        .add_comment(CommentDraft::text("saved"))
        .expect("stroke is selected");
    harness.sync();

    let failed = harness.session.failed_operations()[0].id;
    assert_eq!(harness.session.discard_failed(failed), Ok(true));
    harness.sync();
    assert!(harness.session.strokes().is_empty());
    assert!(harness.store.comments("photo-1").is_empty());
    assert!(harness.session.comments().is_empty());
}

#[test]
fn create_failing_during_its_delete_cannot_be_retried_back() {
    let mut harness = Harness::new();
    harness.draw(&[(0.0, 0.0), (40.0, 40.0)]);
    let create = harness.session.take_commands();
    assert_eq!(create.len(), 1);
    let stroke = harness.session.strokes()[0].id.clone();

    assert!(harness.session.delete_stroke(&stroke));
    harness
        .session
        .complete(create[0].id, Err(StoreError::Unavailable("timeout".into())))
        .expect("create is tracked");
    harness.sync();

    assert!(harness.session.strokes().is_empty());
    assert!(harness.session.failed_operations().is_empty());
    assert!(harness.session.pending_operations().is_empty());
    assert!(harness.store.strokes("photo-1").is_empty());
}

#[test]
fn create_landing_after_its_delete_is_undone() {
    let mut harness = Harness::new();
    harness.draw(&[(0.0, 0.0), (40.0, 40.0)]);
    let create = harness.session.take_commands();
    let stroke = harness.session.strokes()[0].id.clone();

    harness.session.delete_stroke(&stroke);
    harness.sync();
    assert!(harness.session.strokes().is_empty());

    let result = create[0]
        .command
        .apply(&mut harness.store, harness.session.image());
    harness
        .session
        .complete(create[0].id, result)
        .expect("create is tracked");
    harness.sync();

    assert!(harness.store.strokes("photo-1").is_empty());
    assert!(harness.session.strokes().is_empty());
    assert!(harness.session.pending_operations().is_empty());
}
