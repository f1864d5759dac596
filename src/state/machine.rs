use super::model::ToolMode;
use crate::geometry::{ImagePoint, ScreenPoint};
use crate::input::PointerTarget;
use crate::viewport::Viewport;

#[derive(Debug, Clone, PartialEq)]
enum Gesture {
    Idle,
    Pressed,
    Panning {
        start: ScreenPoint,
        baseline: ScreenPoint,
    },
    Drawing {
        path: Vec<ImagePoint>,
    },
}

/// What the session should do in response to a pointer event.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    None,
    /// A plain click in select mode, in image space.
    Click(ImagePoint),
    /// New viewport offset while panning.
    PanTo(ScreenPoint),
    PathExtended,
    StrokeFinished(Vec<ImagePoint>),
    StrokeDiscarded,
}

/// Pointer gesture tracking for the Select/Pan/Draw tools.
#[derive(Debug)]
pub struct InteractionMachine {
    mode: ToolMode,
    gesture: Gesture,
}

impl InteractionMachine {
    pub fn new() -> Self {
        Self {
            mode: ToolMode::default(),
            gesture: Gesture::Idle,
        }
    }

    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    pub fn is_gesture_active(&self) -> bool {
        self.gesture != Gesture::Idle
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.gesture, Gesture::Panning { .. })
    }

    pub fn in_progress_path(&self) -> Option<&[ImagePoint]> {
        match &self.gesture {
            Gesture::Drawing { path } => Some(path),
            _ => None,
        }
    }

    /// Switches tools. An active gesture is finished first, exactly as a pointer-up would.
    pub fn set_mode(&mut self, mode: ToolMode) -> GestureOutcome {
        let outcome = self.finish(None);
        if self.mode != mode {
            tracing::debug!(from = %self.mode, to = %mode, "tool mode changed");
            self.mode = mode;
        }
        outcome
    }

    pub fn pointer_down(
        &mut self,
        target: PointerTarget,
        screen: ScreenPoint,
        viewport: &Viewport,
    ) -> GestureOutcome {
        if !target.is_canvas() {
            return GestureOutcome::None;
        }
        // a second button going down mid-gesture ends the current gesture first
        let outcome = self.finish(None);
        self.gesture = match self.mode {
            ToolMode::Select => Gesture::Pressed,
            ToolMode::Pan => Gesture::Panning {
                start: screen,
                baseline: viewport.offset(),
            },
            ToolMode::Draw => Gesture::Drawing {
                path: vec![viewport.to_image_space(screen)],
            },
        };
        tracing::debug!(mode = %self.mode, "gesture started");
        outcome
    }

    pub fn pointer_move(&mut self, screen: ScreenPoint, viewport: &Viewport) -> GestureOutcome {
        match &mut self.gesture {
            Gesture::Idle | Gesture::Pressed => GestureOutcome::None,
            Gesture::Panning { start, baseline } => GestureOutcome::PanTo(
                baseline.offset_by(screen.x - start.x, screen.y - start.y),
            ),
            Gesture::Drawing { path } => {
                path.push(viewport.to_image_space(screen));
                GestureOutcome::PathExtended
            }
        }
    }

    pub fn pointer_up(
        &mut self,
        target: PointerTarget,
        screen: ScreenPoint,
        viewport: &Viewport,
    ) -> GestureOutcome {
        if !target.is_canvas() {
            return GestureOutcome::None;
        }
        self.finish(Some(viewport.to_image_space(screen)))
    }

    /// Pointer capture lost: ends the gesture with the points collected so far.
    pub fn cancel(&mut self) -> GestureOutcome {
        self.finish(None)
    }

    fn finish(&mut self, release: Option<ImagePoint>) -> GestureOutcome {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Idle | Gesture::Panning { .. } => GestureOutcome::None,
            Gesture::Pressed => release.map_or(GestureOutcome::None, GestureOutcome::Click),
            Gesture::Drawing { path } if path.len() < crate::markup::MIN_STROKE_POINTS => {
                tracing::debug!(points = path.len(), "stroke discarded");
                GestureOutcome::StrokeDiscarded
            }
            Gesture::Drawing { path } => {
                tracing::debug!(points = path.len(), "stroke finished");
                GestureOutcome::StrokeFinished(path)
            }
        }
    }
}

impl Default for InteractionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InteractionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ToolMode::{:?}", self.mode)
    }
}
