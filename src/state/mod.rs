pub mod machine;
pub mod model;

pub use machine::{GestureOutcome, InteractionMachine};
pub use model::{clamp_brush_size, CursorHint, ToolMode, ToolOptions, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE, SWATCHES};
