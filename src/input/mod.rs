mod shortcut;

pub use shortcut::{resolve_shortcut, InputContext, ShortcutAction, ShortcutKey};

/// Where a pointer event landed, as classified by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerTarget {
    #[default]
    Canvas,
    /// The floating tool palette.
    ToolPalette,
    /// Buttons, inputs, selects, text areas and labels.
    FormControl,
}

impl PointerTarget {
    pub const fn is_canvas(self) -> bool {
        matches!(self, Self::Canvas)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const fn new(ctrl: bool, meta: bool, shift: bool) -> Self {
        Self { ctrl, meta, shift }
    }

    pub const fn ctrl() -> Self {
        Self::new(true, false, false)
    }

    /// Wheel events zoom only while Ctrl or Meta is held.
    pub const fn zoom_modifier_held(self) -> bool {
        self.ctrl || self.meta
    }
}
