use super::Modifiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutKey {
    Character(char),
    Delete,
    Backspace,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputContext {
    /// A text input, text area or select has keyboard focus.
    pub text_input_active: bool,
}

impl InputContext {
    pub const fn typing() -> Self {
        Self {
            text_input_active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    EnterSelect,
    EnterPan,
    EnterDraw,
    ToggleToolPalette,
    DeleteSelection,
}

fn resolve_tool_shortcut(key: char) -> Option<ShortcutAction> {
    match key.to_ascii_lowercase() {
        'v' => Some(ShortcutAction::EnterSelect),
        'h' => Some(ShortcutAction::EnterPan),
        'b' => Some(ShortcutAction::EnterDraw),
        't' => Some(ShortcutAction::ToggleToolPalette),
        _ => None,
    }
}

pub fn resolve_shortcut(
    key: ShortcutKey,
    modifiers: Modifiers,
    context: InputContext,
) -> Option<ShortcutAction> {
    if context.text_input_active || modifiers.ctrl || modifiers.meta {
        return None;
    }
    match key {
        ShortcutKey::Character(c) => resolve_tool_shortcut(c),
        ShortcutKey::Delete | ShortcutKey::Backspace => Some(ShortcutAction::DeleteSelection),
        ShortcutKey::Escape => None,
    }
}
