#![forbid(unsafe_code)]

//! Canonical input/event types.
//!
//! Hosts translate their native pointer and keyboard events into these types
//! before handing them to the interaction machine.
//!
//! # Design Notes
//!
//! - Pointer coordinates are viewport pixels, not container-relative.
//! - `pointer_id` distinguishes concurrent pointers (touch, pen); only the
//!   pointer that started an interaction can move or finish it.
//! - `Modifiers` use bitflags for easy combination.

use bitflags::bitflags;

use crate::geometry::Point;

/// Canonical input event.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// A pointer (mouse, pen, touch) event.
    Pointer(PointerEvent),

    /// A keyboard event.
    Key(KeyEvent),

    /// The board lost focus; any active interaction must be abandoned.
    Blur,
}

/// A pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// What happened.
    pub kind: PointerEventKind,
    /// Host-assigned pointer identifier.
    pub pointer_id: u32,
    /// Viewport position.
    pub position: Point,
    /// Button involved in the event.
    pub button: PointerButton,
    /// Modifier keys held during the event.
    pub modifiers: Modifiers,
}

impl PointerEvent {
    /// Primary-button event for pointer 1 with no modifiers.
    #[must_use]
    pub const fn new(kind: PointerEventKind, position: Point) -> Self {
        Self {
            kind,
            pointer_id: 1,
            position,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        }
    }

    /// Pointer-down at `(x, y)`.
    #[must_use]
    pub const fn down(x: f64, y: f64) -> Self {
        Self::new(PointerEventKind::Down, Point::new(x, y))
    }

    /// Pointer-move at `(x, y)`.
    #[must_use]
    pub const fn moved(x: f64, y: f64) -> Self {
        Self::new(PointerEventKind::Move, Point::new(x, y))
    }

    /// Pointer-up at `(x, y)`.
    #[must_use]
    pub const fn up(x: f64, y: f64) -> Self {
        Self::new(PointerEventKind::Up, Point::new(x, y))
    }

    /// Set the modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Set the pointer identifier.
    #[must_use]
    pub const fn with_pointer_id(mut self, pointer_id: u32) -> Self {
        self.pointer_id = pointer_id;
        self
    }

    /// Set the button.
    #[must_use]
    pub const fn with_button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }
}

/// Pointer event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerEventKind {
    /// Button pressed.
    Down,
    /// Pointer moved (with or without a button held).
    Move,
    /// Button released.
    Up,
    /// The platform revoked the pointer (e.g. touch interrupted).
    Cancel,
}

/// Pointer buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerButton {
    /// Left mouse button, pen tip, or touch contact.
    #[default]
    Primary,
    /// Right mouse button.
    Secondary,
    /// Middle mouse button.
    Auxiliary,
}

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key code that was pressed.
    pub code: KeyCode,

    /// Modifier keys held during the event.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// Create a new key event with no modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
        }
    }

    /// Create a key event with modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Check if this is a specific character key (case-insensitive).
    #[must_use]
    pub fn is_char(&self, c: char) -> bool {
        matches!(self.code, KeyCode::Char(ch) if ch.eq_ignore_ascii_case(&c))
    }

    /// Ctrl on most platforms, Cmd on macOS.
    #[must_use]
    pub const fn command(&self) -> bool {
        self.modifiers.intersects(Modifiers::CTRL.union(Modifiers::SUPER))
    }

    /// Check if Shift modifier is held.
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }
}

/// Key codes the board reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A regular character key.
    Char(char),
    Enter,
    Escape,
    Backspace,
    Delete,
    Tab,
    /// Shift+Tab as reported by some hosts.
    BackTab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
}

bitflags! {
    /// Modifier keys held during an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b0000;
        /// Shift key.
        const SHIFT = 0b0001;
        /// Alt/Option key.
        const ALT   = 0b0010;
        /// Control key.
        const CTRL  = 0b0100;
        /// Super/Meta/Command key.
        const SUPER = 0b1000;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_accepts_ctrl_or_super() {
        let ctrl = KeyEvent::new(KeyCode::Char('a')).with_modifiers(Modifiers::CTRL);
        let cmd = KeyEvent::new(KeyCode::Char('a')).with_modifiers(Modifiers::SUPER);
        let alt = KeyEvent::new(KeyCode::Char('a')).with_modifiers(Modifiers::ALT);
        assert!(ctrl.command());
        assert!(cmd.command());
        assert!(!alt.command());
    }

    #[test]
    fn is_char_ignores_case() {
        assert!(KeyEvent::new(KeyCode::Char('A')).is_char('a'));
        assert!(!KeyEvent::new(KeyCode::Enter).is_char('a'));
    }

    #[test]
    fn pointer_builders() {
        let event = PointerEvent::down(4.0, 5.0)
            .with_pointer_id(7)
            .with_modifiers(Modifiers::SHIFT);
        assert_eq!(event.kind, PointerEventKind::Down);
        assert_eq!(event.pointer_id, 7);
        assert_eq!(event.position, Point::new(4.0, 5.0));
        assert!(event.modifiers.contains(Modifiers::SHIFT));
        assert_eq!(event.button, PointerButton::Primary);
    }
}
