//! Input event types.
//!
//! These are the values the dispatcher routes through the tree. The terminal
//! backend converts whatever its event source produces into these; the core
//! never sees escape sequences.

/// Keyboard modifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
    };
}

/// A key, decoded from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    BackTab,
    Backspace,
    Delete,
    Insert,
    Esc,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
}

/// Press/release/repeat state of a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Press,
    Release,
    Repeat,
}

/// A keyboard event, routed to the focused widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
    pub state: KeyState,
}

impl KeyEvent {
    /// A plain key press with no modifiers.
    pub const fn press(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
            state: KeyState::Press,
        }
    }
}

/// Mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Scroll direction for wheel events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// What the mouse did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Down(MouseButton),
    Up(MouseButton),
    Move,
    Drag(MouseButton),
    Scroll(ScrollDirection),
}

/// A mouse event in absolute terminal coordinates.
///
/// Widgets translate to local coordinates through their absolute rect
/// (`Ui::abs_rect`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub action: MouseAction,
    /// Column, 0-indexed.
    pub x: u16,
    /// Row, 0-indexed.
    pub y: u16,
    pub modifiers: Modifiers,
}

impl MouseEvent {
    pub const fn new(action: MouseAction, x: u16, y: u16) -> Self {
        Self {
            action,
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    /// Whether this is a button press.
    pub fn is_press(&self) -> bool {
        matches!(self.action, MouseAction::Down(_))
    }

    /// Whether this is a button release.
    pub fn is_release(&self) -> bool {
        matches!(self.action, MouseAction::Up(_))
    }
}

/// A raw input event entering the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Key(KeyEvent),
    Mouse(MouseEvent),
    /// Terminal resized to (columns, rows). Bypasses hit-testing, goes to the
    /// root, and forces a full layout and repaint.
    Resize(u16, u16),
    /// Redraw tick with no input attached.
    Tick,
}

/// What a widget's input hook did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    /// The event was handled; propagation stops.
    Consumed,
    /// Not handled; the event bubbles to the parent.
    Ignored,
}

impl EventResult {
    #[inline]
    pub fn is_consumed(&self) -> bool {
        matches!(self, EventResult::Consumed)
    }
}
