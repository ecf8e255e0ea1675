//! Terminal backend - raw-mode setup, input decoding, patch flushing.
//!
//! The engine core never touches the terminal directly; it talks to a
//! [`Backend`]. The crossterm-based implementation here decodes input into
//! the engine's event types and writes diff patches as ANSI, tracking the
//! terminal's last-emitted colors and attributes so unchanged state costs
//! no escape codes.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event as CrosstermEvent, KeyCode,
    KeyEventKind, KeyModifiers, MouseButton as CrosstermMouseButton,
    MouseEvent as CrosstermMouseEvent, MouseEventKind,
};
use crossterm::style::{Attribute, Color, SetAttribute, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use tracing::warn;

use crate::compositor::Patch;
use crate::error::Result;
use crate::event::{
    Event, Key, KeyEvent, KeyState, Modifiers, MouseAction, MouseButton, MouseEvent,
    ScrollDirection,
};
use crate::types::{Attr, Cell, Rgba};

// =============================================================================
// Backend trait
// =============================================================================

/// What the run loop needs from a terminal.
///
/// Implementations own the physical side: querying size, blocking for input,
/// and turning diff patches into bytes on the wire.
pub trait Backend {
    /// Current terminal size as (columns, rows).
    fn size(&self) -> Result<(u16, u16)>;

    /// Wait for the next input event. `None` timeout blocks indefinitely;
    /// with a timeout, `Ok(None)` means it expired without input.
    fn read_event(&mut self, timeout: Option<Duration>) -> Result<Option<Event>>;

    /// Queue a batch of diff patches.
    fn apply(&mut self, patches: &[Patch]) -> Result<()>;

    /// Flush everything queued to the terminal in one write.
    fn present(&mut self) -> Result<()>;
}

// =============================================================================
// Crossterm backend
// =============================================================================

/// Backend over a crossterm terminal.
///
/// Construction with [`CrosstermBackend::stdout`] enters raw mode and the
/// alternate screen and enables mouse capture; `Drop` restores the terminal
/// even on panic unwind.
pub struct CrosstermBackend<W: Write> {
    writer: W,
    /// Whether this instance changed terminal modes and must undo them.
    owns_terminal: bool,
    last_pos: Option<(u16, u16)>,
    last_fg: Option<Rgba>,
    last_bg: Option<Rgba>,
    last_attrs: Attr,
}

impl CrosstermBackend<io::Stdout> {
    /// Take over the terminal: raw mode, alternate screen, mouse capture,
    /// hidden cursor.
    pub fn stdout() -> Result<Self> {
        enable_raw_mode()?;
        let mut writer = io::stdout();
        execute!(
            writer,
            EnterAlternateScreen,
            EnableMouseCapture,
            crossterm::cursor::Hide
        )?;
        Ok(Self::from_writer(writer, true))
    }
}

impl<W: Write> CrosstermBackend<W> {
    /// Wrap an arbitrary writer without touching terminal modes. Output is
    /// still ANSI; useful for capturing frames in tests.
    pub fn with_writer(writer: W) -> Self {
        Self::from_writer(writer, false)
    }

    fn from_writer(writer: W, owns_terminal: bool) -> Self {
        Self {
            writer,
            owns_terminal,
            last_pos: None,
            last_fg: None,
            last_bg: None,
            last_attrs: Attr::NONE,
        }
    }

    /// Drop cached emission state so the next patch re-emits everything.
    pub fn reset_state(&mut self) {
        self.last_pos = None;
        self.last_fg = None;
        self.last_bg = None;
        self.last_attrs = Attr::NONE;
    }

    fn emit_cell(&mut self, x: u16, y: u16, cell: &Cell) -> io::Result<()> {
        // Continuation columns carry no glyph; the wide head already drew
        // into them. Track position so the run stays sequential.
        if cell.is_continuation() {
            self.last_pos = Some((x, y));
            return Ok(());
        }

        let sequential = matches!(self.last_pos, Some((px, py)) if py == y && px + 1 == x);
        if !sequential {
            queue!(self.writer, MoveTo(x, y))?;
        }

        if cell.attrs != self.last_attrs {
            // Attribute changes reset everything, so colors must re-emit.
            queue!(self.writer, SetAttribute(Attribute::Reset))?;
            for attr in attribute_list(cell.attrs) {
                queue!(self.writer, SetAttribute(attr))?;
            }
            self.last_attrs = cell.attrs;
            self.last_fg = None;
            self.last_bg = None;
        }

        if self.last_fg != Some(cell.fg) {
            queue!(self.writer, SetForegroundColor(convert_color(cell.fg)))?;
            self.last_fg = Some(cell.fg);
        }
        if self.last_bg != Some(cell.bg) {
            queue!(self.writer, SetBackgroundColor(convert_color(cell.bg)))?;
            self.last_bg = Some(cell.bg);
        }

        let mut utf8 = [0u8; 4];
        self.writer.write_all(cell.ch.encode_utf8(&mut utf8).as_bytes())?;
        self.last_pos = Some((x, y));
        Ok(())
    }
}

impl<W: Write> Backend for CrosstermBackend<W> {
    fn size(&self) -> Result<(u16, u16)> {
        Ok(crossterm::terminal::size()?)
    }

    fn read_event(&mut self, timeout: Option<Duration>) -> Result<Option<Event>> {
        loop {
            if let Some(timeout) = timeout {
                if !event::poll(timeout)? {
                    return Ok(None);
                }
            }
            // Focus and paste notifications have no engine counterpart yet.
            if let Some(converted) = convert_event(event::read()?) {
                return Ok(Some(converted));
            }
        }
    }

    fn apply(&mut self, patches: &[Patch]) -> Result<()> {
        for patch in patches {
            let mut x = patch.col;
            for cell in &patch.cells {
                self.emit_cell(x, patch.row, cell)?;
                x = x.saturating_add(1);
            }
        }
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for CrosstermBackend<W> {
    fn drop(&mut self) {
        if !self.owns_terminal {
            return;
        }
        let restore = execute!(
            self.writer,
            SetAttribute(Attribute::Reset),
            crossterm::cursor::Show,
            DisableMouseCapture,
            LeaveAlternateScreen
        )
        .and_then(|_| disable_raw_mode());
        if let Err(err) = restore {
            warn!("failed to restore terminal: {err}");
        }
    }
}

// =============================================================================
// Event conversion
// =============================================================================

/// Decode a crossterm event; `None` for kinds the engine does not route
/// (focus changes, bracketed paste).
pub(crate) fn convert_event(event: CrosstermEvent) -> Option<Event> {
    match event {
        CrosstermEvent::Key(key) => convert_key_event(key).map(Event::Key),
        CrosstermEvent::Mouse(mouse) => Some(Event::Mouse(convert_mouse_event(mouse))),
        CrosstermEvent::Resize(width, height) => Some(Event::Resize(width, height)),
        CrosstermEvent::FocusGained | CrosstermEvent::FocusLost | CrosstermEvent::Paste(_) => None,
    }
}

fn convert_key_event(event: crossterm::event::KeyEvent) -> Option<KeyEvent> {
    let key = match event.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Insert => Key::Insert,
        KeyCode::Esc => Key::Esc,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::F(n) => Key::F(n),
        _ => return None,
    };
    let state = match event.kind {
        KeyEventKind::Press => KeyState::Press,
        KeyEventKind::Repeat => KeyState::Repeat,
        KeyEventKind::Release => KeyState::Release,
    };
    Some(KeyEvent {
        key,
        modifiers: convert_modifiers(event.modifiers),
        state,
    })
}

fn convert_mouse_event(event: CrosstermMouseEvent) -> MouseEvent {
    let action = match event.kind {
        MouseEventKind::Down(btn) => MouseAction::Down(convert_mouse_button(btn)),
        MouseEventKind::Up(btn) => MouseAction::Up(convert_mouse_button(btn)),
        MouseEventKind::Drag(btn) => MouseAction::Drag(convert_mouse_button(btn)),
        MouseEventKind::Moved => MouseAction::Move,
        MouseEventKind::ScrollUp => MouseAction::Scroll(ScrollDirection::Up),
        MouseEventKind::ScrollDown => MouseAction::Scroll(ScrollDirection::Down),
        MouseEventKind::ScrollLeft => MouseAction::Scroll(ScrollDirection::Left),
        MouseEventKind::ScrollRight => MouseAction::Scroll(ScrollDirection::Right),
    };
    MouseEvent {
        action,
        x: event.column,
        y: event.row,
        modifiers: convert_modifiers(event.modifiers),
    }
}

fn convert_mouse_button(btn: CrosstermMouseButton) -> MouseButton {
    match btn {
        CrosstermMouseButton::Left => MouseButton::Left,
        CrosstermMouseButton::Middle => MouseButton::Middle,
        CrosstermMouseButton::Right => MouseButton::Right,
    }
}

fn convert_modifiers(mods: KeyModifiers) -> Modifiers {
    Modifiers {
        ctrl: mods.contains(KeyModifiers::CONTROL),
        alt: mods.contains(KeyModifiers::ALT),
        shift: mods.contains(KeyModifiers::SHIFT),
    }
}

fn convert_color(color: Rgba) -> Color {
    if color.is_terminal_default() {
        Color::Reset
    } else if color.is_ansi() {
        Color::AnsiValue(color.ansi_index())
    } else {
        Color::Rgb {
            r: color.r as u8,
            g: color.g as u8,
            b: color.b as u8,
        }
    }
}

fn attribute_list(attrs: Attr) -> Vec<Attribute> {
    let mut out = Vec::new();
    if attrs.contains(Attr::BOLD) {
        out.push(Attribute::Bold);
    }
    if attrs.contains(Attr::DIM) {
        out.push(Attribute::Dim);
    }
    if attrs.contains(Attr::ITALIC) {
        out.push(Attribute::Italic);
    }
    if attrs.contains(Attr::UNDERLINE) {
        out.push(Attribute::Underlined);
    }
    if attrs.contains(Attr::BLINK) {
        out.push(Attribute::SlowBlink);
    }
    if attrs.contains(Attr::INVERSE) {
        out.push(Attribute::Reverse);
    }
    if attrs.contains(Attr::HIDDEN) {
        out.push(Attribute::Hidden);
    }
    if attrs.contains(Attr::STRIKETHROUGH) {
        out.push(Attribute::CrossedOut);
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
