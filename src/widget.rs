//! The widget capability trait and its paint surface.
//!
//! Heterogeneous widget kinds sit behind one trait with paint, measure, and
//! input hooks; behavior flags (`focusable`, `mouse_sink`) are methods rather
//! than a deep inheritance chain. The engine calls the hooks; widgets never
//! call each other directly (they talk through signals).

use crate::buffer::FrameBuffer;
use crate::error::Result;
use crate::event::{Event, EventResult};
use crate::session::Ui;
use crate::tree::WidgetId;
use crate::types::{Attr, Cell, Edges, Point, Rect, Rgba, Size};

// =============================================================================
// Style
// =============================================================================

/// Opaque per-widget style record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub fg: Rgba,
    pub bg: Rgba,
    pub attrs: Attr,
    /// Inset between the widget rect and its content rect.
    pub padding: Edges,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fg: Rgba::TERMINAL_DEFAULT,
            bg: Rgba::TERMINAL_DEFAULT,
            attrs: Attr::NONE,
            padding: Edges::ZERO,
        }
    }
}

impl Style {
    /// Style with the given background, default everything else.
    pub fn with_bg(bg: Rgba) -> Self {
        Self {
            bg,
            ..Self::default()
        }
    }
}

// =============================================================================
// Surface - the clipped paint target handed to widgets
// =============================================================================

/// The region of the frame buffer a widget may paint into.
///
/// Coordinates given to the drawing methods are local to the widget; the
/// surface translates them to absolute buffer positions and enforces the
/// clip (own rect intersected with all ancestor rects). Writes outside the
/// clip are silently dropped, so a widget cannot paint over its neighbors.
pub struct Surface<'a> {
    buffer: &'a mut FrameBuffer,
    origin: Point,
    size: Size,
    clip: Rect,
    style: Style,
}

impl<'a> Surface<'a> {
    pub(crate) fn new(
        buffer: &'a mut FrameBuffer,
        origin: Point,
        size: Size,
        clip: Rect,
        style: Style,
    ) -> Self {
        Self {
            buffer,
            origin,
            size,
            clip,
            style,
        }
    }

    /// The widget's size in cells.
    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    /// The widget's style record.
    #[inline]
    pub fn style(&self) -> Style {
        self.style
    }

    fn to_abs(&self, x: u16, y: u16) -> (u16, u16) {
        (
            self.origin.x.saturating_add(x),
            self.origin.y.saturating_add(y),
        )
    }

    /// Set one cell at local coordinates.
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        let (ax, ay) = self.to_abs(x, y);
        self.buffer.set_cell(ax, ay, cell, Some(&self.clip));
    }

    /// Fill a local rect with a background color.
    pub fn fill(&mut self, rect: Rect, bg: Rgba) {
        let abs = rect.translated(self.origin);
        self.buffer.fill_rect(abs, bg, Some(&self.clip));
    }

    /// Fill the whole widget with its style background.
    pub fn clear(&mut self) {
        let bg = self.style.bg;
        self.fill(Rect::from_size(self.size), bg);
    }

    /// Draw text at local coordinates; returns columns used.
    pub fn print(&mut self, x: u16, y: u16, text: &str, fg: Rgba, bg: Rgba, attrs: Attr) {
        let (ax, ay) = self.to_abs(x, y);
        self.buffer.draw_text(ax, ay, text, fg, bg, attrs, Some(&self.clip));
    }

    /// Draw text in the widget's style colors.
    pub fn print_styled(&mut self, x: u16, y: u16, text: &str) {
        let Style { fg, bg, attrs, .. } = self.style;
        self.print(x, y, text, fg, bg, attrs);
    }
}

// =============================================================================
// Widget trait
// =============================================================================

/// Behavior hooks for one node in the widget tree.
///
/// All hooks run on the single UI thread; none may block. `handle_event` and
/// `on_focus` receive the session so a widget can mark itself dirty, emit
/// signals, or move focus — the widget itself is temporarily detached from
/// the arena while its hook runs, so using its own id through the session
/// (other than for destruction) is safe.
pub trait Widget {
    /// Intrinsic content size, consulted by the measure pass when the
    /// widget's size policy is `FitContent`.
    fn measure(&self, _style: &Style) -> Size {
        Size::ZERO
    }

    /// Paint into the clipped surface. Errors do not abort the frame: the
    /// compositor blanks the widget's region and continues.
    fn paint(&self, surface: &mut Surface<'_>) -> Result<()> {
        surface.clear();
        Ok(())
    }

    /// React to an input event. Return `Consumed` to stop propagation,
    /// `Ignored` to let it bubble to the parent.
    fn handle_event(&mut self, _ui: &mut Ui, _id: WidgetId, _event: &Event) -> EventResult {
        EventResult::Ignored
    }

    /// Focus gained (`true`) or lost (`false`).
    fn on_focus(&mut self, _ui: &mut Ui, _id: WidgetId, _gained: bool) {}

    /// A mouse sink stops hit-test descent: events over any of its children
    /// are delivered to it instead.
    fn mouse_sink(&self) -> bool {
        false
    }

    /// Whether the widget participates in keyboard focus.
    fn focusable(&self) -> bool {
        false
    }
}

/// The trivial container widget: paints its background, handles nothing.
///
/// Applications that only need grouping and layout use `Pane` directly;
/// richer widgets implement [`Widget`] themselves.
pub struct Pane;

impl Widget for Pane {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_translates_and_clips() {
        let mut buf = FrameBuffer::new(10, 4);
        let clip = Rect::new(2, 1, 4, 2);
        let mut surface = Surface::new(
            &mut buf,
            Point::new(2, 1),
            Size::new(6, 3),
            clip,
            Style::default(),
        );

        surface.set(0, 0, Cell::new('a', Rgba::WHITE, Rgba::BLACK));
        // Outside the clip (x=5 local -> x=7 abs), dropped.
        surface.set(5, 0, Cell::new('b', Rgba::WHITE, Rgba::BLACK));

        assert_eq!(buf.get(2, 1).unwrap().ch, 'a');
        assert_eq!(buf.get(7, 1).unwrap().ch, ' ');
    }

    #[test]
    fn test_surface_clear_uses_style_bg() {
        let mut buf = FrameBuffer::new(6, 2);
        let style = Style::with_bg(Rgba::BLUE);
        let clip = Rect::new(0, 0, 3, 2);
        let mut surface = Surface::new(&mut buf, Point::new(0, 0), Size::new(3, 2), clip, style);
        surface.clear();
        assert_eq!(buf.get(0, 0).unwrap().bg, Rgba::BLUE);
        assert_eq!(buf.get(2, 1).unwrap().bg, Rgba::BLUE);
        assert_eq!(buf.get(3, 0).unwrap().bg, Rgba::TERMINAL_DEFAULT);
    }

    #[test]
    fn test_pane_default_paint_clears() {
        let mut buf = FrameBuffer::new(4, 1);
        let style = Style::with_bg(Rgba::RED);
        let clip = Rect::new(0, 0, 4, 1);
        let mut surface = Surface::new(&mut buf, Point::new(0, 0), Size::new(4, 1), clip, style);
        Pane.paint(&mut surface).unwrap();
        assert_eq!(buf.get(3, 0).unwrap().bg, Rgba::RED);
    }
}
