//! Compositor: double-buffered composition and minimal-diff patch emission.
//!
//! Each cycle the visible widget tree is painted into the `current` buffer
//! (later children over earlier ones, every widget clipped to its rect
//! intersected with all ancestor rects). The buffer is then diffed cell by
//! cell against `previous`; only changed runs become patches. After the
//! backend has taken the patches the buffers swap, so the frame just shown
//! becomes the baseline for the next diff.
//!
//! A resize reallocates both buffers and forces a full diff, since the old
//! baseline no longer matches the terminal.

use tracing::{trace, warn};

use crate::buffer::FrameBuffer;
use crate::tree::{WidgetArena, WidgetId};
use crate::types::{Cell, Point, Rect};
use crate::widget::Surface;

/// One run of changed cells on a single row.
///
/// Applying every patch of a cycle to a copy of the previous frame yields
/// exactly the current frame; that property is what the tests hold the diff
/// to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub row: u16,
    pub col: u16,
    pub cells: Vec<Cell>,
}

/// Apply a patch sequence to a buffer (test and backend helper).
pub fn apply_patches(buffer: &mut FrameBuffer, patches: &[Patch]) {
    for patch in patches {
        for (i, &cell) in patch.cells.iter().enumerate() {
            if let Some(dst) = buffer.get_mut(patch.col + i as u16, patch.row) {
                *dst = cell;
            }
        }
    }
}

/// Double-buffered compositor.
pub struct Compositor {
    current: FrameBuffer,
    previous: FrameBuffer,
    /// Treat the previous buffer as stale (first frame, resize, corruption).
    full_repaint: bool,
}

impl Compositor {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            current: FrameBuffer::new(width, height),
            previous: FrameBuffer::new(width, height),
            full_repaint: true,
        }
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.current.width()
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.current.height()
    }

    /// The frame most recently composed (valid between compose and diff).
    pub fn current(&self) -> &FrameBuffer {
        &self.current
    }

    /// The frame the terminal is showing (valid after a diff-and-swap).
    pub fn shown(&self) -> &FrameBuffer {
        &self.previous
    }

    /// Resize both buffers; the next diff is a full repaint.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.current.resize(width, height);
        self.previous.resize(width, height);
        self.full_repaint = true;
    }

    /// Force the next diff to cover the whole screen.
    pub fn invalidate(&mut self) {
        self.full_repaint = true;
    }

    /// Paint the visible tree into the current buffer.
    ///
    /// A widget whose paint hook fails is blanked to its style background and
    /// the frame continues; one bad widget cannot abort the cycle.
    pub fn compose(&mut self, arena: &WidgetArena, root: Option<WidgetId>) {
        self.current.clear();
        let bounds = self.current.bounds();
        if let Some(root) = root {
            paint_widget(&mut self.current, arena, root, Point::new(0, 0), bounds);
        }
    }

    /// Diff current against previous and swap.
    ///
    /// Returns the minimal ordered patch list transforming the frame the
    /// terminal shows into the frame just composed. An unchanged frame
    /// returns no patches.
    pub fn diff_and_swap(&mut self) -> Vec<Patch> {
        let width = self.current.width();
        let height = self.current.height();
        let mut patches = Vec::new();

        for y in 0..height {
            let cur = self.current.row(y);
            if self.full_repaint {
                if width > 0 {
                    patches.push(Patch {
                        row: y,
                        col: 0,
                        cells: cur.to_vec(),
                    });
                }
                continue;
            }

            let prev = self.previous.row(y);
            let mut run_start: Option<u16> = None;
            for x in 0..width as usize {
                if cur[x] != prev[x] {
                    if run_start.is_none() {
                        run_start = Some(x as u16);
                    }
                } else if let Some(start) = run_start.take() {
                    patches.push(Patch {
                        row: y,
                        col: start,
                        cells: cur[start as usize..x].to_vec(),
                    });
                }
            }
            if let Some(start) = run_start {
                patches.push(Patch {
                    row: y,
                    col: start,
                    cells: cur[start as usize..].to_vec(),
                });
            }
        }

        trace!(patches = patches.len(), full = self.full_repaint, "frame diff");
        self.full_repaint = false;
        std::mem::swap(&mut self.current, &mut self.previous);
        patches
    }
}

/// Recursive paint: widget first, then children in order (later on top).
fn paint_widget(
    buffer: &mut FrameBuffer,
    arena: &WidgetArena,
    id: WidgetId,
    parent_origin: Point,
    parent_clip: Rect,
) {
    let node = match arena.get(id) {
        Ok(node) => node,
        Err(_) => return,
    };
    if !node.visible {
        return;
    }

    let abs = node.rect.translated(parent_origin);
    let clip = match abs.intersect(&parent_clip) {
        Some(clip) => clip,
        None => return, // fully clipped, children too
    };

    let mut surface = Surface::new(buffer, abs.origin(), node.rect.size(), clip, node.style);
    match node.widget.as_ref() {
        Some(widget) => {
            if let Err(err) = widget.paint(&mut surface) {
                warn!(?id, "paint failed: {err}; blanking widget");
                buffer.fill_rect(clip, node.style.bg, None);
            }
        }
        None => {
            // Hook in flight elsewhere; paint the background only.
            surface.clear();
        }
    }

    let child_origin = abs.origin();
    for &child in &node.children {
        paint_widget(buffer, arena, child, child_origin, clip);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::tree::Node;
    use crate::types::{Rgba, Size};
    use crate::widget::{Pane, Style, Widget};

    struct Glyph(char);
    impl Widget for Glyph {
        fn paint(&self, surface: &mut Surface<'_>) -> Result<()> {
            surface.clear();
            let size = surface.size();
            for y in 0..size.height {
                for x in 0..size.width {
                    let style = surface.style();
                    surface.set(x, y, Cell::new(self.0, style.fg, style.bg));
                }
            }
            Ok(())
        }
    }

    struct Failing;
    impl Widget for Failing {
        fn paint(&self, _surface: &mut Surface<'_>) -> Result<()> {
            Err(crate::error::Error::Io(std::io::Error::other("boom")))
        }
    }

    fn tree_with(
        arena: &mut WidgetArena,
        widget: Box<dyn Widget>,
        rect: Rect,
    ) -> (WidgetId, WidgetId) {
        let root = arena.insert(Node::new(Box::new(Pane), Style::default()));
        arena.get_mut(root).unwrap().rect = Rect::new(0, 0, 10, 4);
        let child = arena.insert(Node::new(widget, Style::with_bg(Rgba::BLUE)));
        {
            let n = arena.get_mut(child).unwrap();
            n.rect = rect;
            n.parent = Some(root);
        }
        arena.get_mut(root).unwrap().children.push(child);
        (root, child)
    }

    #[test]
    fn test_compose_paints_child_clipped_to_parent() {
        let mut arena = WidgetArena::new();
        // Child extends past the parent; the overhang must not paint.
        let (root, _) = tree_with(&mut arena, Box::new(Glyph('x')), Rect::new(8, 0, 5, 1));
        let mut comp = Compositor::new(10, 4);
        comp.compose(&arena, Some(root));

        assert_eq!(comp.current().get(8, 0).unwrap().ch, 'x');
        assert_eq!(comp.current().get(9, 0).unwrap().ch, 'x');
        // (10,0) is outside the buffer entirely; nothing to check past 9.
        assert_eq!(comp.current().get(7, 0).unwrap().ch, ' ');
    }

    #[test]
    fn test_later_sibling_paints_on_top() {
        let mut arena = WidgetArena::new();
        let root = arena.insert(Node::new(Box::new(Pane), Style::default()));
        arena.get_mut(root).unwrap().rect = Rect::new(0, 0, 6, 1);
        let mut add = |ch: char| {
            let id = arena.insert(Node::new(Box::new(Glyph(ch)), Style::default()));
            let n = arena.get_mut(id).unwrap();
            n.rect = Rect::new(0, 0, 6, 1);
            n.parent = Some(root);
            id
        };
        let a = add('a');
        let b = add('b');
        arena.get_mut(root).unwrap().children = vec![a, b];

        let mut comp = Compositor::new(6, 1);
        comp.compose(&arena, Some(root));
        assert_eq!(comp.current().get(3, 0).unwrap().ch, 'b');
    }

    #[test]
    fn test_failing_widget_is_blanked_not_fatal() {
        let mut arena = WidgetArena::new();
        let (root, _) = tree_with(&mut arena, Box::new(Failing), Rect::new(2, 1, 3, 2));
        let mut comp = Compositor::new(10, 4);
        comp.compose(&arena, Some(root));

        // Blanked to the widget's style background.
        assert_eq!(comp.current().get(2, 1).unwrap().bg, Rgba::BLUE);
        assert_eq!(comp.current().get(2, 1).unwrap().ch, ' ');
    }

    #[test]
    fn test_invisible_subtree_skipped() {
        let mut arena = WidgetArena::new();
        let (root, child) = tree_with(&mut arena, Box::new(Glyph('x')), Rect::new(0, 0, 4, 1));
        arena.get_mut(child).unwrap().visible = false;

        let mut comp = Compositor::new(10, 4);
        comp.compose(&arena, Some(root));
        assert_eq!(comp.current().get(0, 0).unwrap().ch, ' ');
    }

    #[test]
    fn test_first_diff_is_full() {
        let arena = WidgetArena::new();
        let mut comp = Compositor::new(4, 3);
        comp.compose(&arena, None);
        let patches = comp.diff_and_swap();
        assert_eq!(patches.len(), 3);
        assert!(patches.iter().all(|p| p.col == 0 && p.cells.len() == 4));
    }

    #[test]
    fn test_unchanged_frame_yields_no_patches() {
        let arena = WidgetArena::new();
        let mut comp = Compositor::new(4, 3);
        comp.compose(&arena, None);
        comp.diff_and_swap();

        comp.compose(&arena, None);
        assert!(comp.diff_and_swap().is_empty());
    }

    #[test]
    fn test_diff_emits_minimal_runs() {
        let mut arena = WidgetArena::new();
        let (root, child) = tree_with(&mut arena, Box::new(Glyph('x')), Rect::new(2, 1, 3, 1));
        let mut comp = Compositor::new(10, 4);
        comp.compose(&arena, Some(root));
        comp.diff_and_swap();

        // Move the child one cell right. Only the leading edge (col 2 goes
        // blank) and trailing edge (col 5 gains a glyph) change; the overlap
        // is identical and must not be re-emitted.
        arena.get_mut(child).unwrap().rect = Rect::new(3, 1, 3, 1);
        comp.compose(&arena, Some(root));
        let patches = comp.diff_and_swap();

        assert_eq!(patches.len(), 2);
        assert_eq!((patches[0].row, patches[0].col), (1, 2));
        assert_eq!(patches[0].cells.len(), 1);
        assert_eq!((patches[1].row, patches[1].col), (1, 5));
        assert_eq!(patches[1].cells.len(), 1);
    }

    #[test]
    fn test_patches_transform_previous_into_current() {
        let mut arena = WidgetArena::new();
        let (root, child) = tree_with(&mut arena, Box::new(Glyph('x')), Rect::new(0, 0, 5, 2));
        let mut comp = Compositor::new(10, 4);
        comp.compose(&arena, Some(root));
        let mut shadow = FrameBuffer::new(10, 4);
        apply_patches(&mut shadow, &comp.diff_and_swap());

        arena.get_mut(child).unwrap().rect = Rect::new(4, 2, 5, 2);
        comp.compose(&arena, Some(root));
        let reference = comp.current().clone();
        apply_patches(&mut shadow, &comp.diff_and_swap());

        assert_eq!(shadow, reference);
    }

    #[test]
    fn test_resize_forces_full_diff() {
        let arena = WidgetArena::new();
        let mut comp = Compositor::new(8, 2);
        comp.compose(&arena, None);
        comp.diff_and_swap();

        comp.resize(10, 2);
        comp.compose(&arena, None);
        let patches = comp.diff_and_swap();
        assert_eq!(patches.len(), 2);
        assert!(patches.iter().all(|p| p.cells.len() == 10));
    }
}
