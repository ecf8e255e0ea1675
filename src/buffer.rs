//! FrameBuffer and drawing primitives.
//!
//! The FrameBuffer is a 2D grid of Cells representing one rendered frame.
//! All composition happens on buffers; the compositor owns two of them
//! (current, previous) and diffs them after each compose.
//!
//! # Design decisions
//!
//! - **Flat storage**: `Vec<Cell>` with row-major indexing for cache efficiency.
//! - **Clipping**: drawing functions accept an optional clip `Rect`; writes
//!   outside it are dropped.
//! - **Alpha blending**: translucent backgrounds blend with existing cells.
//! - **Wide characters**: emoji and CJK glyphs occupy two columns; the second
//!   holds a continuation marker cell.

use unicode_width::UnicodeWidthChar;

use crate::types::{Attr, Cell, Rect, Rgba};

/// A 2D buffer of terminal cells.
///
/// Uses flat storage with row-major indexing: `index = y * width + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    /// Create a new buffer filled with default cells.
    pub fn new(width: u16, height: u16) -> Self {
        let size = width as usize * height as usize;
        Self {
            width,
            height,
            cells: vec![Cell::default(); size],
        }
    }

    /// Get buffer width.
    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Get buffer height.
    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// The full buffer bounds.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Convert (x, y) to flat index.
    #[inline]
    fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Check if coordinates are in bounds.
    #[inline]
    pub fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    /// Get a cell reference (None if out of bounds).
    #[inline]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    /// Get a mutable cell reference (None if out of bounds).
    #[inline]
    pub fn get_mut(&mut self, x: u16, y: u16) -> Option<&mut Cell> {
        if self.in_bounds(x, y) {
            let idx = self.index(x, y);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    /// One row of cells.
    pub fn row(&self, y: u16) -> &[Cell] {
        let start = self.index(0, y);
        &self.cells[start..start + self.width as usize]
    }

    /// Reset every cell to the default.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    /// Resize the buffer (clears content).
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let size = width as usize * height as usize;
        self.cells.clear();
        self.cells.resize(size, Cell::default());
    }

    // =========================================================================
    // Drawing primitives
    // =========================================================================

    /// Set a single cell with optional clipping.
    ///
    /// Returns true if the cell was written. Overwriting half of a wide glyph
    /// blanks the orphaned half so no torn glyph survives.
    pub fn set_cell(&mut self, x: u16, y: u16, cell: Cell, clip: Option<&Rect>) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        if let Some(clip) = clip {
            if !clip.contains(x, y) {
                return false;
            }
        }

        self.repair_wide_glyph(x, y);

        let idx = self.index(x, y);
        let dst = &mut self.cells[idx];

        let bg = if cell.bg.is_opaque() || cell.bg.is_terminal_default() || cell.bg.is_ansi() {
            cell.bg
        } else {
            Rgba::blend(cell.bg, dst.bg)
        };

        *dst = Cell { bg, ..cell };
        true
    }

    /// Blank the other half of a wide glyph about to be partially overwritten.
    fn repair_wide_glyph(&mut self, x: u16, y: u16) {
        let idx = self.index(x, y);
        if self.cells[idx].is_continuation() {
            // Overwriting a tail: blank the head to its background.
            if x > 0 {
                let head = self.index(x - 1, y);
                let bg = self.cells[head].bg;
                self.cells[head] = Cell::blank(bg);
            }
        } else if x + 1 < self.width {
            // Overwriting a head whose tail follows: blank the tail.
            let tail = self.index(x + 1, y);
            if self.cells[tail].is_continuation() {
                let bg = self.cells[tail].bg;
                self.cells[tail] = Cell::blank(bg);
            }
        }
    }

    /// Fill a rectangle with a background color, clearing glyphs.
    pub fn fill_rect(&mut self, rect: Rect, bg: Rgba, clip: Option<&Rect>) {
        let mut target = match rect.intersect(&self.bounds()) {
            Some(r) => r,
            None => return,
        };
        if let Some(clip) = clip {
            target = match target.intersect(clip) {
                Some(r) => r,
                None => return,
            };
        }

        let is_opaque = bg.is_opaque() || bg.is_terminal_default() || bg.is_ansi();

        for y in target.y..target.bottom() {
            let start = self.index(target.x, y);
            let end = self.index(target.right() - 1, y) + 1;
            for cell in &mut self.cells[start..end] {
                cell.bg = if is_opaque {
                    bg
                } else {
                    Rgba::blend(bg, cell.bg)
                };
                cell.ch = ' ';
                cell.fg = Rgba::TERMINAL_DEFAULT;
                cell.attrs = Attr::NONE;
            }
        }
    }

    /// Draw text at a position.
    ///
    /// Returns the number of columns used (wide glyphs count as two).
    /// A wide glyph that would straddle the clip edge or the buffer edge is
    /// skipped entirely rather than torn.
    pub fn draw_text(
        &mut self,
        x: u16,
        y: u16,
        text: &str,
        fg: Rgba,
        bg: Rgba,
        attrs: Attr,
        clip: Option<&Rect>,
    ) -> u16 {
        let mut col = x;

        for ch in text.chars() {
            if col >= self.width {
                break;
            }

            let w = ch.width().unwrap_or(0) as u16;
            if w == 0 {
                continue;
            }

            if w == 2 {
                // Both columns must land inside buffer and clip.
                let tail_ok = col + 1 < self.width
                    && clip.map_or(true, |c| c.contains(col, y) && c.contains(col + 1, y));
                if tail_ok {
                    self.set_cell(col, y, Cell { ch, fg, bg, attrs }, clip);
                    self.repair_wide_glyph(col + 1, y);
                    let idx = self.index(col + 1, y);
                    let dst_bg = self.cells[idx].bg;
                    self.cells[idx] = Cell {
                        ch: '\0',
                        fg,
                        bg: if bg.is_transparent() {
                            dst_bg
                        } else {
                            Rgba::blend(bg, dst_bg)
                        },
                        attrs,
                    };
                }
                col += 2;
            } else {
                self.set_cell(col, y, Cell { ch, fg, bg, attrs }, clip);
                col += 1;
            }
        }

        col.saturating_sub(x)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_blank() {
        let buf = FrameBuffer::new(4, 2);
        assert_eq!(buf.width(), 4);
        assert_eq!(buf.height(), 2);
        for y in 0..2 {
            for x in 0..4 {
                assert_eq!(*buf.get(x, y).unwrap(), Cell::default());
            }
        }
    }

    #[test]
    fn test_set_cell_respects_clip() {
        let mut buf = FrameBuffer::new(10, 5);
        let clip = Rect::new(2, 1, 3, 2);
        let cell = Cell::new('x', Rgba::WHITE, Rgba::BLACK);

        assert!(buf.set_cell(2, 1, cell, Some(&clip)));
        assert!(!buf.set_cell(0, 0, cell, Some(&clip)));
        assert!(!buf.set_cell(5, 1, cell, Some(&clip)));
        assert_eq!(buf.get(2, 1).unwrap().ch, 'x');
        assert_eq!(buf.get(0, 0).unwrap().ch, ' ');
    }

    #[test]
    fn test_set_cell_out_of_bounds() {
        let mut buf = FrameBuffer::new(3, 3);
        let cell = Cell::new('x', Rgba::WHITE, Rgba::BLACK);
        assert!(!buf.set_cell(3, 0, cell, None));
        assert!(!buf.set_cell(0, 3, cell, None));
    }

    #[test]
    fn test_draw_text_wide_glyph_continuation() {
        let mut buf = FrameBuffer::new(10, 1);
        let used = buf.draw_text(0, 0, "日a", Rgba::WHITE, Rgba::BLACK, Attr::NONE, None);
        assert_eq!(used, 3);
        assert_eq!(buf.get(0, 0).unwrap().ch, '日');
        assert!(buf.get(1, 0).unwrap().is_continuation());
        assert_eq!(buf.get(2, 0).unwrap().ch, 'a');
    }

    #[test]
    fn test_draw_text_wide_glyph_skipped_at_edge() {
        let mut buf = FrameBuffer::new(3, 1);
        buf.draw_text(2, 0, "日", Rgba::WHITE, Rgba::BLACK, Attr::NONE, None);
        // No room for the tail, so nothing is drawn.
        assert_eq!(buf.get(2, 0).unwrap().ch, ' ');
    }

    #[test]
    fn test_overwrite_wide_head_blanks_tail() {
        let mut buf = FrameBuffer::new(4, 1);
        buf.draw_text(0, 0, "日", Rgba::WHITE, Rgba::BLACK, Attr::NONE, None);
        buf.set_cell(0, 0, Cell::new('x', Rgba::WHITE, Rgba::BLACK), None);
        assert_eq!(buf.get(0, 0).unwrap().ch, 'x');
        assert!(!buf.get(1, 0).unwrap().is_continuation());
    }

    #[test]
    fn test_overwrite_wide_tail_blanks_head() {
        let mut buf = FrameBuffer::new(4, 1);
        buf.draw_text(0, 0, "日", Rgba::WHITE, Rgba::BLACK, Attr::NONE, None);
        buf.set_cell(1, 0, Cell::new('x', Rgba::WHITE, Rgba::BLACK), None);
        assert_eq!(buf.get(0, 0).unwrap().ch, ' ');
        assert_eq!(buf.get(1, 0).unwrap().ch, 'x');
    }

    #[test]
    fn test_fill_rect_clipped() {
        let mut buf = FrameBuffer::new(6, 4);
        let clip = Rect::new(0, 0, 3, 4);
        buf.fill_rect(Rect::new(0, 0, 6, 4), Rgba::BLUE, Some(&clip));
        assert_eq!(buf.get(2, 0).unwrap().bg, Rgba::BLUE);
        assert_eq!(buf.get(3, 0).unwrap().bg, Rgba::TERMINAL_DEFAULT);
    }

    #[test]
    fn test_fill_rect_translucent_blends() {
        let mut buf = FrameBuffer::new(2, 1);
        buf.fill_rect(Rect::new(0, 0, 2, 1), Rgba::rgb(0, 0, 255), None);
        buf.fill_rect(Rect::new(0, 0, 2, 1), Rgba::new(255, 0, 0, 128), None);
        let bg = buf.get(0, 0).unwrap().bg;
        assert!(bg.r > 0 && bg.b > 0);
    }

    #[test]
    fn test_resize_clears() {
        let mut buf = FrameBuffer::new(2, 2);
        buf.set_cell(0, 0, Cell::new('x', Rgba::WHITE, Rgba::BLACK), None);
        buf.resize(5, 3);
        assert_eq!(buf.width(), 5);
        assert_eq!(buf.height(), 3);
        assert_eq!(buf.get(0, 0).unwrap().ch, ' ');
    }
}
