//! Layout engine: constraint resolution over the widget tree.
//!
//! # Algorithm
//!
//! Two passes over the (dirty) subtree:
//!
//! 1. **Measure** (leaves → root): compute each node's intrinsic size from
//!    its children and its widget's `measure` hook, cached in `Node::measured`.
//! 2. **Arrange** (root → leaves): with the node's rect already fixed,
//!    distribute child rects inside the content area according to the
//!    container policy, clamp every child into the content rect, recurse.
//!
//! Zero or exhausted space degrades to zero-sized geometry, never an error.
//! A recursion bound guards against cyclic size dependencies: the offending
//! subtree is zero-sized and reported instead of recursing unboundedly.

use tracing::warn;

use crate::error::{Error, Result};
use crate::tree::{WidgetArena, WidgetId};
use crate::types::{Rect, Size};

/// Maximum tree depth the solver will recurse through.
pub const MAX_LAYOUT_DEPTH: usize = 128;

// =============================================================================
// Constraints
// =============================================================================

/// How a widget sizes itself along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizePolicy {
    /// Exactly this many cells (clamped by min/max and the parent).
    Fixed(u16),
    /// Take an equal share of whatever the siblings leave over.
    #[default]
    Fill,
    /// Size to the measured content.
    FitContent,
}

/// Cross-axis placement of a child inside the space a container gives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    Start,
    Center,
    End,
    /// Expand to fill the given space.
    #[default]
    Stretch,
}

/// Per-widget sizing constraint, consumed only by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub width: SizePolicy,
    pub height: SizePolicy,
    pub min: Size,
    pub max: Size,
    /// Horizontal placement when not stretched to the full slot.
    pub halign: Align,
    /// Vertical placement when not stretched to the full slot.
    pub valign: Align,
}

impl Default for Constraint {
    fn default() -> Self {
        Self {
            width: SizePolicy::Fill,
            height: SizePolicy::Fill,
            min: Size::ZERO,
            max: Size::new(u16::MAX, u16::MAX),
            halign: Align::Stretch,
            valign: Align::Stretch,
        }
    }
}

impl Constraint {
    /// Fill the parent on both axes (the default).
    pub fn fill() -> Self {
        Self::default()
    }

    /// Exactly `width` x `height` cells.
    pub fn fixed(width: u16, height: u16) -> Self {
        Self {
            width: SizePolicy::Fixed(width),
            height: SizePolicy::Fixed(height),
            ..Self::default()
        }
    }

    /// Fixed width, fill height.
    pub fn fixed_width(width: u16) -> Self {
        Self {
            width: SizePolicy::Fixed(width),
            ..Self::default()
        }
    }

    /// Fixed height, fill width.
    pub fn fixed_height(height: u16) -> Self {
        Self {
            height: SizePolicy::Fixed(height),
            ..Self::default()
        }
    }

    /// Size to measured content on both axes.
    pub fn fit_content() -> Self {
        Self {
            width: SizePolicy::FitContent,
            height: SizePolicy::FitContent,
            ..Self::default()
        }
    }

    pub fn with_min(mut self, min: Size) -> Self {
        self.min = min;
        self
    }

    pub fn with_max(mut self, max: Size) -> Self {
        self.max = max;
        self
    }

    pub fn with_halign(mut self, halign: Align) -> Self {
        self.halign = halign;
        self
    }

    pub fn with_valign(mut self, valign: Align) -> Self {
        self.valign = valign;
        self
    }

    /// Whether this widget's size can depend on its children.
    pub(crate) fn depends_on_children(&self) -> bool {
        self.width == SizePolicy::FitContent || self.height == SizePolicy::FitContent
    }
}

/// How a container arranges its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Stack children top to bottom.
    #[default]
    Column,
    /// Pack children left to right.
    Row,
    /// Give every child the full content rect; paint order is z-order.
    Overlay,
    /// Children keep application-assigned rects, clipped to the content rect.
    Manual,
}

// =============================================================================
// Axis helpers
// =============================================================================

/// Clamp a value into `[min, max]`, min winning on contradiction.
#[inline]
fn clamp_axis(value: u16, min: u16, max: u16) -> u16 {
    value.min(max.max(min)).max(min)
}

/// Offset of a `len`-cell span aligned inside `avail` cells.
#[inline]
fn align_offset(avail: u16, len: u16, align: Align) -> u16 {
    match align {
        Align::Start | Align::Stretch => 0,
        Align::Center => avail.saturating_sub(len) / 2,
        Align::End => avail.saturating_sub(len),
    }
}

// =============================================================================
// Measure pass (leaves -> root)
// =============================================================================

/// Compute and cache intrinsic sizes for the subtree at `id`.
pub(crate) fn measure(arena: &mut WidgetArena, id: WidgetId, depth: usize) -> Result<Size> {
    if depth >= MAX_LAYOUT_DEPTH {
        return Err(Error::LayoutDepthExceeded {
            id,
            limit: MAX_LAYOUT_DEPTH,
        });
    }

    let (children, layout, constraint, style, visible) = {
        let node = arena.get(id)?;
        (
            node.children.clone(),
            node.layout,
            node.constraint,
            node.style,
            node.visible,
        )
    };

    if !visible {
        let node = arena.get_mut(id)?;
        node.measured = Size::ZERO;
        return Ok(Size::ZERO);
    }

    // Children first.
    let mut child_sizes = Vec::with_capacity(children.len());
    for &child in &children {
        let size = match measure(arena, child, depth + 1) {
            Ok(size) => size,
            Err(err @ Error::LayoutDepthExceeded { .. }) => {
                warn!(?child, "layout: {err}, zero-sizing subtree");
                zero_subtree(arena, child);
                Size::ZERO
            }
            Err(err) => return Err(err),
        };
        child_sizes.push((child, size));
    }

    // Intrinsic content size from the container policy.
    let mut content = Size::ZERO;
    match layout {
        Layout::Row => {
            for &(_, size) in &child_sizes {
                content.width = content.width.saturating_add(size.width);
                content.height = content.height.max(size.height);
            }
        }
        Layout::Column => {
            for &(_, size) in &child_sizes {
                content.width = content.width.max(size.width);
                content.height = content.height.saturating_add(size.height);
            }
        }
        Layout::Overlay => {
            for &(_, size) in &child_sizes {
                content.width = content.width.max(size.width);
                content.height = content.height.max(size.height);
            }
        }
        Layout::Manual => {
            // Manual children keep their rects; extent is the union.
            for &(child, _) in &child_sizes {
                if let Ok(node) = arena.get(child) {
                    content.width = content.width.max(node.rect.right());
                    content.height = content.height.max(node.rect.bottom());
                }
            }
        }
    }

    // The widget's own content (text, etc.) participates too.
    let own = {
        let node = arena.get(id)?;
        node.widget
            .as_ref()
            .map(|w| w.measure(&style))
            .unwrap_or(Size::ZERO)
    };
    content.width = content.width.max(own.width);
    content.height = content.height.max(own.height);

    // Padding wraps the content.
    let pad_w = style.padding.left.saturating_add(style.padding.right);
    let pad_h = style.padding.top.saturating_add(style.padding.bottom);
    let intrinsic = Size::new(
        content.width.saturating_add(pad_w),
        content.height.saturating_add(pad_h),
    );

    // Resolve per-axis policy to a measured size.
    let measured = Size::new(
        clamp_axis(
            match constraint.width {
                SizePolicy::Fixed(n) => n,
                SizePolicy::Fill | SizePolicy::FitContent => intrinsic.width,
            },
            constraint.min.width,
            constraint.max.width,
        ),
        clamp_axis(
            match constraint.height {
                SizePolicy::Fixed(n) => n,
                SizePolicy::Fill | SizePolicy::FitContent => intrinsic.height,
            },
            constraint.min.height,
            constraint.max.height,
        ),
    );

    arena.get_mut(id)?.measured = measured;
    Ok(measured)
}

/// Zero the geometry of an entire subtree (cycle-guard fallback).
fn zero_subtree(arena: &mut WidgetArena, id: WidgetId) {
    let mut stack = vec![id];
    while let Some(cur) = stack.pop() {
        if let Ok(node) = arena.get_mut(cur) {
            node.rect.width = 0;
            node.rect.height = 0;
            node.measured = Size::ZERO;
            node.dirty = false;
            stack.extend(node.children.iter().copied());
        }
    }
}

// =============================================================================
// Arrange pass (root -> leaves)
// =============================================================================

/// Assign child geometry for the subtree at `id`.
///
/// The node's own rect must already be set (by its parent's arrange, by
/// `solve_root` for the root, or left from the previous pass for a dirty
/// subtree whose slot did not change). Clears dirty flags as it goes.
pub(crate) fn arrange(arena: &mut WidgetArena, id: WidgetId, depth: usize) -> Result<()> {
    if depth >= MAX_LAYOUT_DEPTH {
        return Err(Error::LayoutDepthExceeded {
            id,
            limit: MAX_LAYOUT_DEPTH,
        });
    }

    let (children, layout, content, visible) = {
        let node = arena.get_mut(id)?;
        node.dirty = false;
        let content_local = Rect::from_size(node.rect.size()).inset(node.style.padding);
        (node.children.clone(), node.layout, content_local, node.visible)
    };

    if !visible {
        return Ok(());
    }

    let visible_children: Vec<WidgetId> = children
        .iter()
        .copied()
        .filter(|&c| arena.get(c).map_or(false, |n| n.visible))
        .collect();

    match layout {
        Layout::Row => arrange_linear(arena, &visible_children, content, true)?,
        Layout::Column => arrange_linear(arena, &visible_children, content, false)?,
        Layout::Overlay => arrange_overlay(arena, &visible_children, content)?,
        Layout::Manual => arrange_manual(arena, &visible_children, content)?,
    }

    for child in visible_children {
        match arrange(arena, child, depth + 1) {
            Ok(()) => {}
            Err(err @ Error::LayoutDepthExceeded { .. }) => {
                warn!(?child, "layout: {err}, zero-sizing subtree");
                zero_subtree(arena, child);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

/// Pack children along one axis (Row: horizontal, Column: vertical).
///
/// Fixed and FitContent children take their resolved size; Fill children
/// split the remainder equally, the last one absorbing the rounding rest.
fn arrange_linear(
    arena: &mut WidgetArena,
    children: &[WidgetId],
    content: Rect,
    horizontal: bool,
) -> Result<()> {
    let main_avail = if horizontal {
        content.width
    } else {
        content.height
    };
    let cross_avail = if horizontal {
        content.height
    } else {
        content.width
    };

    // First pass: resolve non-fill main sizes and count fills.
    let mut main_sizes = vec![0u16; children.len()];
    let mut fills = Vec::new();
    let mut used: u16 = 0;

    for (i, &child) in children.iter().enumerate() {
        let node = arena.get(child)?;
        let c = node.constraint;
        let policy = if horizontal { c.width } else { c.height };
        let (min, max) = if horizontal {
            (c.min.width, c.max.width)
        } else {
            (c.min.height, c.max.height)
        };
        match policy {
            SizePolicy::Fixed(n) => {
                main_sizes[i] = clamp_axis(n, min, max);
                used = used.saturating_add(main_sizes[i]);
            }
            SizePolicy::FitContent => {
                let m = if horizontal {
                    node.measured.width
                } else {
                    node.measured.height
                };
                main_sizes[i] = clamp_axis(m, min, max);
                used = used.saturating_add(main_sizes[i]);
            }
            SizePolicy::Fill => fills.push(i),
        }
    }

    // Second pass: split the remainder among fills.
    if !fills.is_empty() {
        let remainder = main_avail.saturating_sub(used);
        let share = remainder / fills.len() as u16;
        let rest = remainder - share * fills.len() as u16;
        for (k, &i) in fills.iter().enumerate() {
            let mut len = share;
            if k == fills.len() - 1 {
                len = len.saturating_add(rest);
            }
            let node = arena.get(children[i])?;
            let (min, max) = if horizontal {
                (node.constraint.min.width, node.constraint.max.width)
            } else {
                (node.constraint.min.height, node.constraint.max.height)
            };
            main_sizes[i] = clamp_axis(len, min, max);
        }
    }

    // Third pass: place.
    let mut cursor: u16 = 0;
    for (i, &child) in children.iter().enumerate() {
        let node = arena.get(child)?;
        let c = node.constraint;

        let cross_policy = if horizontal { c.height } else { c.width };
        let cross_align = if horizontal { c.valign } else { c.halign };
        let (cmin, cmax) = if horizontal {
            (c.min.height, c.max.height)
        } else {
            (c.min.width, c.max.width)
        };

        let cross_len = match (cross_align, cross_policy) {
            (Align::Stretch, SizePolicy::Fill) => clamp_axis(cross_avail, cmin, cmax),
            (_, SizePolicy::Fixed(n)) => clamp_axis(n.min(cross_avail), cmin, cmax),
            (_, SizePolicy::FitContent) => {
                let m = if horizontal {
                    node.measured.height
                } else {
                    node.measured.width
                };
                clamp_axis(m.min(cross_avail), cmin, cmax)
            }
            (_, SizePolicy::Fill) => clamp_axis(cross_avail, cmin, cmax),
        };
        let cross_off = align_offset(cross_avail, cross_len, cross_align);

        let rect = if horizontal {
            Rect::new(
                content.x.saturating_add(cursor),
                content.y.saturating_add(cross_off),
                main_sizes[i],
                cross_len,
            )
        } else {
            Rect::new(
                content.x.saturating_add(cross_off),
                content.y.saturating_add(cursor),
                cross_len,
                main_sizes[i],
            )
        };

        arena.get_mut(child)?.rect = rect.clamped_to(&content);
        cursor = cursor.saturating_add(main_sizes[i]);
    }

    Ok(())
}

/// Every child gets the full content rect (modulo its own policy/alignment).
fn arrange_overlay(arena: &mut WidgetArena, children: &[WidgetId], content: Rect) -> Result<()> {
    for &child in children {
        let node = arena.get(child)?;
        let c = node.constraint;

        let width = match c.width {
            SizePolicy::Fixed(n) => clamp_axis(n.min(content.width), c.min.width, c.max.width),
            SizePolicy::FitContent => clamp_axis(
                node.measured.width.min(content.width),
                c.min.width,
                c.max.width,
            ),
            SizePolicy::Fill => clamp_axis(content.width, c.min.width, c.max.width),
        };
        let height = match c.height {
            SizePolicy::Fixed(n) => clamp_axis(n.min(content.height), c.min.height, c.max.height),
            SizePolicy::FitContent => clamp_axis(
                node.measured.height.min(content.height),
                c.min.height,
                c.max.height,
            ),
            SizePolicy::Fill => clamp_axis(content.height, c.min.height, c.max.height),
        };

        let rect = Rect::new(
            content.x.saturating_add(align_offset(content.width, width, c.halign)),
            content
                .y
                .saturating_add(align_offset(content.height, height, c.valign)),
            width,
            height,
        );
        arena.get_mut(child)?.rect = rect.clamped_to(&content);
    }
    Ok(())
}

/// Children keep their application-assigned rects, clipped to the content.
fn arrange_manual(arena: &mut WidgetArena, children: &[WidgetId], content: Rect) -> Result<()> {
    for &child in children {
        let rect = arena.get(child)?.rect;
        arena.get_mut(child)?.rect = rect.clamped_to(&content);
    }
    Ok(())
}

// =============================================================================
// Entry points
// =============================================================================

/// Full solve of the subtree rooted at `root` into `avail`.
pub(crate) fn solve_root(arena: &mut WidgetArena, root: WidgetId, avail: Rect) -> Result<()> {
    match measure(arena, root, 0) {
        Ok(_) => {}
        Err(err @ Error::LayoutDepthExceeded { .. }) => {
            warn!("layout: {err}, zero-sizing root");
            zero_subtree(arena, root);
            return Ok(());
        }
        Err(err) => return Err(err),
    }

    // The root resolves against the terminal rect.
    let (constraint, measured) = {
        let node = arena.get(root)?;
        (node.constraint, node.measured)
    };
    let width = match constraint.width {
        SizePolicy::Fixed(n) => clamp_axis(n.min(avail.width), constraint.min.width, constraint.max.width),
        SizePolicy::FitContent => clamp_axis(
            measured.width.min(avail.width),
            constraint.min.width,
            constraint.max.width,
        ),
        SizePolicy::Fill => avail.width,
    };
    let height = match constraint.height {
        SizePolicy::Fixed(n) => clamp_axis(
            n.min(avail.height),
            constraint.min.height,
            constraint.max.height,
        ),
        SizePolicy::FitContent => clamp_axis(
            measured.height.min(avail.height),
            constraint.min.height,
            constraint.max.height,
        ),
        SizePolicy::Fill => avail.height,
    };

    let rect = Rect::new(
        avail.x.saturating_add(align_offset(avail.width, width, constraint.halign)),
        avail
            .y
            .saturating_add(align_offset(avail.height, height, constraint.valign)),
        width,
        height,
    )
    .clamped_to(&avail);

    arena.get_mut(root)?.rect = rect;

    match arrange(arena, root, 0) {
        Ok(()) => Ok(()),
        Err(err @ Error::LayoutDepthExceeded { .. }) => {
            warn!("layout: {err}, zero-sizing root");
            zero_subtree(arena, root);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Re-arrange a dirty subtree inside its existing rect.
///
/// Valid when the subtree root's own geometry cannot have changed (dirty
/// marking walks up through every FitContent ancestor, so a stable subtree
/// root keeps its slot).
pub(crate) fn solve_subtree(arena: &mut WidgetArena, id: WidgetId) -> Result<()> {
    match measure(arena, id, 0) {
        Ok(_) => {}
        Err(err @ Error::LayoutDepthExceeded { .. }) => {
            warn!("layout: {err}, zero-sizing subtree");
            zero_subtree(arena, id);
            return Ok(());
        }
        Err(err) => return Err(err),
    }
    match arrange(arena, id, 0) {
        Ok(()) => Ok(()),
        Err(err @ Error::LayoutDepthExceeded { .. }) => {
            warn!("layout: {err}, zero-sizing subtree");
            zero_subtree(arena, id);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

// =============================================================================
// Tests
// =============================================================================
