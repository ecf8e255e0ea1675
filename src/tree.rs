//! Widget arena - index allocation and tree structure.
//!
//! Widgets live in a slab of slots indexed by stable, generation-checked
//! handles. The tree is strictly ownership-shaped: each node records an
//! ordered child list and a non-owning parent back-reference, so there are
//! no reference cycles and bulk teardown is a post-order walk.
//!
//! Freed indices go back to a pool for O(1) reuse; the generation counter on
//! the slot makes a stale `WidgetId` fail fast (`Error::DeadWidget`) instead
//! of silently aliasing whatever widget reused the index.

use crate::error::{Error, Result};
use crate::layout::{Constraint, Layout};
use crate::types::{Point, Rect, Size};
use crate::widget::{Style, Widget};

/// Stable handle to a widget in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId {
    index: u32,
    generation: u32,
}

impl WidgetId {
    /// Slot index; only meaningful to the arena.
    #[inline]
    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }
}

/// One widget's record in the arena.
pub(crate) struct Node {
    /// The behavior object. Temporarily `None` while one of its hooks runs,
    /// so a hook can mutate the rest of the session without aliasing itself.
    pub widget: Option<Box<dyn Widget>>,
    pub parent: Option<WidgetId>,
    /// Ordered children; later entries paint on top.
    pub children: Vec<WidgetId>,
    /// Geometry in the parent's coordinate space, assigned by layout
    /// (or by the application under `Layout::Manual`).
    pub rect: Rect,
    /// Intrinsic size cached by the measure pass.
    pub measured: Size,
    pub dirty: bool,
    pub visible: bool,
    pub enabled: bool,
    pub style: Style,
    pub constraint: Constraint,
    pub layout: Layout,
}

impl Node {
    pub(crate) fn new(widget: Box<dyn Widget>, style: Style) -> Self {
        Self {
            widget: Some(widget),
            parent: None,
            children: Vec::new(),
            rect: Rect::default(),
            measured: Size::ZERO,
            dirty: true,
            visible: true,
            enabled: true,
            style,
            constraint: Constraint::default(),
            layout: Layout::default(),
        }
    }

    /// Content rect in the parent's coordinate space (rect minus padding).
    pub(crate) fn content_rect(&self) -> Rect {
        self.rect.inset(self.style.padding)
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Slab of widget nodes with free-index reuse.
#[derive(Default)]
pub(crate) struct WidgetArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl WidgetArena {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of live widgets.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Insert a node, reusing a freed slot when one exists.
    pub fn insert(&mut self, node: Node) -> WidgetId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            WidgetId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            WidgetId {
                index,
                generation: 0,
            }
        }
    }

    /// Whether the handle refers to a live widget.
    pub fn is_alive(&self, id: WidgetId) -> bool {
        self.slots
            .get(id.index())
            .map_or(false, |s| s.generation == id.generation && s.node.is_some())
    }

    pub fn get(&self, id: WidgetId) -> Result<&Node> {
        self.slots
            .get(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
            .ok_or(Error::DeadWidget(id))
    }

    pub fn get_mut(&mut self, id: WidgetId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
            .ok_or(Error::DeadWidget(id))
    }

    /// Remove a node, bumping the slot generation so the id dies.
    ///
    /// The caller is responsible for having detached the node and destroyed
    /// its children first.
    pub fn remove(&mut self, id: WidgetId) -> Result<Node> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .ok_or(Error::DeadWidget(id))?;
        let node = slot.node.take().ok_or(Error::DeadWidget(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index() as u32);
        self.len -= 1;
        Ok(node)
    }

    /// Whether `ancestor` is `id` itself or a transitive parent of `id`.
    pub fn is_same_or_ancestor(&self, ancestor: WidgetId, id: WidgetId) -> bool {
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            if cur == ancestor {
                return true;
            }
            cursor = self.get(cur).ok().and_then(|n| n.parent);
        }
        false
    }

    /// Absolute origin of a widget (sum of ancestor rect origins).
    pub fn abs_origin(&self, id: WidgetId) -> Result<Point> {
        let mut x = 0u16;
        let mut y = 0u16;
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            let node = self.get(cur)?;
            x = x.saturating_add(node.rect.x);
            y = y.saturating_add(node.rect.y);
            cursor = node.parent;
        }
        Ok(Point::new(x, y))
    }

    /// Absolute rect of a widget.
    pub fn abs_rect(&self, id: WidgetId) -> Result<Rect> {
        let node = self.get(id)?;
        let parent_origin = match node.parent {
            Some(p) => self.abs_origin(p)?,
            None => Point::new(0, 0),
        };
        Ok(node.rect.translated(parent_origin))
    }

    /// Collect a subtree in post-order (children before parents).
    pub fn collect_post_order(&self, id: WidgetId, out: &mut Vec<WidgetId>) {
        if let Ok(node) = self.get(id) {
            for &child in &node.children {
                self.collect_post_order(child, out);
            }
            out.push(id);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
